use crate::adapters::rest::RestUploader;
use crate::adapters::writer::DEFAULT_DATE_FIELDS;
use crate::config::toml_config::FileConfig;
use crate::core::dedup::{Deduplicator, DEFAULT_IDENTITY_FIELDS};
use crate::core::dispatch::{UploadDispatcher, DEFAULT_BATCH_SIZE};
use crate::core::field_mapper::{CollisionPolicy, FieldMapper};
use crate::core::schema::{ProfileKind, SchemaProfile};
use crate::core::transformer::TransformOptions;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_TABLE: &str = "pharmacist_jobs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl OutputFormat {
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => Err(EtlError::InvalidConfigValueError {
                field: "load.formats".to_string(),
                value: other.to_string(),
                reason: "Unsupported format. Valid formats: csv, json".to_string(),
            }),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadSettings {
    pub url: String,
    pub api_key: String,
    pub batch_size: usize,
    pub timeout: Duration,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input_path: Option<String>,
    pub output_path: String,
    pub output_stem: String,
    pub formats: Vec<OutputFormat>,
    pub date_fields: Vec<String>,
    pub table: String,
    /// Explicit profile; otherwise chosen from the table name.
    pub profile: Option<ProfileKind>,
    pub allowed_fields: Option<Vec<String>>,
    pub identity_fields: Vec<String>,
    pub field_mapping: HashMap<String, String>,
    pub on_collision: CollisionPolicy,
    /// `None` when no destination is configured; the run then stops after local files.
    pub upload: Option<UploadSettings>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input_path: None,
            output_path: "./output".to_string(),
            output_stem: "scraped_jobs".to_string(),
            formats: vec![OutputFormat::Csv, OutputFormat::Json],
            date_fields: DEFAULT_DATE_FIELDS.iter().map(|f| f.to_string()).collect(),
            table: DEFAULT_TABLE.to_string(),
            profile: None,
            allowed_fields: None,
            identity_fields: DEFAULT_IDENTITY_FIELDS.iter().map(|f| f.to_string()).collect(),
            field_mapping: HashMap::new(),
            on_collision: CollisionPolicy::default(),
            upload: None,
        }
    }
}

impl RunConfig {
    /// Layers a config file over the defaults.
    pub fn apply_file(&mut self, file: FileConfig) -> Result<()> {
        if let Some(path) = file.input.path {
            self.input_path = Some(path);
        }

        let transform = file.transform;
        if transform.profile.is_some() {
            self.profile = transform.profile;
        }
        if let Some(fields) = transform.identity_fields {
            self.identity_fields = fields;
        }
        if let Some(policy) = transform.on_collision {
            self.on_collision = policy;
        }
        if let Some(mapping) = transform.field_mapping {
            self.field_mapping = mapping;
        }
        if transform.allowed_fields.is_some() {
            self.allowed_fields = transform.allowed_fields;
        }

        let load = file.load;
        if let Some(path) = load.output_path {
            self.output_path = path;
        }
        if let Some(stem) = load.output_stem {
            self.output_stem = stem;
        }
        if let Some(formats) = load.formats {
            self.formats = formats
                .iter()
                .map(|f| OutputFormat::parse(f))
                .collect::<Result<_>>()?;
        }
        if let Some(fields) = load.date_fields {
            self.date_fields = fields;
        }

        let upload = file.upload;
        if let Some(table) = upload.table {
            self.table = table;
        }
        self.upload = match (upload.enabled, upload.url, upload.api_key) {
            (Some(false), _, _) => None,
            (_, Some(url), Some(api_key)) => Some(UploadSettings {
                url,
                api_key,
                batch_size: upload.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
                timeout: Duration::from_secs(upload.timeout_seconds.unwrap_or(30)),
            }),
            (Some(true), _, _) => {
                return Err(EtlError::MissingConfigError {
                    field: "upload.url / upload.api_key".to_string(),
                })
            }
            _ => None,
        };

        Ok(())
    }

    /// Replaces the mapping with a JSON object such as `{"job_url":"url"}`.
    pub fn set_field_mapping_json(&mut self, json: &str) -> Result<()> {
        self.field_mapping = serde_json::from_str(json).map_err(|e| EtlError::ConfigError {
            message: format!("Field mapping must be a JSON object of strings: {}", e),
        })?;
        Ok(())
    }

    pub fn profile_kind(&self) -> ProfileKind {
        self.profile
            .unwrap_or_else(|| ProfileKind::for_table(&self.table))
    }

    pub fn output_file(&self, format: OutputFormat) -> String {
        format!("{}.{}", self.output_stem, format.extension())
    }

    /// Builds the transformer options. Fails on a mapping the collision policy rejects.
    pub fn transform_options(&self, scraped_at: Option<String>) -> Result<TransformOptions> {
        Ok(TransformOptions {
            deduplicator: Deduplicator::new(self.identity_fields.clone()),
            mapper: FieldMapper::new(self.field_mapping.clone(), self.on_collision)?,
            profile: SchemaProfile::from_kind(self.profile_kind(), self.allowed_fields.clone()),
            scraped_at,
        })
    }

    pub fn upload_dispatcher(&self) -> Result<Option<UploadDispatcher>> {
        self.upload
            .as_ref()
            .map(|settings| -> Result<UploadDispatcher> {
                let uploader = RestUploader::new(
                    settings.url.clone(),
                    settings.api_key.clone(),
                    settings.timeout,
                )?;
                Ok(UploadDispatcher::new(
                    Box::new(uploader),
                    self.table.clone(),
                    settings.batch_size,
                ))
            })
            .transpose()
    }
}

impl Validate for RunConfig {
    fn validate(&self) -> Result<()> {
        let input = self
            .input_path
            .as_deref()
            .ok_or_else(|| EtlError::MissingConfigError {
                field: "input".to_string(),
            })?;
        validation::validate_path("input", input)?;
        validation::validate_path("load.output_path", &self.output_path)?;
        validation::validate_path("load.output_stem", &self.output_stem)?;
        validation::validate_non_empty_list("transform.identity_fields", &self.identity_fields)?;

        if self.formats.is_empty() {
            return Err(EtlError::ConfigValidationError {
                field: "load.formats".to_string(),
                message: "At least one output format is required".to_string(),
            });
        }

        if let Some(upload) = &self.upload {
            validation::validate_url("upload.url", &upload.url)?;
            validation::validate_identifier("upload.table", &self.table)?;
            validation::validate_positive_number("upload.batch_size", upload.batch_size, 1)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_input() -> RunConfig {
        RunConfig {
            input_path: Some("scraped.json".to_string()),
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = with_input();

        assert!(config.validate().is_ok());
        assert_eq!(config.profile_kind(), ProfileKind::Generic);
        assert_eq!(config.output_file(OutputFormat::Csv), "scraped_jobs.csv");
        assert!(config.upload_dispatcher().unwrap().is_none());
    }

    #[test]
    fn test_missing_input_fails_validation() {
        let err = RunConfig::default().validate().unwrap_err();
        assert!(matches!(err, EtlError::MissingConfigError { ref field } if field == "input"));
    }

    #[test]
    fn test_jobs_table_selects_jobs_profile() {
        let config = RunConfig {
            table: "jobs".to_string(),
            ..with_input()
        };
        assert_eq!(config.profile_kind(), ProfileKind::Jobs);

        let config = RunConfig {
            table: "jobs".to_string(),
            profile: Some(ProfileKind::Generic),
            ..with_input()
        };
        assert_eq!(config.profile_kind(), ProfileKind::Generic);
    }

    #[test]
    fn test_apply_file_enables_upload() {
        let file = FileConfig::from_toml_str(
            r#"
[load]
formats = ["json"]

[upload]
url = "https://db.example.com"
api_key = "key"
table = "jobs"
"#,
        )
        .unwrap();

        let mut config = with_input();
        config.apply_file(file).unwrap();

        assert_eq!(config.formats, vec![OutputFormat::Json]);
        assert_eq!(config.table, "jobs");
        let upload = config.upload.clone().unwrap();
        assert_eq!(upload.batch_size, DEFAULT_BATCH_SIZE);
        assert!(config.validate().is_ok());
        assert!(config.upload_dispatcher().unwrap().is_some());
    }

    #[test]
    fn test_apply_file_rejects_enabled_upload_without_credentials() {
        let file = FileConfig::from_toml_str("[upload]\nenabled = true\n").unwrap();
        let mut config = with_input();

        assert!(matches!(
            config.apply_file(file),
            Err(EtlError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_apply_file_rejects_unknown_format() {
        let file = FileConfig::from_toml_str("[load]\nformats = [\"xml\"]\n").unwrap();
        let mut config = with_input();

        assert!(config.apply_file(file).is_err());
    }

    #[test]
    fn test_malformed_mapping_json() {
        let mut config = with_input();
        assert!(config.set_field_mapping_json(r#"{"job_url": "url"}"#).is_ok());
        assert_eq!(config.field_mapping.get("job_url").map(String::as_str), Some("url"));

        let err = config.set_field_mapping_json(r#"["job_url"]"#).unwrap_err();
        assert!(matches!(err, EtlError::ConfigError { .. }));

        let err = config.set_field_mapping_json(r#"{"job_url": 5}"#).unwrap_err();
        assert!(matches!(err, EtlError::ConfigError { .. }));
    }

    #[test]
    fn test_fail_policy_rejects_colliding_mapping() {
        let mut config = with_input();
        config.on_collision = CollisionPolicy::Fail;
        config
            .set_field_mapping_json(r#"{"company": "company_name", "employer": "company_name"}"#)
            .unwrap();

        assert!(matches!(
            config.transform_options(None),
            Err(EtlError::FieldCollision { .. })
        ));
    }

    #[test]
    fn test_invalid_upload_table() {
        let config = RunConfig {
            table: "jobs; drop".to_string(),
            upload: Some(UploadSettings {
                url: "https://db.example.com".to_string(),
                api_key: "key".to_string(),
                batch_size: 10,
                timeout: Duration::from_secs(5),
            }),
            ..with_input()
        };

        assert!(config.validate().is_err());
    }
}
