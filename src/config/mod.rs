pub mod cli;
pub mod run;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::core::field_mapper::CollisionPolicy;
#[cfg(feature = "cli")]
use crate::core::schema::ProfileKind;
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "job-etl")]
#[command(about = "Normalize scraped job postings and load them into a jobs table")]
pub struct CliConfig {
    /// JSON file produced by the scraper
    #[arg(short, long)]
    pub input: Option<String>,

    /// TOML config file; command-line flags take precedence
    #[arg(short, long)]
    pub config: Option<String>,

    #[arg(long)]
    pub output_path: Option<String>,

    /// File name (without extension) for the CSV and JSON output
    #[arg(long)]
    pub output_stem: Option<String>,

    /// Destination table; "jobs" selects the normalized jobs profile
    #[arg(long, env = "UPLOAD_TABLE")]
    pub table: Option<String>,

    #[arg(long, value_enum)]
    pub profile: Option<ProfileKind>,

    /// JSON object renaming fields, e.g. '{"job_url":"url"}'
    #[arg(long, env = "FIELD_MAPPING")]
    pub field_mapping: Option<String>,

    #[arg(long, value_enum)]
    pub on_collision: Option<CollisionPolicy>,

    /// Fields identifying duplicate postings, in order of preference
    #[arg(long, value_delimiter = ',')]
    pub identity_fields: Vec<String>,

    #[arg(long, env = "UPLOAD_URL")]
    pub upload_url: Option<String>,

    #[arg(long, env = "UPLOAD_API_KEY", hide_env_values = true)]
    pub upload_key: Option<String>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Write local files only
    #[arg(long)]
    pub no_upload: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub log_json: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Defaults, then the config file, then flags and environment.
    pub fn resolve(&self) -> Result<run::RunConfig> {
        let mut config = run::RunConfig::default();

        if let Some(path) = &self.config {
            config.apply_file(toml_config::FileConfig::from_file(path)?)?;
        }

        if let Some(input) = &self.input {
            config.input_path = Some(input.clone());
        }
        if let Some(path) = &self.output_path {
            config.output_path = path.clone();
        }
        if let Some(stem) = &self.output_stem {
            config.output_stem = stem.clone();
        }
        if let Some(table) = &self.table {
            config.table = table.clone();
        }
        if self.profile.is_some() {
            config.profile = self.profile;
        }
        if let Some(mapping) = &self.field_mapping {
            config.set_field_mapping_json(mapping)?;
        }
        if let Some(policy) = self.on_collision {
            config.on_collision = policy;
        }
        if !self.identity_fields.is_empty() {
            config.identity_fields = self.identity_fields.clone();
        }

        match (&self.upload_url, &self.upload_key) {
            (Some(url), Some(api_key)) => {
                let mut settings = config.upload.take().unwrap_or_else(|| run::UploadSettings {
                    url: String::new(),
                    api_key: String::new(),
                    batch_size: crate::core::dispatch::DEFAULT_BATCH_SIZE,
                    timeout: std::time::Duration::from_secs(30),
                });
                settings.url = url.clone();
                settings.api_key = api_key.clone();
                config.upload = Some(settings);
            }
            (Some(_), None) | (None, Some(_)) if config.upload.is_none() => {
                tracing::warn!("⚠️ Upload URL and API key must both be set; skipping upload");
            }
            _ => {}
        }
        if let (Some(settings), Some(batch_size)) = (config.upload.as_mut(), self.batch_size) {
            settings.batch_size = batch_size;
        }
        if self.no_upload {
            config.upload = None;
        }

        Ok(config)
    }
}
