use crate::adapters::writer;
use crate::config::run::{OutputFormat, RunConfig};
use crate::core::dispatch::UploadDispatcher;
use crate::core::transformer::RecordTransformer;
use crate::core::{Pipeline, Record, Storage, TransformResult};
use crate::domain::model::UploadOutcome;
use crate::utils::error::{EtlError, Result};
use serde_json::Value;
use std::borrow::Cow;

const NON_FINITE_TOKENS: [&str; 3] = ["-Infinity", "Infinity", "NaN"];

/// Scraper output file -> local CSV/JSON -> transformed upload.
pub struct JobPipeline<S: Storage> {
    source: S,
    sink: S,
    config: RunConfig,
    transformer: RecordTransformer,
    dispatcher: Option<UploadDispatcher>,
}

impl<S: Storage> JobPipeline<S> {
    /// `scraped_at` is stamped onto every record that lacks one.
    pub fn new(
        source: S,
        sink: S,
        config: RunConfig,
        scraped_at: Option<String>,
        dispatcher: Option<UploadDispatcher>,
    ) -> Result<Self> {
        let transformer = RecordTransformer::new(config.transform_options(scraped_at)?);
        Ok(Self {
            source,
            sink,
            config,
            transformer,
            dispatcher,
        })
    }
}

/// Accepts a JSON array of objects, a single object, or JSON lines.
pub fn parse_records(data: &[u8]) -> Result<Vec<Record>> {
    let text = std::str::from_utf8(data).map_err(|e| EtlError::InputError {
        message: format!("Scraper output is not UTF-8: {}", e),
    })?;
    let text = null_non_finite(text);
    let trimmed = text.trim_start();

    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let values: Vec<Value> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed)?
    } else {
        serde_json::Deserializer::from_str(trimmed)
            .into_iter::<Value>()
            .collect::<std::result::Result<_, _>>()?
    };

    let mut records = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        match value {
            Value::Object(map) => records.push(Record::from(map)),
            other => tracing::warn!(
                "⚠️ Skipping item {}: expected a JSON object, found {}",
                index,
                json_type(&other)
            ),
        }
    }
    Ok(records)
}

/// Python's `json.dump` writes non-finite floats as bare `NaN`/`Infinity`.
/// Outside string literals those tokens become `null`.
fn null_non_finite(text: &str) -> Cow<'_, str> {
    if !text.contains("NaN") && !text.contains("Infinity") {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if let Some(token) = NON_FINITE_TOKENS.iter().find(|t| rest.starts_with(**t)) {
            out.push_str("null");
            rest = &rest[token.len()..];
            continue;
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    Cow::Owned(out)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for JobPipeline<S> {
    async fn extract(&self) -> Result<Vec<Record>> {
        let input = self
            .config
            .input_path
            .as_deref()
            .ok_or_else(|| EtlError::MissingConfigError {
                field: "input".to_string(),
            })?;

        tracing::info!("📥 Reading scraped jobs from {}", self.source.display_path(input));
        let data = self.source.read_file(input).await?;
        let records = parse_records(&data)?;

        tracing::info!("📊 Found {} scraped jobs", records.len());
        Ok(records)
    }

    async fn persist(&self, records: &[Record]) -> Result<Vec<String>> {
        let mut written = Vec::new();

        for format in &self.config.formats {
            let data = match format {
                OutputFormat::Csv => writer::to_csv(records)?,
                OutputFormat::Json => {
                    let date_fields: Vec<&str> =
                        self.config.date_fields.iter().map(String::as_str).collect();
                    writer::to_json(records, &date_fields)?
                }
            };

            let file = self.config.output_file(*format);
            tracing::debug!("Writing {} ({} bytes)", file, data.len());
            self.sink.write_file(&file, &data).await?;

            let location = self.sink.display_path(&file);
            tracing::info!("💾 Results saved to {}", location);
            written.push(location);
        }

        Ok(written)
    }

    async fn transform(&self, data: Vec<Record>) -> Result<TransformResult> {
        tracing::info!(
            "🔧 Transforming {} records for table '{}' (profile: {})",
            data.len(),
            self.config.table,
            self.transformer.options().profile.name
        );
        let result = self.transformer.transform(data)?;

        if !result.warnings.is_empty() {
            tracing::warn!("⚠️ {} data-quality warnings", result.warnings.len());
        }
        tracing::info!(
            "✅ Transformed {} records ({} duplicates removed)",
            result.records.len(),
            result.duplicates_removed
        );
        Ok(result)
    }

    async fn load(&self, result: &TransformResult) -> Result<UploadOutcome> {
        match &self.dispatcher {
            Some(dispatcher) => dispatcher.dispatch(result).await,
            None => {
                tracing::info!("⏭️ No upload destination configured; local files only");
                Ok(UploadOutcome::Skipped {
                    reason: "no upload destination configured".to_string(),
                })
            }
        }
    }
}
