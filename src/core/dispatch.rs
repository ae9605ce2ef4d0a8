use crate::domain::model::{TransformResult, UploadOutcome};
use crate::domain::ports::Uploader;
use crate::utils::error::{EtlError, Result};

/// PostgreSQL: no unique or exclusion constraint matches the ON CONFLICT target.
pub const MISSING_CONFLICT_INDEX: &str = "42P10";

pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Hands transformed batches to the destination table.
pub struct UploadDispatcher {
    uploader: Box<dyn Uploader>,
    table: String,
    batch_size: usize,
}

impl UploadDispatcher {
    pub fn new(uploader: Box<dyn Uploader>, table: impl Into<String>, batch_size: usize) -> Self {
        Self {
            uploader,
            table: table.into(),
            batch_size: batch_size.max(1),
        }
    }

    pub async fn dispatch(&self, result: &TransformResult) -> Result<UploadOutcome> {
        if result.records.is_empty() {
            return Ok(UploadOutcome::Skipped {
                reason: "no records to upload".to_string(),
            });
        }

        let conflict_key = result.conflict_key.as_deref();
        tracing::info!(
            "📤 Uploading {} jobs to table '{}' (conflict key: {})",
            result.records.len(),
            self.table,
            conflict_key.unwrap_or("none")
        );
        if let Some(first) = result.records.first() {
            let sample: Vec<&String> = first.keys().take(10).collect();
            tracing::debug!("Sample job keys: {:?}", sample);
        }

        let mut count = 0;
        let mut inserted_without_conflict_key = false;

        for (batch_index, batch) in result.records.chunks(self.batch_size).enumerate() {
            if inserted_without_conflict_key {
                count += self.uploader.insert(&self.table, batch).await?;
                continue;
            }

            match self.uploader.upsert(&self.table, batch, conflict_key).await {
                Ok(n) => count += n,
                Err(EtlError::UploadError { code: Some(code), message, .. })
                    if result.insert_fallback && code == MISSING_CONFLICT_INDEX =>
                {
                    tracing::warn!(
                        "⚠️ Table '{}' has no unique index for the conflict key ({}); falling back to plain insert",
                        self.table,
                        message
                    );
                    inserted_without_conflict_key = true;
                    count += self.uploader.insert(&self.table, batch).await?;
                }
                Err(e) => {
                    tracing::error!(
                        "❌ Batch {} upload to '{}' failed after {} records: {}",
                        batch_index + 1,
                        self.table,
                        count,
                        e
                    );
                    return Err(e);
                }
            }
        }

        tracing::info!("✅ Uploaded {} jobs to table '{}'", count, self.table);
        Ok(UploadOutcome::Uploaded {
            table: self.table.clone(),
            count,
            inserted_without_conflict_key,
        })
    }
}
