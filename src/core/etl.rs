use crate::core::{Pipeline, Record};
use crate::domain::model::{RunReport, UploadOutcome};
use crate::utils::error::Result;
use std::collections::HashMap;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    /// Extraction and local writes are fatal. Once local files exist, transform
    /// and upload failures are logged and reported in `RunReport::upload`.
    pub async fn run(&self) -> Result<RunReport> {
        tracing::info!("Starting job ETL run");

        let raw_data = self.pipeline.extract().await?;
        let jobs_by_site = count_by_site(&raw_data);

        if raw_data.is_empty() {
            tracing::warn!("No jobs found. Try adjusting the scraper's search parameters.");
            return Ok(RunReport {
                scraped: 0,
                files_written: Vec::new(),
                duplicates_removed: 0,
                transformed: 0,
                warnings: Vec::new(),
                upload: UploadOutcome::Skipped {
                    reason: "no jobs found".to_string(),
                },
                jobs_by_site,
            });
        }

        let scraped = raw_data.len();
        let files_written = self.pipeline.persist(&raw_data).await?;

        let result = match self.pipeline.transform(raw_data).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("❌ Transform failed: {} (local files kept)", e);
                tracing::error!("💡 {}", e.recovery_suggestion());
                return Ok(RunReport {
                    scraped,
                    files_written,
                    duplicates_removed: 0,
                    transformed: 0,
                    warnings: Vec::new(),
                    upload: UploadOutcome::Failed {
                        error: e.to_string(),
                    },
                    jobs_by_site,
                });
            }
        };

        let upload = match self.pipeline.load(&result).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    "❌ Upload failed: {} (Category: {:?}, Severity: {:?})",
                    e,
                    e.category(),
                    e.severity()
                );
                tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
                tracing::info!("Continuing with local file saves");
                UploadOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        let report = RunReport {
            scraped,
            files_written,
            duplicates_removed: result.duplicates_removed,
            transformed: result.records.len(),
            warnings: result.warnings,
            upload,
            jobs_by_site,
        };
        log_summary(&report);
        Ok(report)
    }
}

/// Jobs per `site`, most frequent first; ties by name.
pub fn count_by_site(records: &[Record]) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for record in records {
        if let Some(site) = record.str_field("site") {
            *counts.entry(site.to_string()).or_default() += 1;
        }
    }

    let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

fn log_summary(report: &RunReport) {
    tracing::info!(
        "Summary: {} jobs found, {} duplicates removed, {} transformed, {} warnings",
        report.scraped,
        report.duplicates_removed,
        report.transformed,
        report.warnings.len()
    );
    for (site, count) in &report.jobs_by_site {
        tracing::info!("  {}: {}", site, count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TransformResult;
    use crate::utils::error::EtlError;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct StubPipeline {
        records: Vec<Record>,
        fail_transform: bool,
        fail_load: bool,
        persisted: Arc<AtomicBool>,
    }

    impl StubPipeline {
        fn new(records: Vec<Record>) -> Self {
            Self {
                records,
                fail_transform: false,
                fail_load: false,
                persisted: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    #[async_trait::async_trait]
    impl Pipeline for StubPipeline {
        async fn extract(&self) -> Result<Vec<Record>> {
            Ok(self.records.clone())
        }

        async fn persist(&self, _records: &[Record]) -> Result<Vec<String>> {
            self.persisted.store(true, Ordering::SeqCst);
            Ok(vec!["out/jobs.csv".to_string()])
        }

        async fn transform(&self, data: Vec<Record>) -> Result<TransformResult> {
            if self.fail_transform {
                return Err(EtlError::FieldCollision {
                    first: "a".to_string(),
                    second: "b".to_string(),
                    destination: "c".to_string(),
                });
            }
            Ok(TransformResult {
                records: data,
                ..TransformResult::default()
            })
        }

        async fn load(&self, result: &TransformResult) -> Result<UploadOutcome> {
            if self.fail_load {
                return Err(EtlError::UploadError {
                    table: "jobs".to_string(),
                    status: 409,
                    code: Some("23505".to_string()),
                    message: "duplicate key".to_string(),
                });
            }
            Ok(UploadOutcome::Uploaded {
                table: "jobs".to_string(),
                count: result.records.len(),
                inserted_without_conflict_key: false,
            })
        }
    }

    fn jobs() -> Vec<Record> {
        ["indeed", "linkedin", "indeed", "google"]
            .iter()
            .map(|site| serde_json::from_value(json!({"site": site})).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_run_reports_counts() {
        let report = EtlEngine::new(StubPipeline::new(jobs())).run().await.unwrap();

        assert_eq!(report.scraped, 4);
        assert_eq!(report.transformed, 4);
        assert_eq!(report.files_written, vec!["out/jobs.csv"]);
        assert!(matches!(report.upload, UploadOutcome::Uploaded { count: 4, .. }));
        assert_eq!(
            report.jobs_by_site,
            vec![
                ("indeed".to_string(), 2),
                ("google".to_string(), 1),
                ("linkedin".to_string(), 1)
            ]
        );
    }

    #[tokio::test]
    async fn test_upload_failure_keeps_local_files() {
        let mut pipeline = StubPipeline::new(jobs());
        pipeline.fail_load = true;
        let persisted = pipeline.persisted.clone();

        let report = EtlEngine::new(pipeline).run().await.unwrap();

        assert!(persisted.load(Ordering::SeqCst));
        assert!(report.upload.is_failed());
        assert_eq!(report.files_written.len(), 1);
    }

    #[tokio::test]
    async fn test_transform_failure_is_reported() {
        let mut pipeline = StubPipeline::new(jobs());
        pipeline.fail_transform = true;

        let report = EtlEngine::new(pipeline).run().await.unwrap();

        assert!(report.upload.is_failed());
        assert_eq!(report.transformed, 0);
        assert_eq!(report.files_written.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_extract_writes_nothing() {
        let pipeline = StubPipeline::new(Vec::new());
        let persisted = pipeline.persisted.clone();

        let report = EtlEngine::new(pipeline).run().await.unwrap();

        assert!(!persisted.load(Ordering::SeqCst));
        assert!(matches!(report.upload, UploadOutcome::Skipped { .. }));
    }
}
