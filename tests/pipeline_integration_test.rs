use httpmock::prelude::*;
use job_etl::config::run::{OutputFormat, UploadSettings};
use job_etl::{EtlEngine, EtlError, JobPipeline, LocalStorage, RunConfig, UploadOutcome};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn scraped_jobs() -> Value {
    json!([
        {
            "id": "in-1", "site": "indeed", "job_url": "https://jobs.example.com/1",
            "title": "Remote Pharmacist (PRN)", "company": "Acme Rx", "job_type": "fulltime",
            "interval": "monthly", "min_amount": 9000, "max_amount": 10000,
            "is_remote": true, "date_posted": "2024-05-01"
        },
        {
            "id": "li-7", "site": "linkedin", "job_url": "https://jobs.example.com/1",
            "title": "Remote Pharmacist (PRN)"
        },
        {
            "id": "in-2", "site": "indeed", "job_url": "https://jobs.example.com/2",
            "title": "Clinical \"Staff\" Pharmacist", "interval": "hourly", "min_amount": 62.5
        }
    ])
}

fn write_input(dir: &TempDir, data: &Value) -> String {
    let path = dir.path().join("scraped.json");
    std::fs::write(&path, serde_json::to_vec(data).unwrap()).unwrap();
    path.to_str().unwrap().to_string()
}

fn run_config(dir: &TempDir, input: String) -> RunConfig {
    RunConfig {
        input_path: Some(input),
        output_path: dir.path().join("output").to_str().unwrap().to_string(),
        ..RunConfig::default()
    }
}

fn upload_settings(server: &MockServer) -> UploadSettings {
    UploadSettings {
        url: server.base_url(),
        api_key: "service-key".to_string(),
        batch_size: 500,
        timeout: Duration::from_secs(5),
    }
}

async fn run(config: RunConfig) -> job_etl::Result<job_etl::RunReport> {
    let dispatcher = config.upload_dispatcher()?;
    let pipeline = JobPipeline::new(
        LocalStorage::new(".".to_string()),
        LocalStorage::new(config.output_path.clone()),
        config,
        Some("2024-05-02T10:00:00.000000".to_string()),
        dispatcher,
    )?;
    EtlEngine::new(pipeline).run().await
}

#[tokio::test]
async fn test_jobs_table_falls_back_to_insert() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let input = write_input(&temp_dir, &scraped_jobs());

    let server = MockServer::start();
    let upsert_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/rest/v1/jobs")
            .query_param("on_conflict", "application_url")
            .query_param_exists("columns")
            .header("prefer", "resolution=merge-duplicates,return=representation");
        then.status(400)
            .header("Content-Type", "application/json")
            .json_body(json!({
                "code": "42P10",
                "message": "there is no unique or exclusion constraint matching the ON CONFLICT specification",
                "details": null,
                "hint": null
            }));
    });
    let insert_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/rest/v1/jobs")
            .query_param_exists("columns")
            .header("prefer", "return=representation")
            .header("apikey", "service-key");
        then.status(201)
            .header("Content-Type", "application/json")
            .json_body(json!([{"id": 1}, {"id": 2}]));
    });

    let mut config = run_config(&temp_dir, input);
    config.table = "jobs".to_string();
    config.upload = Some(upload_settings(&server));

    let report = run(config).await?;

    upsert_mock.assert();
    insert_mock.assert();
    assert_eq!(report.scraped, 3);
    assert_eq!(report.duplicates_removed, 1);
    assert_eq!(report.transformed, 2);
    assert_eq!(
        report.upload,
        UploadOutcome::Uploaded {
            table: "jobs".to_string(),
            count: 2,
            inserted_without_conflict_key: true,
        }
    );
    assert_eq!(report.jobs_by_site[0], ("indeed".to_string(), 2));
    Ok(())
}

#[tokio::test]
async fn test_local_files_hold_raw_records() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let input = write_input(&temp_dir, &scraped_jobs());
    let config = run_config(&temp_dir, input);
    let output_dir = config.output_path.clone();

    let report = run(config).await?;

    assert!(matches!(report.upload, UploadOutcome::Skipped { .. }));
    assert_eq!(report.files_written.len(), 2);

    let json_path = Path::new(&output_dir).join("scraped_jobs.json");
    let saved: Vec<Value> = serde_json::from_slice(&std::fs::read(json_path)?)?;
    assert_eq!(saved.len(), 3);
    assert_eq!(saved[0]["site"], json!("indeed"));
    assert_eq!(saved[0]["date_posted"], json!("2024-05-01T00:00:00.000"));
    assert_eq!(saved[0]["scraped_at"], Value::Null);

    let csv_text = std::fs::read_to_string(Path::new(&output_dir).join("scraped_jobs.csv"))?;
    let lines: Vec<&str> = csv_text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("\"id\",\"site\",\"job_url\""));
    assert!(lines[3].contains("\"Clinical \\\"Staff\\\" Pharmacist\""));
    Ok(())
}

#[tokio::test]
async fn test_generic_table_upserts_on_job_url() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let input = write_input(&temp_dir, &scraped_jobs());

    let server = MockServer::start();
    let upsert_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/rest/v1/pharmacist_jobs")
            .query_param("on_conflict", "job_url")
            .header("authorization", "Bearer service-key");
        then.status(201);
    });

    let mut config = run_config(&temp_dir, input);
    config.upload = Some(upload_settings(&server));

    let report = run(config).await?;

    upsert_mock.assert();
    assert!(matches!(
        report.upload,
        UploadOutcome::Uploaded { count: 2, inserted_without_conflict_key: false, .. }
    ));
    Ok(())
}

#[tokio::test]
async fn test_upload_failure_keeps_local_files() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let input = write_input(&temp_dir, &scraped_jobs());

    let server = MockServer::start();
    let failing_mock = server.mock(|when, then| {
        when.method(POST).path("/rest/v1/pharmacist_jobs");
        then.status(500).body("upstream unavailable");
    });

    let mut config = run_config(&temp_dir, input);
    config.formats = vec![OutputFormat::Csv];
    config.upload = Some(upload_settings(&server));
    let output_dir = config.output_path.clone();

    let report = run(config).await?;

    failing_mock.assert();
    match &report.upload {
        UploadOutcome::Failed { error } => assert!(error.contains("upstream unavailable")),
        other => panic!("expected a failed upload, got {other:?}"),
    }
    assert!(Path::new(&output_dir).join("scraped_jobs.csv").exists());
    assert!(!Path::new(&output_dir).join("scraped_jobs.json").exists());
    Ok(())
}

#[tokio::test]
async fn test_json_lines_input_skips_non_objects() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("scraped.jsonl");
    std::fs::write(
        &path,
        "{\"job_url\": \"https://a/1\", \"site\": \"indeed\"}\n42\n{\"job_url\": \"https://a/2\", \"site\": \"google\"}\n",
    )?;

    let report = run(run_config(&temp_dir, path.to_str().unwrap().to_string())).await?;

    assert_eq!(report.scraped, 2);
    assert_eq!(report.transformed, 2);
    Ok(())
}

#[tokio::test]
async fn test_empty_input_writes_no_files() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let input = write_input(&temp_dir, &json!([]));
    let config = run_config(&temp_dir, input);
    let output_dir = config.output_path.clone();

    let report = run(config).await?;

    assert_eq!(report.scraped, 0);
    assert!(report.files_written.is_empty());
    assert!(!Path::new(&output_dir).exists());
    Ok(())
}

#[tokio::test]
async fn test_missing_input_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope.json").to_str().unwrap().to_string();

    let err = run(run_config(&temp_dir, missing)).await.unwrap_err();

    assert!(matches!(err, EtlError::IoError(_)));
    assert_eq!(err.exit_code(), 3);
}
