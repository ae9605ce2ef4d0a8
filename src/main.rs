use clap::Parser;
use job_etl::utils::{logger, validation::Validate};
use job_etl::{CliConfig, EtlEngine, JobPipeline, LocalStorage, UploadOutcome};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting job-etl");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = match cli.resolve().and_then(|config| config.validate().map(|_| config)) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(e.exit_code());
        }
    };

    let scraped_at = chrono::Utc::now().naive_utc().format("%Y-%m-%dT%H:%M:%S%.6f").to_string();
    let run = async {
        let dispatcher = config.upload_dispatcher()?;
        let pipeline = JobPipeline::new(
            LocalStorage::new(".".to_string()),
            LocalStorage::new(config.output_path.clone()),
            config.clone(),
            Some(scraped_at),
            dispatcher,
        )?;
        EtlEngine::new(pipeline).run().await
    };

    match run.await {
        Ok(report) => {
            println!("\nSummary:");
            println!("  Total jobs found: {}", report.scraped);
            println!("  Duplicates removed: {}", report.duplicates_removed);
            for path in &report.files_written {
                println!("  Results saved to {}", path);
            }
            if !report.jobs_by_site.is_empty() {
                println!("  Jobs by site:");
                for (site, count) in &report.jobs_by_site {
                    println!("    {:<16} {}", site, count);
                }
            }

            match &report.upload {
                UploadOutcome::Uploaded {
                    table,
                    count,
                    inserted_without_conflict_key,
                } => {
                    println!("✅ Uploaded {} jobs to table '{}'", count, table);
                    if *inserted_without_conflict_key {
                        println!("   (plain insert: no unique index on the conflict column)");
                    }
                }
                UploadOutcome::Skipped { reason } => println!("⏭️  Upload skipped: {}", reason),
                UploadOutcome::Failed { error } => {
                    eprintln!("❌ Error uploading jobs: {}", error);
                    eprintln!("   Local files were kept.");
                    std::process::exit(2);
                }
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ Job ETL failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            std::process::exit(e.exit_code());
        }
    }

    Ok(())
}
