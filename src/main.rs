use ans_expenses::etl::{aggregator, consolidator, importer, scraper, transformer, validator};
use ans_expenses::utils::error::{ErrorSeverity, EtlError};
use ans_expenses::utils::logger;
use ans_expenses::{CliConfig, EtlEngine, ExpensePipeline, LocalStorage, Step, TomlConfig};
use clap::Parser;
use reqwest::Client;

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    logger::init_cli_logger(cli.verbose);
    tracing::info!("Starting ans-etl");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = match cli.resolve() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    if config.monitoring.system_stats {
        tracing::info!("🔍 System monitoring enabled");
    }

    match run_step(cli.step(), config).await {
        Ok(message) => {
            tracing::info!("✅ {}", message);
            println!("✅ {}", message);
        }
        Err(e) => {
            tracing::error!(
                "❌ Pipeline failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }
}

async fn run_step(step: Step, config: TomlConfig) -> Result<String, EtlError> {
    let storage = LocalStorage::new(config.data_dir());
    let client = Client::new();

    match step {
        Step::Run => {
            let monitor = config.monitoring.system_stats;
            let data_dir = config.data_dir().to_string();
            let engine =
                EtlEngine::new_with_monitoring(ExpensePipeline::new(storage, config), monitor);
            let snapshot = engine.run().await?;
            Ok(format!(
                "Pipeline finished, database ready for the API: {}/{}",
                data_dir, snapshot
            ))
        }
        Step::Scrape => {
            let saved = scraper::scrape_statements(&client, &storage, &config).await?;
            Ok(format!("{} archive(s) in raw/", saved.len()))
        }
        Step::Consolidate => {
            let rows = consolidator::consolidate(&storage).await?;
            Ok(format!("{} expense lines consolidated", rows.len()))
        }
        Step::Transform => {
            let result = transformer::transform(&client, &storage, &config, None).await?;
            Ok(format!(
                "{} valid lines, {} inconsistencies",
                result.valid.len(),
                result.invalid.len()
            ))
        }
        Step::Aggregate => {
            let aggregates = aggregator::run_aggregation(&storage, None).await?;
            Ok(format!("{} operators aggregated", aggregates.len()))
        }
        Step::Import => {
            let summary = importer::load_data(&storage, config.database.full_refresh).await?;
            Ok(format!(
                "Loaded {} operators, {} expenses, {} aggregates",
                summary.operators, summary.detailed_expenses, summary.aggregates
            ))
        }
        Step::Validate => {
            let report = validator::validate_output(&storage).await?;
            if report.is_clean() {
                Ok(format!("{} rows checked, no anomalies", report.total_rows))
            } else {
                Err(EtlError::ValidationError {
                    message: format!(
                        "{} of {} rows do not mention EVENTO/SINISTRO",
                        report.unexpected_descriptions.len(),
                        report.total_rows
                    ),
                })
            }
        }
    }
}
