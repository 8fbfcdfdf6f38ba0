use ans_expenses::api::{self, AppState};
use ans_expenses::etl::files;
use ans_expenses::utils::logger;
use ans_expenses::utils::validation::Validate;
use ans_expenses::{App, LocalStorage, TomlConfig};
use anyhow::Context;
use clap::Parser;

#[derive(Parser)]
#[command(name = "ans-api")]
#[command(about = "Serves the ANS expenses database over HTTP")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Listen address, overrides the configuration
    #[arg(long)]
    bind: Option<String>,

    /// Directory holding the database snapshot
    #[arg(long)]
    data_dir: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_server_logger(args.verbose, args.json_logs);

    let mut config = match &args.config {
        Some(path) => TomlConfig::from_file(path)
            .with_context(|| format!("failed to load config file '{}'", path))?,
        None => TomlConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.api.bind = bind;
    }
    if let Some(data_dir) = args.data_dir {
        config.storage.data_dir = data_dir;
    }
    config.validate().context("invalid configuration")?;

    let storage = LocalStorage::new(config.data_dir());
    let state = AppState::from_snapshot(&storage, files::DATABASE_FILE)
        .await
        .context("failed to load the database snapshot")?;
    if state.db.operadoras.is_empty() {
        tracing::warn!("Database is empty. Run `ans-etl` first to populate it.");
    }

    let app = App::new(state).use_router(api::router())?;
    app.mount(config.bind_addr()?).await?;
    Ok(())
}
