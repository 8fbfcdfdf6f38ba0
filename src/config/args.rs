use crate::utils::error::Result;
use crate::utils::validation::Validate;
use clap::{Parser, Subcommand};
use super::toml_config::TomlConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "ans-etl")]
#[command(about = "Collects ANS accounting statements and builds the expenses database")]
pub struct CliConfig {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Root of raw/ and processed/ data
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Number of statement archives to download
    #[arg(long)]
    pub max_downloads: Option<usize>,

    /// Append to the existing database instead of replacing it
    #[arg(long)]
    pub append: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub step: Option<Step>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Step {
    /// Run all five steps (default)
    Run,
    /// 1/5: download statement archives
    Scrape,
    /// 2/5: extract event/claim expenses from the archives
    Consolidate,
    /// 3/5: join with the operator registry and validate CNPJs
    Transform,
    /// 4/5: per-operator statistics
    Aggregate,
    /// 5/5: load processed files into the database snapshot
    Import,
    /// Report on the consolidated expenses file
    Validate,
}

impl CliConfig {
    /// Configuration file (or defaults) with command line overrides applied.
    pub fn resolve(&self) -> Result<TomlConfig> {
        let mut config = match &self.config {
            Some(path) => TomlConfig::from_file(path)?,
            None => TomlConfig::default(),
        };

        if let Some(data_dir) = &self.data_dir {
            config.storage.data_dir = data_dir.clone();
        }
        if let Some(max_downloads) = self.max_downloads {
            config.source.max_downloads = max_downloads;
        }
        if self.append {
            config.database.full_refresh = false;
        }
        if self.monitor {
            config.monitoring.system_stats = true;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn step(&self) -> Step {
        self.step.unwrap_or(Step::Run)
    }
}
