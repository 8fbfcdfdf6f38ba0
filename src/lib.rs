pub mod api;
pub mod app;
pub mod client;
pub mod config;
pub mod core;
pub mod db;
pub mod domain;
pub mod etl;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Step};
pub use config::{LocalStorage, TomlConfig};

pub use app::{pipelines::ExpensePipeline, App};
pub use client::{api as shared_client, ApiClient, DEFAULT_BASE_URL};
pub use core::etl::EtlEngine;
pub use utils::error::{EtlError, Result};
