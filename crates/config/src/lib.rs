//! Layered configuration: built-in defaults, an optional file, then
//! `INKVAULT_*` environment variables.

mod config;
pub mod error;

pub use crate::config::{
    CanvasConfig, Config, ENV_PREFIX, Environment, FetchConfig, HttpConfig, LocalStorageConfig, MigrationConfig,
    RetryConfig, S3Config, ScheduleConfig, StorageConfig, StorageMode,
};
