#![forbid(unsafe_code)]

pub mod log;
pub mod memory;
pub mod postgres;
pub mod sqlite;
pub mod traits;

use std::sync::Arc;

use crate::config::{SinkConfig, UrlScheme};
use crate::{Error, Result};

pub use traits::{Sink, SinkWriter, FILES_TABLE};

/// Build the sink named by the connection string's scheme.
pub fn from_config(cfg: &SinkConfig) -> Result<Arc<dyn Sink>> {
    match UrlScheme::detect(&cfg.connection_string) {
        Some(UrlScheme::Postgres) => Ok(Arc::new(postgres::PgSink::from_config(cfg)?)),
        Some(UrlScheme::Sqlite) => Ok(Arc::new(sqlite::SqliteSink::from_config(cfg)?)),
        Some(UrlScheme::Log) => Ok(Arc::new(log::LogSink)),
        None => Err(Error::InvalidInput(format!(
            "unsupported sink connection string: {}",
            crate::config::redact(&cfg.connection_string)
        ))),
    }
}
