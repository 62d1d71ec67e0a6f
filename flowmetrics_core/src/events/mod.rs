#![forbid(unsafe_code)]

pub mod memory;
pub mod models;
pub mod postgres;
pub mod sqlite;
pub mod traits;

use std::sync::Arc;

use crate::config::{EventLogConfig, UrlScheme};
use crate::{Error, Result};

pub use models::{EventRecord, EventType};
pub use traits::EventLog;

/// Build the event log named by `cfg.url`.
pub fn from_config(cfg: &EventLogConfig) -> Result<Arc<dyn EventLog>> {
    match UrlScheme::detect(&cfg.url) {
        Some(UrlScheme::Postgres) => Ok(Arc::new(postgres::PgEventLog::connect(cfg)?)),
        Some(UrlScheme::Sqlite) => Ok(Arc::new(sqlite::SqliteEventLog::connect(cfg)?)),
        Some(UrlScheme::Log) | None => Err(Error::InvalidInput(format!(
            "unsupported event log url: {}",
            crate::config::redact(&cfg.url)
        ))),
    }
}
