//! SQLite-backed provenance event log.
//!
//! Designed for single-node/local deployments where the provenance log is
//! exported to a file rather than a shared database.

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use super::models::{EventRecord, EventType};
use super::traits::EventLog;
use crate::config::{normalize_url, EventLogConfig};
use crate::{Error, Result};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS provenance_events (
  id INTEGER PRIMARY KEY,
  event_time TEXT NOT NULL,
  component_type TEXT NOT NULL,
  event_type TEXT NOT NULL,
  attributes_json TEXT NOT NULL
)
"#;

#[derive(Debug, Clone)]
pub struct SqliteEventLog {
    pool: SqlitePool,
}

impl SqliteEventLog {
    pub fn connect(cfg: &EventLogConfig) -> Result<Self> {
        let opts = SqliteConnectOptions::from_str(normalize_url(&cfg.url))
            .map_err(|e| Error::backend("sqlite_event_log connect options", e))?
            .journal_mode(SqliteJournalMode::Wal)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(cfg.max_connections)
            .acquire_timeout(cfg.acquire_timeout)
            .connect_lazy_with(opts);
        Ok(Self { pool })
    }

    pub async fn append(&self, event: &EventRecord) -> Result<()> {
        let attributes_json = serde_json::to_string(&event.attributes)
            .map_err(|e| Error::backend("serialize attributes", e))?;
        sqlx::query(
            r#"
INSERT INTO provenance_events
  (id, event_time, component_type, event_type, attributes_json)
VALUES
  (?1, ?2, ?3, ?4, ?5)
"#,
        )
        .bind(event.id)
        .bind(event.event_time.to_rfc3339())
        .bind(&event.component_type)
        .bind(event.event_type.as_str())
        .bind(attributes_json)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::backend("sqlite_event_log append", e))?;
        Ok(())
    }
}

fn event_from_row(row: &SqliteRow) -> Result<EventRecord> {
    let event_time: String = row.get("event_time");
    let event_time = DateTime::parse_from_rfc3339(&event_time)
        .map_err(|e| Error::fetch("parse event_time", e))?
        .with_timezone(&Utc);
    let event_type: String = row.get("event_type");
    let attributes_json: String = row.get("attributes_json");
    let attributes: BTreeMap<String, String> = serde_json::from_str(&attributes_json)
        .map_err(|e| Error::fetch("parse attributes_json", e))?;

    Ok(EventRecord {
        id: row.get("id"),
        event_time,
        component_type: row.get("component_type"),
        event_type: EventType::parse_str(&event_type),
        attributes,
    })
}

#[async_trait]
impl EventLog for SqliteEventLog {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn fetch_events_after(&self, after_id: i64, limit: usize) -> Result<Vec<EventRecord>> {
        let rows = sqlx::query(
            r#"
SELECT id, event_time, component_type, event_type, attributes_json
FROM provenance_events
WHERE id > ?1
ORDER BY id ASC
LIMIT ?2
"#,
        )
        .bind(after_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::fetch("sqlite_event_log fetch", e))?;

        rows.iter().map(event_from_row).collect()
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::backend("sqlite_event_log schema", e))?;
        Ok(())
    }
}
