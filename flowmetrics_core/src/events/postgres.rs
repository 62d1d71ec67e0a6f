use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use super::models::{EventRecord, EventType};
use super::traits::EventLog;
use crate::config::{normalize_url, EventLogConfig};
use crate::{Error, Result};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS provenance_events (
    id             BIGINT PRIMARY KEY,
    event_time     TIMESTAMPTZ NOT NULL,
    component_type TEXT NOT NULL,
    event_type     TEXT NOT NULL,
    attributes     JSONB NOT NULL
)
"#;

/// Postgres-backed provenance event log.
///
/// The pool connects lazily so an unreachable database surfaces as a fetch
/// error on the trigger that needed it, not as a start-up failure.
#[derive(Debug, Clone)]
pub struct PgEventLog {
    pool: PgPool,
}

impl PgEventLog {
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn connect(cfg: &EventLogConfig) -> Result<Self> {
        let opts = PgConnectOptions::from_str(normalize_url(&cfg.url))
            .map_err(|e| Error::backend("pg_event_log connect options", e))?;
        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .acquire_timeout(cfg.acquire_timeout)
            .connect_lazy_with(opts);
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Append one event. Used by tooling and integration tests; the pipeline
    /// itself never writes to the log.
    #[tracing::instrument(level = "debug", skip_all, fields(event_id = event.id))]
    pub async fn append(&self, event: &EventRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO provenance_events
                (id, event_time, component_type, event_type, attributes)
            VALUES
                ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(event.id)
        .bind(event.event_time)
        .bind(&event.component_type)
        .bind(event.event_type.as_str())
        .bind(sqlx::types::Json(&event.attributes))
        .execute(&self.pool)
        .await
        .map_err(|e| Error::backend("pg_event_log append", e))?;
        Ok(())
    }
}

fn event_from_row(row: &PgRow) -> Result<EventRecord> {
    let id: i64 = row
        .try_get("id")
        .map_err(|e| Error::fetch("decode id", e))?;
    let event_time: DateTime<Utc> = row
        .try_get("event_time")
        .map_err(|e| Error::fetch("decode event_time", e))?;
    let component_type: String = row
        .try_get("component_type")
        .map_err(|e| Error::fetch("decode component_type", e))?;
    let event_type: String = row
        .try_get("event_type")
        .map_err(|e| Error::fetch("decode event_type", e))?;
    let attributes: sqlx::types::Json<BTreeMap<String, String>> = row
        .try_get("attributes")
        .map_err(|e| Error::fetch("decode attributes", e))?;

    Ok(EventRecord {
        id,
        event_time,
        component_type,
        event_type: EventType::parse_str(&event_type),
        attributes: attributes.0,
    })
}

#[async_trait]
impl EventLog for PgEventLog {
    fn name(&self) -> &'static str {
        "postgres"
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn fetch_events_after(&self, after_id: i64, limit: usize) -> Result<Vec<EventRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_time, component_type, event_type, attributes
              FROM provenance_events
             WHERE id > $1
             ORDER BY id ASC
             LIMIT $2
            "#,
        )
        .bind(after_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::fetch("pg_event_log fetch", e))?;

        rows.iter().map(event_from_row).collect()
    }

    #[tracing::instrument(level = "info", skip(self))]
    async fn migrate(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::backend("pg_event_log schema", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestInfra;
    use std::time::Duration;

    #[tokio::test]
    async fn fetches_in_id_order_after_lower_bound() {
        let Some(infra) = TestInfra::from_env() else {
            return;
        };
        let log = PgEventLog::connect(&EventLogConfig {
            url: infra.pg_url,
            max_connections: 2,
            acquire_timeout: Duration::from_secs(5),
        })
        .unwrap();
        log.migrate().await.unwrap();

        // Use a high id range so reruns against a shared database stay isolated.
        let base = (Utc::now().timestamp_millis() % 1_000_000) * 1_000_000;
        for offset in [2, 0, 1] {
            let mut attrs = BTreeMap::new();
            attrs.insert("s3.bucket".to_string(), "b1".to_string());
            log.append(&EventRecord::new(
                base + offset,
                "FetchS3Object",
                EventType::Fetch,
                attrs,
            ))
            .await
            .unwrap();
        }

        let events = log.fetch_events_after(base, 10).await.unwrap();
        let ids: Vec<i64> = events.iter().map(|e| e.id).collect();
        assert_eq!(&ids[..2], &[base + 1, base + 2]);
        assert_eq!(events[0].attribute("s3.bucket"), Some("b1"));
        assert_eq!(events[0].event_type, EventType::Fetch);
    }
}
