use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;

use super::traits::{Sink, SinkWriter};
use crate::config::{normalize_url, SinkConfig};
use crate::pipeline::models::FileMetric;
use crate::{Error, Result};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    workload_id   TEXT,
    bucket_name   TEXT,
    key           TEXT,
    size          BIGINT,
    last_modified TIMESTAMPTZ,
    date          DATE NOT NULL DEFAULT CURRENT_DATE,
    ts_added      TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
)
"#;

// Parsed once per connection: sqlx keeps a per-connection prepared statement cache.
const INSERT_FILE_METRIC: &str = r#"
INSERT INTO files
    (workload_id, bucket_name, key, size, last_modified, date, ts_added)
VALUES
    ($1, $2, $3, $4, $5, CURRENT_DATE, CURRENT_TIMESTAMP)
"#;

/// Postgres sink. Credentials come from the config, not the connection string.
#[derive(Clone)]
pub struct PgSink {
    options: PgConnectOptions,
    connect_timeout: Duration,
}

impl PgSink {
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn from_config(cfg: &SinkConfig) -> Result<Self> {
        let options = PgConnectOptions::from_str(normalize_url(&cfg.connection_string))
            .map_err(|e| Error::InvalidInput(format!("invalid postgres connection string: {e}")))?
            .username(&cfg.user)
            .password(&cfg.password);
        Ok(Self {
            options,
            connect_timeout: cfg.connect_timeout,
        })
    }

    async fn connect(&self) -> Result<PgConnection> {
        tokio::time::timeout(self.connect_timeout, PgConnection::connect_with(&self.options))
            .await
            .map_err(|e| Error::connection("postgres connect timed out", e))?
            .map_err(|e| Error::connection("postgres connect", e))
    }
}

#[async_trait]
impl Sink for PgSink {
    fn name(&self) -> &'static str {
        "postgres"
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn acquire(&self) -> Result<Box<dyn SinkWriter>> {
        let conn = self.connect().await?;
        tracing::debug!("connected to postgres sink");
        Ok(Box::new(PgSinkWriter { conn }))
    }

    #[tracing::instrument(level = "info", skip(self))]
    async fn migrate(&self) -> Result<()> {
        let mut conn = self.connect().await?;
        sqlx::query(SCHEMA)
            .execute(&mut conn)
            .await
            .map_err(|e| Error::backend("pg_sink schema", e))?;
        conn.close()
            .await
            .map_err(|e| Error::backend("pg_sink close", e))
    }
}

struct PgSinkWriter {
    conn: PgConnection,
}

#[async_trait]
impl SinkWriter for PgSinkWriter {
    async fn insert_file_metric(&mut self, metric: &FileMetric) -> Result<u64> {
        let res = sqlx::query(INSERT_FILE_METRIC)
            .bind(&metric.workload_id)
            .bind(&metric.bucket_name)
            .bind(&metric.key)
            .bind(metric.size)
            .bind(metric.last_modified)
            .execute(&mut self.conn)
            .await
            .map_err(|e| Error::persistence("postgres insert into files", e))?;
        Ok(res.rows_affected())
    }

    async fn release(self: Box<Self>) -> Result<()> {
        self.conn
            .close()
            .await
            .map_err(|e| Error::backend("postgres close", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestInfra;
    use chrono::DateTime;

    #[tokio::test]
    async fn unreachable_server_is_a_connection_error() {
        let sink = PgSink::from_config(&SinkConfig {
            connection_string: "postgres://127.0.0.1:1/monitoring".to_string(),
            connect_timeout: Duration::from_millis(500),
            ..SinkConfig::default()
        })
        .unwrap();
        let err = sink.acquire().await.err().unwrap();
        assert!(matches!(err, Error::Connection { .. }));
    }

    #[test]
    fn accepts_jdbc_connection_strings() {
        let sink = PgSink::from_config(&SinkConfig {
            connection_string: "jdbc:postgresql://db.internal:5432/monitoring".to_string(),
            ..SinkConfig::default()
        })
        .unwrap();
        assert_eq!(sink.options.get_host(), "db.internal");
        assert_eq!(sink.options.get_database(), Some("monitoring"));
    }

    #[tokio::test]
    async fn inserts_one_row_per_call() {
        let Some(infra) = TestInfra::from_env() else {
            return;
        };
        let sink = PgSink::from_config(&infra.sink_config()).unwrap();
        sink.migrate().await.unwrap();

        let key = format!("k-{}", uuid::Uuid::new_v4());
        let metric = FileMetric {
            workload_id: "w1".to_string(),
            bucket_name: "b1".to_string(),
            key: key.clone(),
            size: 42,
            last_modified: DateTime::from_timestamp_millis(1_600_000_000_000).unwrap(),
        };

        let mut writer = sink.acquire().await.unwrap();
        assert_eq!(writer.insert_file_metric(&metric).await.unwrap(), 1);
        assert_eq!(writer.insert_file_metric(&metric).await.unwrap(), 1);
        writer.release().await.unwrap();

        let pool = sqlx::PgPool::connect(&infra.pg_url).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE key = $1")
            .bind(&key)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }
}
