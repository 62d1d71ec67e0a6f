//! SQLite sink for single-node and local setups.
//!
//! The file is created on first use. Credentials in the config are ignored.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode};
use sqlx::Connection;

use super::traits::{Sink, SinkWriter};
use crate::config::{normalize_url, SinkConfig};
use crate::pipeline::models::FileMetric;
use crate::{Error, Result};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS files (
  workload_id TEXT,
  bucket_name TEXT,
  key TEXT,
  size INTEGER,
  last_modified TEXT,
  date TEXT NOT NULL DEFAULT CURRENT_DATE,
  ts_added TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
)
"#;

const INSERT_FILE_METRIC: &str = r#"
INSERT INTO files
  (workload_id, bucket_name, key, size, last_modified, date, ts_added)
VALUES
  (?1, ?2, ?3, ?4, ?5, CURRENT_DATE, CURRENT_TIMESTAMP)
"#;

#[derive(Debug, Clone)]
pub struct SqliteSink {
    options: SqliteConnectOptions,
    connect_timeout: Duration,
}

impl SqliteSink {
    pub fn from_config(cfg: &SinkConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(normalize_url(&cfg.connection_string))
            .map_err(|e| Error::InvalidInput(format!("invalid sqlite connection string: {e}")))?
            .journal_mode(SqliteJournalMode::Wal)
            .create_if_missing(true);
        Ok(Self {
            options,
            connect_timeout: cfg.connect_timeout,
        })
    }

    async fn connect(&self) -> Result<SqliteConnection> {
        tokio::time::timeout(
            self.connect_timeout,
            SqliteConnection::connect_with(&self.options),
        )
        .await
        .map_err(|e| Error::connection("sqlite connect timed out", e))?
        .map_err(|e| Error::connection("sqlite connect", e))
    }
}

#[async_trait]
impl Sink for SqliteSink {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn acquire(&self) -> Result<Box<dyn SinkWriter>> {
        let conn = self.connect().await?;
        Ok(Box::new(SqliteSinkWriter { conn }))
    }

    async fn migrate(&self) -> Result<()> {
        let mut conn = self.connect().await?;
        sqlx::query(SCHEMA)
            .execute(&mut conn)
            .await
            .map_err(|e| Error::backend("sqlite_sink schema", e))?;
        conn.close()
            .await
            .map_err(|e| Error::backend("sqlite_sink close", e))
    }
}

struct SqliteSinkWriter {
    conn: SqliteConnection,
}

#[async_trait]
impl SinkWriter for SqliteSinkWriter {
    async fn insert_file_metric(&mut self, metric: &FileMetric) -> Result<u64> {
        let res = sqlx::query(INSERT_FILE_METRIC)
            .bind(&metric.workload_id)
            .bind(&metric.bucket_name)
            .bind(&metric.key)
            .bind(metric.size)
            .bind(metric.last_modified.to_rfc3339())
            .execute(&mut self.conn)
            .await
            .map_err(|e| Error::persistence("sqlite insert into files", e))?;
        Ok(res.rows_affected())
    }

    async fn release(self: Box<Self>) -> Result<()> {
        self.conn
            .close()
            .await
            .map_err(|e| Error::backend("sqlite close", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::temp_sqlite_url;
    use chrono::DateTime;
    use sqlx::Row;

    fn sink(url: String) -> SqliteSink {
        SqliteSink::from_config(&SinkConfig {
            connection_string: url,
            ..SinkConfig::default()
        })
        .unwrap()
    }

    fn metric() -> FileMetric {
        FileMetric {
            workload_id: "w1".to_string(),
            bucket_name: "b1".to_string(),
            key: "k1".to_string(),
            size: 42,
            last_modified: DateTime::from_timestamp_millis(1_600_000_000_000).unwrap(),
        }
    }

    #[tokio::test]
    async fn writes_rows_with_server_side_ingestion_metadata() {
        let url = temp_sqlite_url("sink");
        let sink = sink(url.clone());
        sink.migrate().await.unwrap();

        let mut writer = sink.acquire().await.unwrap();
        assert_eq!(writer.insert_file_metric(&metric()).await.unwrap(), 1);
        writer.release().await.unwrap();

        let mut conn = SqliteConnection::connect(&url).await.unwrap();
        let row = sqlx::query(
            "SELECT workload_id, bucket_name, key, size, last_modified, date, ts_added FROM files",
        )
        .fetch_one(&mut conn)
        .await
        .unwrap();
        assert_eq!(row.get::<String, _>("workload_id"), "w1");
        assert_eq!(row.get::<String, _>("bucket_name"), "b1");
        assert_eq!(row.get::<String, _>("key"), "k1");
        assert_eq!(row.get::<i64, _>("size"), 42);
        assert_eq!(
            row.get::<String, _>("last_modified"),
            "2020-09-13T12:26:40+00:00"
        );
        assert!(!row.get::<String, _>("date").is_empty());
        assert!(!row.get::<String, _>("ts_added").is_empty());
    }

    #[tokio::test]
    async fn same_metric_twice_is_two_rows() {
        let url = temp_sqlite_url("dupes");
        let sink = sink(url.clone());
        sink.migrate().await.unwrap();

        let mut writer = sink.acquire().await.unwrap();
        writer.insert_file_metric(&metric()).await.unwrap();
        writer.insert_file_metric(&metric()).await.unwrap();
        writer.release().await.unwrap();

        let mut conn = SqliteConnection::connect(&url).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files")
            .fetch_one(&mut conn)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn insert_without_table_is_a_persistence_error() {
        let sink = sink(temp_sqlite_url("no_table"));
        let mut writer = sink.acquire().await.unwrap();
        let err = writer.insert_file_metric(&metric()).await.unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
        writer.release().await.unwrap();
    }

    #[tokio::test]
    async fn probe_succeeds_for_a_writable_file() {
        let sink = sink(temp_sqlite_url("probe"));
        sink.probe(Duration::from_secs(5)).await.unwrap();
    }
}
