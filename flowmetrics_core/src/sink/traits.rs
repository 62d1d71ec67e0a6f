use std::time::Duration;

use async_trait::async_trait;

use crate::pipeline::models::FileMetric;
use crate::{Error, Result};

/// Logical table receiving one row per fetched object.
pub const FILES_TABLE: &str = "files";

/// A durable store for file metrics. Hands out one writer (connection) per trigger.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Open a connection. Failure is a `Error::Connection`.
    async fn acquire(&self) -> Result<Box<dyn SinkWriter>>;

    /// Create the `files` table if the backend owns a schema.
    async fn migrate(&self) -> Result<()> {
        Ok(())
    }

    /// Bounded-time connectivity check: acquire, then release.
    async fn probe(&self, timeout: Duration) -> Result<()> {
        let writer = tokio::time::timeout(timeout, self.acquire())
            .await
            .map_err(|e| Error::connection(format!("{} probe timed out", self.name()), e))??;
        writer.release().await
    }
}

/// An open sink connection.
///
/// Dropping a writer without calling `release` still closes the underlying
/// connection; `release` additionally reports close errors.
#[async_trait]
pub trait SinkWriter: Send {
    /// Insert one row. Returns the rows affected (expected 1). Never upserts.
    async fn insert_file_metric(&mut self, metric: &FileMetric) -> Result<u64>;

    async fn release(self: Box<Self>) -> Result<()>;
}
