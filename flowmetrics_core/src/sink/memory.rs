use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;

use super::traits::{Sink, SinkWriter};
use crate::pipeline::models::FileMetric;
use crate::{Error, Result};

/// A row as the `files` table would hold it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFileMetric {
    pub metric: FileMetric,
    pub date: NaiveDate,
    pub ts_added: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    rows: Mutex<Vec<StoredFileMetric>>,
    fail_acquire: AtomicBool,
    fail_keys: Mutex<HashSet<String>>,
    acquired: AtomicU64,
    released: AtomicU64,
}

/// In-memory sink for unit tests, with failure injection.
#[derive(Clone, Default)]
pub struct MemorySink {
    state: Arc<State>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn rows(&self) -> Vec<StoredFileMetric> {
        self.state.rows.lock().await.clone()
    }

    pub async fn row_count(&self) -> usize {
        self.state.rows.lock().await.len()
    }

    /// Make `acquire` fail (simulates an unreachable database or bad credentials).
    pub fn set_fail_acquire(&self, fail: bool) {
        self.state.fail_acquire.store(fail, Ordering::SeqCst);
    }

    /// Make inserts of metrics with this object key fail.
    pub async fn fail_inserts_for_key(&self, key: impl Into<String>) {
        self.state.fail_keys.lock().await.insert(key.into());
    }

    pub async fn clear_insert_failures(&self) {
        self.state.fail_keys.lock().await.clear();
    }

    pub fn acquired(&self) -> u64 {
        self.state.acquired.load(Ordering::SeqCst)
    }

    /// Writers currently open (acquired and not yet released or dropped).
    pub fn open_writers(&self) -> u64 {
        self.acquired() - self.state.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn acquire(&self) -> Result<Box<dyn SinkWriter>> {
        if self.state.fail_acquire.load(Ordering::SeqCst) {
            return Err(Error::connection(
                "memory sink",
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "acquire disabled"),
            ));
        }
        self.state.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySinkWriter {
            state: self.state.clone(),
        }))
    }
}

struct MemorySinkWriter {
    state: Arc<State>,
}

impl Drop for MemorySinkWriter {
    fn drop(&mut self) {
        self.state.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SinkWriter for MemorySinkWriter {
    async fn insert_file_metric(&mut self, metric: &FileMetric) -> Result<u64> {
        if self.state.fail_keys.lock().await.contains(&metric.key) {
            return Err(Error::persistence(
                "memory sink insert",
                std::io::Error::other(format!("insert rejected for key {}", metric.key)),
            ));
        }
        let now = Utc::now();
        self.state.rows.lock().await.push(StoredFileMetric {
            metric: metric.clone(),
            date: now.date_naive(),
            ts_added: now,
        });
        Ok(1)
    }

    async fn release(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(key: &str) -> FileMetric {
        FileMetric {
            workload_id: "w1".to_string(),
            bucket_name: "b1".to_string(),
            key: key.to_string(),
            size: 1,
            last_modified: Utc::now(),
        }
    }

    #[tokio::test]
    async fn tracks_writer_lifecycle_including_drop() {
        let sink = MemorySink::new();
        let w1 = sink.acquire().await.unwrap();
        let w2 = sink.acquire().await.unwrap();
        assert_eq!(sink.open_writers(), 2);
        w1.release().await.unwrap();
        drop(w2);
        assert_eq!(sink.open_writers(), 0);
        assert_eq!(sink.acquired(), 2);
    }

    #[tokio::test]
    async fn injected_failures() {
        let sink = MemorySink::new();
        sink.fail_inserts_for_key("bad").await;
        let mut w = sink.acquire().await.unwrap();
        assert_eq!(w.insert_file_metric(&metric("good")).await.unwrap(), 1);
        assert!(matches!(
            w.insert_file_metric(&metric("bad")).await.unwrap_err(),
            Error::Persistence { .. }
        ));
        w.release().await.unwrap();
        assert_eq!(sink.row_count().await, 1);

        sink.set_fail_acquire(true);
        assert!(matches!(
            sink.acquire().await.err().unwrap(),
            Error::Connection { .. }
        ));
    }
}
