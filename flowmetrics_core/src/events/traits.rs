use std::time::Duration;

use async_trait::async_trait;

use super::models::EventRecord;
use crate::{Error, Result};

/// Ordered, durable source of provenance events.
///
/// Every call is independent: no server-side cursor is held open between calls.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Up to `limit` events with `id > after_id`, ascending by id.
    async fn fetch_events_after(&self, after_id: i64, limit: usize) -> Result<Vec<EventRecord>>;

    /// Create backing storage if the implementation owns any.
    async fn migrate(&self) -> Result<()> {
        Ok(())
    }

    /// Bounded-time reachability check.
    async fn probe(&self, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.fetch_events_after(i64::MAX - 1, 1))
            .await
            .map_err(|e| Error::fetch(format!("{} probe timed out", self.name()), e))?
            .map(|_| ())
    }
}
