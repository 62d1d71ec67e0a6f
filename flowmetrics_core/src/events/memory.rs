use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::models::EventRecord;
use super::traits::EventLog;
use crate::{Error, Result};

/// In-memory event log for local development and unit tests.
///
/// Append enforces the strictly-increasing id invariant of the real log.
#[derive(Clone, Default)]
pub struct MemoryEventLog {
    events: Arc<Mutex<Vec<EventRecord>>>,
    fail_fetch: Arc<AtomicBool>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, event: EventRecord) -> Result<()> {
        if event.id < 0 {
            return Err(Error::InvalidInput(format!(
                "event id must be non-negative, got {}",
                event.id
            )));
        }
        let mut events = self.events.lock().await;
        if let Some(last) = events.last() {
            if event.id <= last.id {
                return Err(Error::InvalidInput(format!(
                    "event id {} is not greater than last id {}",
                    event.id, last.id
                )));
            }
        }
        events.push(event);
        Ok(())
    }

    pub async fn extend(&self, events: impl IntoIterator<Item = EventRecord>) -> Result<()> {
        for event in events {
            self.append(event).await?;
        }
        Ok(())
    }

    /// Make subsequent fetches fail (simulates an unreachable provider).
    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.events.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.lock().await.is_empty()
    }
}

#[async_trait]
impl EventLog for MemoryEventLog {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn fetch_events_after(&self, after_id: i64, limit: usize) -> Result<Vec<EventRecord>> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(Error::fetch(
                "memory event log",
                std::io::Error::new(std::io::ErrorKind::NotConnected, "fetch disabled"),
            ));
        }
        let events = self.events.lock().await;
        let start = events.partition_point(|e| e.id <= after_id);
        Ok(events[start..].iter().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::events::models::EventType;

    fn ev(id: i64) -> EventRecord {
        EventRecord::new(id, "LogAttribute", EventType::Receive, BTreeMap::new())
    }

    #[tokio::test]
    async fn rejects_non_increasing_ids() {
        let log = MemoryEventLog::new();
        log.append(ev(3)).await.unwrap();
        assert!(log.append(ev(3)).await.is_err());
        assert!(log.append(ev(2)).await.is_err());
        assert!(log.append(ev(-1)).await.is_err());
        assert_eq!(log.len().await, 1);
    }

    #[tokio::test]
    async fn fetch_is_exclusive_of_lower_bound_and_bounded_by_limit() {
        let log = MemoryEventLog::new();
        log.extend((0..10).map(ev)).await.unwrap();

        let ids: Vec<i64> = log
            .fetch_events_after(-1, 3)
            .await
            .unwrap()
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![0, 1, 2]);

        let ids: Vec<i64> = log
            .fetch_events_after(7, 100)
            .await
            .unwrap()
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![8, 9]);

        assert!(log.fetch_events_after(9, 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_is_a_fetch_error() {
        let log = MemoryEventLog::new();
        log.set_fail_fetch(true);
        let err = log.fetch_events_after(-1, 10).await.unwrap_err();
        assert!(matches!(err, Error::Fetch { .. }));
    }
}
