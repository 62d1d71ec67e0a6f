use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One fetched object, extracted from a `FETCH` provenance event.
///
/// Never mutated after extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetric {
    pub workload_id: String,
    pub bucket_name: String,
    pub key: String,
    pub size: i64,
    pub last_modified: DateTime<Utc>,
}

/// Terminal state of one trigger invocation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStatus {
    /// Every fetched event was consumed (including an empty fetch).
    Completed,
    /// The sink connection could not be acquired; nothing was read.
    AbortedBeforeFetch,
    /// The event log call failed; nothing was consumed.
    FetchFailed,
    /// Processing stopped mid-batch; the cursor reflects progress so far.
    PartialFailure,
    /// Another trigger of the same pipeline was still running.
    Busy,
}

impl TriggerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::AbortedBeforeFetch => "aborted_before_fetch",
            Self::FetchFailed => "fetch_failed",
            Self::PartialFailure => "partial_failure",
            Self::Busy => "busy",
        }
    }
}

/// What a trigger did. Returned for observability; errors themselves end at the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerOutcome {
    pub run_id: Uuid,
    pub status: TriggerStatus,
    pub cursor_before: i64,
    pub cursor_after: i64,
    /// Events returned by the log.
    pub fetched: u64,
    /// Events the cursor moved past.
    pub consumed: u64,
    /// Events that passed the filter.
    pub matched: u64,
    /// Successful sink writes.
    pub written: u64,
    /// Sum of rows reported by the sink.
    pub rows_affected: u64,
    pub extraction_failures: u64,
    pub sink_failures: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TriggerOutcome {
    pub(crate) fn start(cursor_before: i64) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            status: TriggerStatus::Completed,
            cursor_before,
            cursor_after: cursor_before,
            fetched: 0,
            consumed: 0,
            matched: 0,
            written: 0,
            rows_affected: 0,
            extraction_failures: 0,
            sink_failures: 0,
            started_at: now,
            finished_at: now,
        }
    }
}
