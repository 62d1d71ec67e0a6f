//! Flowmetrics core library: provenance event ingestion into a file metrics table.

pub mod config;
pub mod error;
pub mod events;
pub mod o11y;
pub mod pipeline;
pub mod sink;

#[cfg(test)]
mod test_support;

pub use config::{AdvancePolicy, EventLogConfig, PipelineConfig, SinkConfig};
pub use error::{Error, Result};
pub use events::{EventLog, EventRecord, EventType};
pub use pipeline::{
    Cursor, CursorStore, EventFilter, FieldExtractor, FileCursorStore, FileMetric,
    MetricsPipeline, PipelineScheduler, TriggerOutcome, TriggerStatus,
};
pub use sink::{Sink, SinkWriter};
