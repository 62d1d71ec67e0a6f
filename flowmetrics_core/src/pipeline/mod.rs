pub mod cursor;
pub mod engine;
pub mod extract;
pub mod filter;
pub mod models;
pub mod scheduler;

pub use cursor::{Cursor, CursorStore, FileCursorStore, CURSOR_START};
pub use engine::MetricsPipeline;
pub use extract::{AttributeKeys, ExtractionError, FieldExtractor, MetricField};
pub use filter::EventFilter;
pub use models::{FileMetric, TriggerOutcome, TriggerStatus};
pub use scheduler::PipelineScheduler;
