use async_trait::async_trait;

use super::traits::{Sink, SinkWriter, FILES_TABLE};
use crate::pipeline::models::FileMetric;
use crate::Result;

/// Sink that only logs each metric. Selected with a `log://` connection string.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl Sink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn acquire(&self) -> Result<Box<dyn SinkWriter>> {
        Ok(Box::new(LogSinkWriter))
    }
}

struct LogSinkWriter;

#[async_trait]
impl SinkWriter for LogSinkWriter {
    async fn insert_file_metric(&mut self, metric: &FileMetric) -> Result<u64> {
        tracing::info!(
            table = FILES_TABLE,
            workload_id = %metric.workload_id,
            bucket_name = %metric.bucket_name,
            key = %metric.key,
            size = metric.size,
            last_modified = %metric.last_modified,
            "file metric"
        );
        Ok(0)
    }

    async fn release(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
