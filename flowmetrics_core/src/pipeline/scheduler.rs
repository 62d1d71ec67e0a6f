use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use crate::pipeline::engine::MetricsPipeline;
use crate::{Error, Result};

/// Fires `MetricsPipeline::trigger` on a fixed interval.
///
/// Triggers run inline on the loop task, so a slow trigger delays the next
/// tick instead of overlapping it.
pub struct PipelineScheduler {
    pipeline: Arc<MetricsPipeline>,
    interval: Duration,
}

impl PipelineScheduler {
    #[tracing::instrument(level = "debug", skip(pipeline))]
    pub fn new(pipeline: Arc<MetricsPipeline>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::InvalidInput("poll_interval must be > 0".to_string()));
        }
        Ok(Self { pipeline, interval })
    }

    pub fn pipeline(&self) -> &Arc<MetricsPipeline> {
        &self.pipeline
    }

    /// Trigger immediately, then once per interval, until `shutdown` flips to
    /// true or its sender is dropped. An in-flight trigger always finishes.
    #[tracing::instrument(level = "info", skip_all, fields(interval_ms = self.interval.as_millis() as u64))]
    pub async fn run_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let mut tick = time::interval(self.interval);
        tick.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = tick.tick() => {
                    self.pipeline.trigger().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!(cursor = self.pipeline.cursor().read(), "scheduler stopped");
    }
}
