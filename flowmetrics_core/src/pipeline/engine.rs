use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::config::{AdvancePolicy, PipelineConfig, DEFAULT_BATCH_SIZE};
use crate::events::traits::EventLog;
use crate::pipeline::cursor::{Cursor, CursorStore, FileCursorStore};
use crate::pipeline::extract::FieldExtractor;
use crate::pipeline::filter::EventFilter;
use crate::pipeline::models::{TriggerOutcome, TriggerStatus};
use crate::sink::traits::{Sink, SinkWriter};
use crate::{Error, Result};

/// Fetch, filter, extract, persist, advance.
///
/// One instance owns one cursor. `trigger` may be called from any task; calls
/// that overlap an in-flight trigger return `TriggerStatus::Busy` without
/// touching the log or the sink.
pub struct MetricsPipeline {
    event_log: Arc<dyn EventLog>,
    sink: Arc<dyn Sink>,
    cursor: Arc<Cursor>,
    filter: EventFilter,
    extractor: FieldExtractor,
    batch_size: usize,
    advance_policy: AdvancePolicy,
    cursor_store: Option<Arc<dyn CursorStore>>,
    trigger_lock: Mutex<()>,
}

impl MetricsPipeline {
    pub fn new(event_log: Arc<dyn EventLog>, sink: Arc<dyn Sink>, cursor: Arc<Cursor>) -> Self {
        Self {
            event_log,
            sink,
            cursor,
            filter: EventFilter::default(),
            extractor: FieldExtractor::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            advance_policy: AdvancePolicy::default(),
            cursor_store: None,
            trigger_lock: Mutex::new(()),
        }
    }

    /// Wire backends from config. With `cursor_path` set, the cursor is
    /// restored from that file and saved back after each trigger that moves it.
    #[tracing::instrument(level = "info", skip_all)]
    pub async fn from_config(cfg: &PipelineConfig) -> Result<Self> {
        cfg.validate()?;
        let event_log = crate::events::from_config(&cfg.event_log)?;
        let sink = crate::sink::from_config(&cfg.sink)?;

        let mut cursor = Cursor::new();
        let mut store: Option<Arc<dyn CursorStore>> = None;
        if let Some(path) = &cfg.cursor_path {
            let file_store = FileCursorStore::new(path);
            if let Some(id) = file_store.load().await? {
                tracing::info!(cursor = id, path = %path.display(), "restored cursor");
                cursor = Cursor::starting_at(id);
            }
            store = Some(Arc::new(file_store));
        }

        let mut pipeline = Self::new(event_log, sink, Arc::new(cursor))
            .with_filter(EventFilter::new(cfg.source_component_type.clone()))
            .with_batch_size(cfg.batch_size)?
            .with_advance_policy(cfg.advance_policy);
        if let Some(store) = store {
            pipeline = pipeline.with_cursor_store(store);
        }
        Ok(pipeline)
    }

    pub fn with_filter(mut self, filter: EventFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_extractor(mut self, extractor: FieldExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidInput("batch_size must be > 0".to_string()));
        }
        self.batch_size = batch_size;
        Ok(self)
    }

    pub fn with_advance_policy(mut self, policy: AdvancePolicy) -> Self {
        self.advance_policy = policy;
        self
    }

    pub fn with_cursor_store(mut self, store: Arc<dyn CursorStore>) -> Self {
        self.cursor_store = Some(store);
        self
    }

    pub fn cursor(&self) -> &Arc<Cursor> {
        &self.cursor
    }

    pub fn event_log(&self) -> &Arc<dyn EventLog> {
        &self.event_log
    }

    pub fn sink(&self) -> &Arc<dyn Sink> {
        &self.sink
    }

    /// Run one trigger. Never fails: every error is logged and reflected in
    /// the returned outcome.
    #[tracing::instrument(
        level = "info",
        name = "flowmetrics.pipeline.trigger",
        skip(self),
        fields(run_id = tracing::field::Empty)
    )]
    pub async fn trigger(&self) -> TriggerOutcome {
        let Ok(_running) = self.trigger_lock.try_lock() else {
            let mut outcome = TriggerOutcome::start(self.cursor.read());
            outcome.status = TriggerStatus::Busy;
            tracing::warn!(run_id = %outcome.run_id, "previous trigger still running; skipped");
            return outcome;
        };

        let mut outcome = TriggerOutcome::start(self.cursor.read());
        tracing::Span::current().record("run_id", tracing::field::display(outcome.run_id));

        self.run(&mut outcome).await;

        outcome.cursor_after = self.cursor.read();
        if outcome.cursor_after > outcome.cursor_before {
            if let Some(store) = &self.cursor_store {
                if let Err(e) = store.save(outcome.cursor_after).await {
                    tracing::warn!(error = %e, cursor = outcome.cursor_after, "failed to persist cursor");
                }
            }
        }
        outcome.finished_at = Utc::now();

        tracing::info!(
            run_id = %outcome.run_id,
            status = outcome.status.as_str(),
            cursor_before = outcome.cursor_before,
            cursor_after = outcome.cursor_after,
            fetched = outcome.fetched,
            consumed = outcome.consumed,
            matched = outcome.matched,
            written = outcome.written,
            rows_affected = outcome.rows_affected,
            extraction_failures = outcome.extraction_failures,
            sink_failures = outcome.sink_failures,
            "trigger finished"
        );
        outcome
    }

    async fn run(&self, outcome: &mut TriggerOutcome) {
        let mut writer = match self.sink.acquire().await {
            Ok(w) => w,
            Err(e) => {
                tracing::error!(sink = self.sink.name(), error = %e, "sink connection unavailable; trigger aborted");
                outcome.status = TriggerStatus::AbortedBeforeFetch;
                return;
            }
        };

        self.process(writer.as_mut(), outcome).await;

        // A dropped trigger future still drops (and closes) the writer.
        if let Err(e) = writer.release().await {
            tracing::warn!(sink = self.sink.name(), error = %e, "failed to release sink connection");
        }
    }

    async fn process(&self, writer: &mut dyn SinkWriter, outcome: &mut TriggerOutcome) {
        let after = outcome.cursor_before;
        let events = match self.event_log.fetch_events_after(after, self.batch_size).await {
            Ok(events) => events,
            Err(e) => {
                tracing::error!(event_log = self.event_log.name(), cursor = after, error = %e, "event log fetch failed");
                outcome.status = TriggerStatus::FetchFailed;
                return;
            }
        };
        outcome.fetched = events.len() as u64;

        for event in events {
            if event.id <= after {
                tracing::debug!(event_id = event.id, cursor = after, "ignoring event at or below cursor");
                continue;
            }

            if self.filter.matches(&event) {
                outcome.matched += 1;
                match self.extractor.extract(&event) {
                    Ok(metric) => match writer.insert_file_metric(&metric).await {
                        Ok(rows) => {
                            outcome.written += 1;
                            outcome.rows_affected += rows;
                        }
                        Err(e) => {
                            outcome.sink_failures += 1;
                            tracing::error!(event_id = event.id, key = %metric.key, error = %e, "sink write failed");
                            if self.advance_policy == AdvancePolicy::OnSuccess {
                                outcome.status = TriggerStatus::PartialFailure;
                                return;
                            }
                        }
                    },
                    Err(e) => {
                        outcome.extraction_failures += 1;
                        tracing::warn!(event_id = event.id, field = %e.field(), error = %e, "skipping event");
                    }
                }
            }

            self.cursor.advance(event.id);
            outcome.consumed += 1;
        }
    }
}
