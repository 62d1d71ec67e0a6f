use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Value meaning "nothing consumed yet".
pub const CURSOR_START: i64 = -1;

/// Watermark over the event log: the id of the last consumed event.
///
/// `advance` is a lock-free max, so concurrent or out-of-order completions can
/// never move it backwards.
#[derive(Debug)]
pub struct Cursor {
    last_processed_id: AtomicI64,
}

impl Default for Cursor {
    fn default() -> Self {
        Self::new()
    }
}

impl Cursor {
    pub fn new() -> Self {
        Self::starting_at(CURSOR_START)
    }

    pub fn starting_at(last_processed_id: i64) -> Self {
        Self {
            last_processed_id: AtomicI64::new(last_processed_id.max(CURSOR_START)),
        }
    }

    pub fn read(&self) -> i64 {
        self.last_processed_id.load(Ordering::Acquire)
    }

    /// Set the watermark to `max(current, id)`. Returns true if it moved.
    pub fn advance(&self, id: i64) -> bool {
        self.last_processed_id.fetch_max(id, Ordering::AcqRel) < id
    }
}

/// Durable home for the cursor between process restarts.
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn load(&self) -> Result<Option<i64>>;
    async fn save(&self, last_processed_id: i64) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct CursorFile {
    last_processed_id: i64,
    updated_at: DateTime<Utc>,
}

/// Stores the cursor as a small JSON document, replaced atomically via rename.
#[derive(Debug, Clone)]
pub struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CursorStore for FileCursorStore {
    #[tracing::instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Option<i64>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::backend("read cursor file", e)),
        };
        let doc: CursorFile =
            serde_json::from_slice(&bytes).map_err(|e| Error::backend("parse cursor file", e))?;
        Ok(Some(doc.last_processed_id))
    }

    #[tracing::instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    async fn save(&self, last_processed_id: i64) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::backend("cursor dir mkdir", e))?;
        }
        let doc = CursorFile {
            last_processed_id,
            updated_at: Utc::now(),
        };
        let bytes =
            serde_json::to_vec_pretty(&doc).map_err(|e| Error::backend("serialize cursor", e))?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| Error::backend("write cursor file", e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::backend("rename cursor file", e))?;
        Ok(())
    }
}
