use std::error::Error as StdError;

use crate::pipeline::extract::ExtractionError;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Common error type for `flowmetrics_core`.
///
/// Backend implementations (Postgres, SQLite, files) should preserve the
/// underlying error chain via the constructor helpers below.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// Sink unreachable or authentication failed.
    #[error("connection error: {context}")]
    Connection {
        context: String,
        #[source]
        source: BoxError,
    },

    /// Event log provider call failed.
    #[error("fetch error: {context}")]
    Fetch {
        context: String,
        #[source]
        source: BoxError,
    },

    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Sink insert failed.
    #[error("persistence error: {context}")]
    Persistence {
        context: String,
        #[source]
        source: BoxError,
    },

    #[error("backend error: {context}")]
    Backend {
        context: String,
        #[source]
        source: BoxError,
    },
}

impl Error {
    pub fn connection(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            context: context.into(),
            source: Box::new(source),
        }
    }

    pub fn fetch(context: impl Into<String>, source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Fetch {
            context: context.into(),
            source: Box::new(source),
        }
    }

    pub fn persistence(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Persistence {
            context: context.into(),
            source: Box::new(source),
        }
    }

    #[tracing::instrument(level = "debug", name = "flowmetrics.error.backend", skip(source))]
    pub fn backend(
        context: impl Into<String> + std::fmt::Debug,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
