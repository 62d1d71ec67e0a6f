use crate::{Error, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Output format for the global subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" | "text" => Some(Self::Pretty),
            _ => None,
        }
    }

    /// `FLOWMETRICS_LOG_FORMAT`; unset or unrecognized means JSON.
    pub fn from_env() -> Self {
        std::env::var("FLOWMETRICS_LOG_FORMAT")
            .ok()
            .and_then(|v| Self::parse_str(&v))
            .unwrap_or_default()
    }
}

#[tracing::instrument(level = "info", skip_all)]
pub fn init_global_from_env() -> Result<()> {
    init_global(LogFormat::from_env())
}

/// Install the process-wide subscriber. Filter comes from `RUST_LOG` (default `info`).
/// Fails with `Error::Conflict` if a subscriber is already installed.
#[tracing::instrument(level = "info")]
pub fn init_global(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    let res = match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
    };
    res.map_err(|e| Error::Conflict(format!("tracing already initialized: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_formats() {
        assert_eq!(LogFormat::parse_str("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse_str(" pretty "), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse_str("xml"), None);
    }

    #[test]
    fn second_init_is_a_conflict() {
        let _ = init_global(LogFormat::Json);
        assert!(matches!(init_global(LogFormat::Pretty), Err(Error::Conflict(_))));
    }
}
