use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "flowmetrics",
    version,
    about = "Ingest FetchS3Object provenance events into the files metrics table"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Trigger the pipeline on an interval until SIGINT/SIGTERM (default if no subcommand given).
    Run {
        /// Override `FLOWMETRICS_POLL_INTERVAL_MS`.
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Run a single trigger and print its outcome as JSON.
    Trigger,

    /// Create the sink `files` table and the event log table.
    Migrate {
        /// Only migrate the sink.
        #[arg(long)]
        sink_only: bool,
    },

    /// Probe sink and event log connectivity (bounded by the sink connect timeout).
    Check,

    /// Print current configuration (redacted secrets).
    Config,
}
