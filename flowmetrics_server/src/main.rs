use anyhow::Context;
use clap::Parser;
use flowmetrics_core::config::PipelineConfig;
use flowmetrics_core::pipeline::{MetricsPipeline, PipelineScheduler, TriggerStatus};
use flowmetrics_server::cli::{Cli, Commands};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
#[tracing::instrument(level = "info")]
async fn main() -> anyhow::Result<()> {
    // JSON stdout logs unless FLOWMETRICS_LOG_FORMAT=pretty.
    flowmetrics_core::o11y::init_global_from_env()?;
    let cli = Cli::parse();

    let mut cfg = PipelineConfig::from_env().context("loading configuration from environment")?;
    let cmd = cli.command.unwrap_or(Commands::Run { interval_ms: None });

    match cmd {
        Commands::Run { interval_ms } => {
            if let Some(ms) = interval_ms {
                cfg.poll_interval = Duration::from_millis(ms);
                cfg.validate()?;
            }
            let pipeline = Arc::new(
                MetricsPipeline::from_config(&cfg)
                    .await
                    .context("building pipeline")?,
            );
            let scheduler = PipelineScheduler::new(pipeline, cfg.poll_interval)?;
            tracing::info!(config = %cfg.redacted(), "flowmetrics starting");

            let shutdown = flowmetrics_server::shutdown::spawn_signal_watcher();
            scheduler.run_loop(shutdown).await;
        }
        Commands::Trigger => {
            let pipeline = MetricsPipeline::from_config(&cfg)
                .await
                .context("building pipeline")?;
            let outcome = pipeline.trigger().await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            match outcome.status {
                TriggerStatus::AbortedBeforeFetch | TriggerStatus::FetchFailed => {
                    anyhow::bail!("trigger {}", outcome.status.as_str());
                }
                _ => {}
            }
        }
        Commands::Migrate { sink_only } => {
            let sink = flowmetrics_core::sink::from_config(&cfg.sink)?;
            sink.migrate().await.context("migrating sink")?;
            tracing::info!(sink = sink.name(), "sink migrations applied");

            if sink_only {
                tracing::info!("skipping event log migrations");
            } else {
                let event_log = flowmetrics_core::events::from_config(&cfg.event_log)?;
                event_log.migrate().await.context("migrating event log")?;
                tracing::info!(event_log = event_log.name(), "event log migrations applied");
            }
        }
        Commands::Check => {
            let timeout = cfg.sink.connect_timeout;
            let mut failed = false;

            let sink = flowmetrics_core::sink::from_config(&cfg.sink)?;
            match sink.probe(timeout).await {
                Ok(()) => println!("sink ({}): ok", sink.name()),
                Err(e) => {
                    failed = true;
                    println!("sink ({}): error ({e})", sink.name());
                }
            }

            let event_log = flowmetrics_core::events::from_config(&cfg.event_log)?;
            match event_log.probe(timeout).await {
                Ok(()) => println!("event log ({}): ok", event_log.name()),
                Err(e) => {
                    failed = true;
                    println!("event log ({}): error ({e})", event_log.name());
                }
            }

            if failed {
                anyhow::bail!("connectivity check failed");
            }
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&cfg.redacted())?);
        }
    }

    Ok(())
}
