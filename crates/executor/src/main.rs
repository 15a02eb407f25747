pub mod config;
pub mod csv_source;
pub mod error;
pub mod http_source;
pub mod logging;
pub mod producer;
pub mod report;
pub mod searcher;
pub mod simulator;
pub mod types;
pub mod writer;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc, mpsc::Sender, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use config::{Config, SourceKind};
use csv_source::CsvRateSource;
use error::Error;
use fx_cycles_core::{DfsCycleSolver, RateGraph};
use http_source::HttpRateSource;
use producer::Producer;
use report::Reporter;
use searcher::ArbSearcher;
use simulator::SimulatedRateSource;
use types::{GraphUpdate, RateSource, SharedGraph};
use writer::Writer;

type JoinHandleResult = JoinHandle<Result<(), Error>>;

/// Finds profitable exchange-rate cycles in periodically refreshed rate graphs.
#[derive(Debug, Parser)]
#[command(name = "executor", version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "crates/executor/Config.toml")]
    config: PathBuf,

    /// Overrides `acquisition.source.kind`.
    #[arg(long, value_enum)]
    source: Option<SourceKind>,

    /// Overrides `searcher.passes`.
    #[arg(long)]
    passes: Option<u64>,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(kind) = self.source {
            config.acquisition.source.kind = kind;
        }
        if let Some(passes) = self.passes {
            config.searcher.passes = Some(passes);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    let mut config = config::load_config(&cli.config)?;
    cli.apply_overrides(&mut config);

    logging::setup(&config.logging.level);
    info!(
        base = %config.acquisition.base_unit,
        units = ?config.acquisition.units,
        source = ?config.acquisition.source.kind,
        "Starting cycle pipeline"
    );

    let shared_graph: SharedGraph = Arc::new(RwLock::new(Arc::new(RateGraph::new())));

    let (sender, receiver) = mpsc::channel::<GraphUpdate>(config.pipeline.channel_capacity);
    let (published_tx, published_rx) = watch::channel(0u64);
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    // Spawn tasks
    let producer_handle = spawn_producer(&config, sender)?;
    let writer_handle = Writer::new(shared_graph.clone(), receiver, published_tx, shutdown_rx)
        .spawn_task();
    let searcher_handle = spawn_searcher(shared_graph, published_rx, &config);

    tokio::spawn(watch_interrupt(shutdown_tx));

    let (producer, writer, searcher) = tokio::join!(producer_handle, writer_handle, searcher_handle);
    for (task, outcome) in [("producer", producer), ("writer", writer), ("searcher", searcher)] {
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(task, error = %e, "Task stopped with an error"),
            Err(e) => error!(task, error = %e, "Task panicked or was cancelled"),
        }
    }

    info!("Pipeline shut down.");
    Ok(())
}

/// Sends the shutdown signal on ctrl-c.
///
/// Dropping `shutdown` would also wake the writer, so if the signal handler cannot be
/// installed the sender is held until the runtime stops.
async fn watch_interrupt(shutdown: watch::Sender<()>) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Interrupt received, shutting down.");
            let _ = shutdown.send(());
        }
        Err(e) => {
            warn!(error = %e, "Unable to listen for ctrl-c, interrupt handling disabled");
            std::future::pending::<()>().await;
        }
    }
}

/// Builds the configured rate source and spawns the producer task around it.
fn spawn_producer(config: &Config, sender: Sender<GraphUpdate>) -> Result<JoinHandleResult, Error> {
    let source = &config.acquisition.source;

    let handle = match source.kind {
        SourceKind::Csv => {
            let path = source.path.clone().ok_or_else(|| {
                Error::ConfigLoadError("acquisition.source.path is not set".to_string())
            })?;
            info!(path = %path.display(), "Starting CSV rate producer task...");
            start_producer(CsvRateSource::new(path), config, sender)
        }
        SourceKind::Http => {
            let base_url = source.base_url.clone().ok_or_else(|| {
                Error::ConfigLoadError("acquisition.source.base_url is not set".to_string())
            })?;
            let api_key = source.api_key.clone().unwrap_or_default();
            info!(base_url = %base_url, "Starting HTTP rate producer task...");
            let http = HttpRateSource::new(base_url, api_key, source.timeout_seconds)?;
            start_producer(http, config, sender)
        }
        SourceKind::Simulated => {
            info!(
                fluctuation_bps = source.fluctuation_bps,
                "Starting simulated rate producer task..."
            );
            let sim = SimulatedRateSource::new(source.fluctuation_bps, source.seed);
            start_producer(sim, config, sender)
        }
    };

    Ok(handle)
}

fn start_producer<S: RateSource>(
    source: S,
    config: &Config,
    sender: Sender<GraphUpdate>,
) -> JoinHandleResult {
    Producer::new(
        source,
        config.acquisition.base_unit.clone(),
        config.acquisition.units.clone(),
        config.searcher.passes,
        config.searcher.interval(),
    )
    .spawn(sender)
}

/// Spawn searcher task
fn spawn_searcher(
    shared_graph: SharedGraph,
    published: watch::Receiver<u64>,
    config: &Config,
) -> JoinHandleResult {
    let solver = DfsCycleSolver::with_limits(config.searcher.limits());
    let reporter = Reporter::new(config.report.csv_path.clone());
    let searcher = ArbSearcher::new(shared_graph, published, solver, reporter);
    tokio::spawn(async move { searcher.search_for_arbs().await })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;

    #[tokio::test]
    async fn interrupt_watcher_keeps_shutdown_channel_open() {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(());
        let watcher = tokio::spawn(watch_interrupt(shutdown_tx));

        // No interrupt arrives: the writer's shutdown branch must stay pending.
        let woke = tokio::time::timeout(Duration::from_millis(50), shutdown_rx.changed()).await;
        assert!(woke.is_err());

        watcher.abort();
        assert!(shutdown_rx.changed().await.is_err());
    }

    #[test]
    fn cli_overrides_source_and_passes() {
        let cli = Cli::parse_from(["executor", "--source", "csv", "--passes", "7"]);
        assert_eq!(cli.config, PathBuf::from("crates/executor/Config.toml"));

        let shipped = Path::new(env!("CARGO_MANIFEST_DIR")).join("Config.toml");
        let mut config = config::load_config(&shipped).expect("shipped config should load");
        cli.apply_overrides(&mut config);

        assert_eq!(config.acquisition.source.kind, SourceKind::Csv);
        assert_eq!(config.searcher.passes, Some(7));
    }
}
