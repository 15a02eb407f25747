use std::sync::Arc;
use tokio::select;
use tokio::sync::{mpsc::Receiver, watch};
use tracing::{debug, info, warn};

use super::error::Error;
use super::types::{GraphUpdate, QuoteBatch, SharedGraph};
use common::numeric_kernel::is_valid_rate;
use fx_cycles_core::RateGraph;

/// Async consumer that assembles each pass into a staging graph and publishes it whole.
///
/// The shared graph is only written when a pass completes, so a reader never sees a
/// half-filled graph. Every publication bumps the `published` pass counter.
pub struct Writer {
    graph: SharedGraph,
    receiver: Receiver<GraphUpdate>,
    published: watch::Sender<u64>,
    shutdown: watch::Receiver<()>, // signal for graceful shutdown
    staging: Option<RateGraph<String>>,
}

impl Writer {
    pub fn new(
        graph: SharedGraph,
        receiver: Receiver<GraphUpdate>,
        published: watch::Sender<u64>,
        shutdown: watch::Receiver<()>,
    ) -> Self {
        Self {
            graph,
            receiver,
            published,
            shutdown,
            staging: None,
        }
    }

    /// Run the writer asynchronously.
    ///
    /// Exits gracefully when the receiver is closed or shutdown signal is received.
    /// Dropping the writer closes the `published` channel, which stops the searcher.
    pub async fn process_updates(mut self) -> Result<(), Error> {
        info!("Writer ready.");

        loop {
            select! {
                update = self.receiver.recv() => {
                    match update {
                        Some(update) => self.apply(update).await,
                        None => {
                            info!("Receiver closed, shutting down writer.");
                            break;
                        }
                    }
                }

                _ = self.shutdown.changed() => {
                    info!("Shutdown signal received, stopping writer.");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Public method that spawns the Writer task onto the Tokio runtime.
    pub fn spawn_task(self) -> tokio::task::JoinHandle<Result<(), Error>> {
        tokio::spawn(self.process_updates())
    }

    async fn apply(&mut self, update: GraphUpdate) {
        match update {
            GraphUpdate::PassStarted(pass) => {
                if self.staging.is_some() {
                    warn!(pass, "Previous pass never completed, discarding it");
                }
                self.staging = Some(RateGraph::new());
            }
            GraphUpdate::Node(unit) => {
                self.staging.get_or_insert_with(RateGraph::new).add_node(unit);
            }
            GraphUpdate::Quotes(batch) => {
                let staging = self.staging.get_or_insert_with(RateGraph::new);
                let applied = apply_quotes(staging, batch);
                debug!(applied, "Quotes staged");
            }
            GraphUpdate::PassComplete(pass) => {
                let graph = self.staging.take().unwrap_or_default();
                info!(
                    pass,
                    nodes = graph.node_count(),
                    edges = graph.edge_count(),
                    "Publishing graph"
                );
                {
                    let mut graph_guard = self.graph.write().await;
                    *graph_guard = Arc::new(graph);
                }
                self.published.send_replace(pass);
            }
            GraphUpdate::PassFailed(pass) => {
                warn!(pass, "Pass failed, keeping previously published graph");
                self.staging = None;
            }
        }
    }
}

/// Inserts each quote of `batch` as a reciprocal pair of edges: `base -> quote = rate`
/// and `quote -> base = 1 / rate`. Later writes overwrite earlier ones.
///
/// Quotes of the base against itself and rates that are not positive and finite are
/// skipped. Returns the number of quotes applied.
pub fn apply_quotes(graph: &mut RateGraph<String>, batch: QuoteBatch) -> usize {
    let QuoteBatch { base, rates } = batch;
    let mut applied = 0;

    for (quote, rate) in rates {
        if quote == base {
            continue;
        }
        if !is_valid_rate(rate) || !is_valid_rate(1.0 / rate) {
            warn!(base = %base, quote = %quote, rate, "Skipping invalid rate");
            continue;
        }

        let forward = graph.add_edge(base.clone(), quote.clone(), rate);
        let backward = graph.add_edge(quote, base.clone(), 1.0 / rate);
        if let Err(e) = forward.and(backward) {
            warn!(error = %e, "Rate rejected by graph");
            continue;
        }
        applied += 1;
    }

    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tokio::sync::{RwLock, mpsc};

    fn batch(base: &str, pairs: &[(&str, f64)]) -> QuoteBatch {
        QuoteBatch {
            base: base.to_string(),
            rates: pairs.iter().map(|&(u, r)| (u.to_string(), r)).collect::<BTreeMap<_, _>>(),
        }
    }

    fn key(unit: &str) -> String {
        unit.to_string()
    }

    #[test]
    fn apply_quotes_inserts_reciprocal_edges() {
        let mut graph = RateGraph::new();
        let applied = apply_quotes(&mut graph, batch("USD", &[("EUR", 0.8), ("JPY", 150.0)]));

        assert_eq!(applied, 2);
        assert_eq!(graph.edge_count(), 4);
        assert_eq!(graph.rate(&key("USD"), &key("EUR")), Some(0.8));
        assert_eq!(graph.rate(&key("EUR"), &key("USD")), Some(1.25));
    }

    #[test]
    fn apply_quotes_skips_self_and_invalid_rates() {
        let mut graph = RateGraph::new();
        let applied = apply_quotes(
            &mut graph,
            batch(
                "USD",
                &[("USD", 1.0), ("EUR", 0.0), ("GBP", f64::NAN), ("JPY", 1e-320)],
            ),
        );

        assert_eq!(applied, 0);
        assert!(graph.is_empty());
    }

    #[test]
    fn later_quotes_overwrite_earlier_ones() {
        let mut graph = RateGraph::new();
        apply_quotes(&mut graph, batch("USD", &[("EUR", 0.8)]));
        apply_quotes(&mut graph, batch("EUR", &[("USD", 1.0)]));

        assert_eq!(graph.rate(&key("USD"), &key("EUR")), Some(1.0));
        assert_eq!(graph.rate(&key("EUR"), &key("USD")), Some(1.0));
        assert_eq!(graph.edge_count(), 2);
    }

    struct Harness {
        graph: SharedGraph,
        sender: mpsc::Sender<GraphUpdate>,
        published: watch::Receiver<u64>,
        shutdown: watch::Sender<()>,
        handle: tokio::task::JoinHandle<Result<(), Error>>,
    }

    fn start_writer() -> Harness {
        let graph: SharedGraph = Arc::new(RwLock::new(Arc::new(RateGraph::new())));
        let (sender, receiver) = mpsc::channel(16);
        let (published_tx, published) = watch::channel(0u64);
        let (shutdown_tx, shutdown_rx) = watch::channel(());

        let handle = Writer::new(graph.clone(), receiver, published_tx, shutdown_rx).spawn_task();

        Harness {
            graph,
            sender,
            published,
            shutdown: shutdown_tx,
            handle,
        }
    }

    #[tokio::test]
    async fn publishes_complete_pass() {
        let mut h = start_writer();

        for update in [
            GraphUpdate::PassStarted(1),
            GraphUpdate::Node("USD".to_string()),
            GraphUpdate::Quotes(batch("USD", &[("EUR", 0.9)])),
            GraphUpdate::Quotes(batch("EUR", &[("JPY", 160.0)])),
            GraphUpdate::PassComplete(1),
        ] {
            h.sender.send(update).await.unwrap();
        }

        h.published.changed().await.unwrap();
        assert_eq!(*h.published.borrow_and_update(), 1);

        let snapshot = h.graph.read().await.clone();
        assert_eq!(snapshot.node_count(), 3);
        assert_eq!(snapshot.edge_count(), 4);

        drop(h.sender);
        assert!(h.handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn failed_pass_is_not_published() {
        let h = start_writer();

        for update in [
            GraphUpdate::PassStarted(1),
            GraphUpdate::Quotes(batch("USD", &[("EUR", 0.9)])),
            GraphUpdate::PassFailed(1),
        ] {
            h.sender.send(update).await.unwrap();
        }
        drop(h.sender);
        assert!(h.handle.await.unwrap().is_ok());

        assert!(h.graph.read().await.is_empty());
        assert_eq!(*h.published.borrow(), 0);
    }

    #[tokio::test]
    async fn shutdown_signal_stops_writer() {
        let h = start_writer();

        h.shutdown.send(()).unwrap();
        assert!(h.handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn closing_writer_closes_publication_channel() {
        let mut h = start_writer();

        drop(h.sender);
        assert!(h.handle.await.unwrap().is_ok());
        assert!(h.published.changed().await.is_err());
    }
}
