use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

use super::{error::Error, report::Reporter, types::SharedGraph};
use fx_cycles_core::{RateGraph, SearchReport, traits::CycleSolver};

/// Runs one analysis per published graph.
///
/// Wakes whenever the writer bumps the pass counter, takes the published graph as an
/// immutable snapshot and hands it to the solver. Stops when the writer goes away.
pub struct ArbSearcher<S> {
    solver: S,
    graph: SharedGraph,
    published: watch::Receiver<u64>,
    reporter: Reporter,
}

impl<S> ArbSearcher<S>
where
    S: CycleSolver,
{
    pub fn new(
        graph: SharedGraph,
        published: watch::Receiver<u64>,
        solver: S,
        reporter: Reporter,
    ) -> Self {
        ArbSearcher {
            solver,
            graph,
            published,
            reporter,
        }
    }

    pub async fn search_for_arbs(mut self) -> Result<(), Error> {
        info!("Searcher ready.");

        while self.published.changed().await.is_ok() {
            let pass = *self.published.borrow_and_update();

            let graph_snapshot = {
                let graph_guard = self.graph.read().await;
                Arc::clone(&*graph_guard)
            };

            match self.analyze(pass, &graph_snapshot) {
                Ok(report) => self.reporter.report(pass, &report)?,
                Err(e) => {
                    error!(
                        pass,
                        error = %e,
                        "Searcher Error: cycle search failed. Continuing."
                    );
                }
            }
        }

        info!("Writer closed, shutting down searcher.");
        Ok(())
    }

    /// Searches one snapshot. Graphs with fewer than two units cannot hold a cycle and are
    /// skipped without invoking the solver.
    pub fn analyze(
        &self,
        pass: u64,
        graph: &RateGraph<String>,
    ) -> Result<SearchReport<String>, Error> {
        if graph.node_count() < 2 {
            info!(pass, "Searcher: Graph too small to search for cycles. Skipping.");
            return Ok(SearchReport {
                cycles: Vec::new(),
                stats: Default::default(),
            });
        }

        info!(
            pass,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Searcher: Starting cycle search on new snapshot..."
        );
        Ok(self.solver.search(graph)?)
    }
}
