use super::graph::RateGraph;
use super::solver::SearchReport;
use common::{error::Error, types::Unit, types::WeightedCycle};

/// Trait for graph solvers capable of enumerating profitable cycles.
pub trait CycleSolver {
    /// Runs the full search and returns the ranked cycles together with the search
    /// counters, including whether a limit cut the search short.
    fn search<U: Unit>(&self, graph: &RateGraph<U>) -> Result<SearchReport<U>, Error>;

    /// Finds every distinct profitable cycle in `graph`.
    ///
    /// Returns the cycles ranked by product, highest first. An empty graph, or one without
    /// profitable loops, yields `Ok(vec![])`.
    fn find_profitable_cycles<U: Unit>(
        &self,
        graph: &RateGraph<U>,
    ) -> Result<Vec<WeightedCycle<U>>, Error> {
        self.search(graph).map(|report| report.cycles)
    }
}
