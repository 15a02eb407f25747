use super::graph::RateGraph;
use super::traits::CycleSolver;
use common::{
    error::Error,
    numeric_kernel::{PRODUCT_TOLERANCE, approx_eq},
    types::{Unit, WeightedCycle},
};
use std::collections::{BTreeMap, btree_map};
use tracing::{debug, info, trace, warn};

/// Optional bounds on the exhaustive search.
///
/// The search is exponential in the worst case. Both limits default to `None`, which
/// enumerates every simple cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchLimits {
    /// Longest cycle to report, counted in edges (a triangle has 3).
    pub max_hops: Option<usize>,
    /// Maximum number of path extensions across the whole call. When exhausted the
    /// search stops and reports what it found so far.
    pub max_expansions: Option<usize>,
}

/// Counters collected during one call to [`CycleSolver::search`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub start_nodes: usize,
    pub expansions: usize,
    /// Profitable cycles discovered, rotations included.
    pub raw_cycles: usize,
    /// Discoveries dropped because their rotation was already recorded.
    pub duplicates: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchReport<U> {
    pub cycles: Vec<WeightedCycle<U>>,
    pub stats: SearchStats,
}

/// Solver enumerating every simple profitable cycle by depth-first search from each node.
#[derive(Debug, Clone, Copy, Default)]
pub struct DfsCycleSolver {
    limits: SearchLimits,
}

/// One step of the active path.
///
/// The stack of frames *is* the path: `stack[0]` is the start unit and each frame holds
/// the product accumulated up to its unit together with the edges still to try from it.
struct Frame<'g, U> {
    unit: &'g U,
    product: f64,
    rate_in: f64,
    edges: btree_map::Iter<'g, U, f64>,
}

impl DfsCycleSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: SearchLimits) -> Self {
        Self { limits }
    }

    /// Enumerates the profitable loops rooted at `start`.
    ///
    /// Every simple path from `start` is explored. A step onto a unit already on the path
    /// is never descended; it is recorded only when that unit is `start` and the product
    /// is above 1.0. Self-loops are skipped.
    fn cycles_from<'g, U: Unit>(
        &self,
        graph: &'g RateGraph<U>,
        start: &'g U,
        stats: &mut SearchStats,
    ) -> Result<Vec<WeightedCycle<U>>, Error> {
        let mut found = Vec::new();
        let mut stack = vec![Frame {
            unit: start,
            product: 1.0,
            rate_in: 1.0,
            edges: graph.neighbors(start)?.iter(),
        }];

        while let Some(frame) = stack.last_mut() {
            let Some((next, &rate)) = frame.edges.next() else {
                // All edges tried: backtrack.
                stack.pop();
                continue;
            };

            if next == frame.unit {
                continue;
            }

            let product = frame.product * rate;

            if stack.iter().any(|f| f.unit == next) {
                if next == start && product > 1.0 {
                    let cycle = close_cycle(&stack, rate, product);
                    trace!(cycle = %cycle, "Profitable cycle");
                    found.push(cycle);
                }
                continue;
            }

            if self.limits.max_hops.is_some_and(|max| stack.len() >= max) {
                continue;
            }

            if self
                .limits
                .max_expansions
                .is_some_and(|budget| stats.expansions >= budget)
            {
                stats.truncated = true;
                break;
            }

            stats.expansions += 1;
            stack.push(Frame {
                unit: next,
                product,
                rate_in: rate,
                edges: graph.neighbors(next)?.iter(),
            });
        }

        Ok(found)
    }
}

/// Snapshots the active path into a cycle closed by an edge of `closing_rate`.
fn close_cycle<U: Unit>(stack: &[Frame<'_, U>], closing_rate: f64, product: f64) -> WeightedCycle<U> {
    let units = stack.iter().map(|f| f.unit.clone()).collect();
    let rates = stack
        .iter()
        .skip(1)
        .map(|f| f.rate_in)
        .chain(std::iter::once(closing_rate))
        .collect();

    WeightedCycle {
        units,
        rates,
        product,
    }
}

impl CycleSolver for DfsCycleSolver {
    /// Runs the full search and returns the ranked cycles with search counters.
    ///
    /// Steps:
    /// 1. DFS from every node in ascending order, collecting loops that close back on the
    ///    start with product > 1.0.
    /// 2. Rotate each loop to its canonical form and keep the first discovery per form.
    /// 3. Stable sort by product, descending. Equal products keep discovery order.
    ///
    /// Kept cycles are returned in canonical form.
    fn search<U: Unit>(&self, graph: &RateGraph<U>) -> Result<SearchReport<U>, Error> {
        let mut stats = SearchStats::default();
        let mut seen: BTreeMap<Vec<U>, f64> = BTreeMap::new();
        let mut cycles: Vec<WeightedCycle<U>> = Vec::new();

        for start in graph.nodes() {
            stats.start_nodes += 1;

            let found = self.cycles_from(graph, start, &mut stats)?;
            debug!(start = %start, found = found.len(), "DFS pass complete");

            for cycle in found {
                stats.raw_cycles += 1;

                let canonical = cycle.into_canonical();
                match seen.entry(canonical.units.clone()) {
                    btree_map::Entry::Vacant(slot) => {
                        slot.insert(canonical.product);
                        cycles.push(canonical);
                    }
                    btree_map::Entry::Occupied(kept) => {
                        stats.duplicates += 1;
                        if !approx_eq(*kept.get(), canonical.product, PRODUCT_TOLERANCE) {
                            warn!(
                                cycle = %canonical,
                                kept = *kept.get(),
                                "Rotation product disagrees with the recorded loop"
                            );
                        }
                    }
                }
            }

            if stats.truncated {
                warn!(
                    expansions = stats.expansions,
                    start = %start,
                    "Expansion budget exhausted, returning partial results"
                );
                break;
            }
        }

        cycles.sort_by(|a, b| b.product.total_cmp(&a.product));

        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            expansions = stats.expansions,
            unique = cycles.len(),
            duplicates = stats.duplicates,
            "Cycle search finished"
        );

        Ok(SearchReport { cycles, stats })
    }
}
