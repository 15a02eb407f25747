use std::collections::BTreeMap;
use std::collections::btree_map::Keys;

use common::error::Error;
use common::numeric_kernel::{is_valid_rate, product_of};
use common::types::{RateEdge, Unit};

/// Directed graph of conversion rates between units.
///
/// Adjacency is stored as `unit -> (neighbor -> rate)`:
/// - every node has an entry, possibly with an empty neighbor map
/// - at most one edge per ordered pair; writing it again replaces the rate
/// - both maps are ordered, so `nodes()` and `neighbors()` iterate in ascending unit order
///
/// The graph does not enforce reciprocal rates. Whether `B -> A` is `1 / rate(A -> B)`
/// is up to whoever fills it.
#[derive(Debug, Clone, PartialEq)]
pub struct RateGraph<U: Unit> {
    adjacency: BTreeMap<U, BTreeMap<U, f64>>,
}

impl<U: Unit> Default for RateGraph<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U: Unit> RateGraph<U> {
    pub fn new() -> Self {
        Self {
            adjacency: BTreeMap::new(),
        }
    }

    /// Builds a graph from `(from, to, rate)` edges, adding endpoints as needed.
    ///
    /// # Errors
    /// Returns `Error::InvalidRate` on the first edge whose rate is not positive and finite.
    pub fn from_edges<I>(edges: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = RateEdge<U>>,
    {
        let mut graph = Self::new();
        for (from, to, rate) in edges {
            graph.add_edge(from, to, rate)?;
        }
        Ok(graph)
    }

    /// Adds `unit` as a node. Adding a unit that is already present is a no-op.
    pub fn add_node(&mut self, unit: U) {
        self.adjacency.entry(unit).or_default();
    }

    /// Inserts or overwrites the directed edge `from -> to`.
    ///
    /// Missing endpoints are added as nodes. Self-loops are stored but never traversed
    /// by the cycle search.
    ///
    /// # Errors
    /// Returns `Error::InvalidRate` if `rate` is zero, negative, NaN or infinite. The graph
    /// is left untouched in that case.
    pub fn add_edge(&mut self, from: U, to: U, rate: f64) -> Result<(), Error> {
        if !is_valid_rate(rate) {
            return Err(Error::InvalidRate {
                from: from.to_string(),
                to: to.to_string(),
                rate,
            });
        }

        self.add_node(to.clone());
        self.adjacency.entry(from).or_default().insert(to, rate);
        Ok(())
    }

    /// Removes the directed edge `from -> to`, returning its rate if it existed.
    /// Both endpoints stay in the graph.
    pub fn remove_edge(&mut self, from: &U, to: &U) -> Option<f64> {
        self.adjacency.get_mut(from)?.remove(to)
    }

    /// Outgoing edges of `unit` as `neighbor -> rate`.
    ///
    /// # Errors
    /// Returns `Error::UnitNotFound` if `unit` was never added.
    pub fn neighbors(&self, unit: &U) -> Result<&BTreeMap<U, f64>, Error> {
        self.adjacency
            .get(unit)
            .ok_or_else(|| Error::UnitNotFound(unit.to_string()))
    }

    /// All units in ascending order.
    pub fn nodes(&self) -> Keys<'_, U, BTreeMap<U, f64>> {
        self.adjacency.keys()
    }

    pub fn contains(&self, unit: &U) -> bool {
        self.adjacency.contains_key(unit)
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Rate of the edge `from -> to`, if present.
    pub fn rate(&self, from: &U, to: &U) -> Option<f64> {
        self.adjacency.get(from)?.get(to).copied()
    }

    /// Product of the rates around the closed loop `units[0] -> .. -> units[k-1] -> units[0]`.
    ///
    /// Returns `None` if `units` is empty or any hop, including the closing one, is missing.
    pub fn path_product(&self, units: &[U]) -> Option<f64> {
        if units.is_empty() {
            return None;
        }

        let closing = (units.last()?, units.first()?);
        let rates = units
            .windows(2)
            .map(|pair| (&pair[0], &pair[1]))
            .chain(std::iter::once(closing))
            .map(|(from, to)| self.rate(from, to))
            .collect::<Option<Vec<f64>>>()?;

        Some(product_of(&rates))
    }
}
