use std::fmt;

use crate::numeric_kernel::profit_percentage;

/// Bound for anything that can act as a node: a currency code, a token symbol,
/// an integer id. The total order drives both traversal order and canonicalization.
pub trait Unit: Ord + Clone + fmt::Debug + fmt::Display {}

impl<T> Unit for T where T: Ord + Clone + fmt::Debug + fmt::Display {}

/// Type alias for a single rate edge: (from, to, rate)
pub type RateEdge<U> = (U, U, f64);

/// A closed loop of conversions in a rate graph.
///
/// Fields:
/// - `units`: The units visited, in order. The first unit is not repeated at the end;
///   the closing conversion `units[k-1] -> units[0]` is implied.
/// - `rates`: Rate of each hop. `rates[i]` converts `units[i]` into `units[(i + 1) % k]`,
///   so the closing hop is last.
/// - `product`: Multiplicative accumulation of `rates` along the loop.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedCycle<U> {
    pub units: Vec<U>,
    pub rates: Vec<f64>,
    pub product: f64,
}

impl<U: Unit> WeightedCycle<U> {
    /// Returns true if converting around the loop returns strictly more than was spent.
    pub fn is_profitable(&self) -> bool {
        self.product > 1.0
    }

    pub fn hop_count(&self) -> usize {
        self.units.len()
    }

    pub fn profit_percentage(&self) -> f64 {
        profit_percentage(self.product)
    }

    /// Returns the same loop rotated to start at its smallest unit.
    ///
    /// `rates` rotate with `units` so every hop keeps its rate; `product` is carried over
    /// unchanged.
    pub fn into_canonical(self) -> Self {
        let shift = min_position(&self.units);
        if shift == 0 {
            return self;
        }

        let mut units = self.units;
        let mut rates = self.rates;
        units.rotate_left(shift);
        if rates.len() == units.len() {
            rates.rotate_left(shift);
        }

        WeightedCycle {
            units,
            rates,
            product: self.product,
        }
    }

    /// Renders the loop as `A -> B -> C -> A`.
    pub fn route(&self) -> String {
        let mut hops: Vec<String> = self.units.iter().map(|u| u.to_string()).collect();
        if let Some(first) = self.units.first() {
            hops.push(first.to_string());
        }
        hops.join(" -> ")
    }
}

impl<U: Unit> fmt::Display for WeightedCycle<U> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} with product: {:.6} ({:+.4}%)",
            self.route(),
            self.product,
            self.profit_percentage()
        )
    }
}

/// Rotates `units` so it begins at its smallest element.
///
/// Two sequences that are cyclic rotations of one another map to the same result.
/// Reversed sequences do not: direction is part of the loop's identity.
pub fn canonical_rotation<U: Ord + Clone>(units: &[U]) -> Vec<U> {
    let shift = min_position(units);
    let mut rotated = Vec::with_capacity(units.len());
    rotated.extend_from_slice(&units[shift..]);
    rotated.extend_from_slice(&units[..shift]);
    rotated
}

fn min_position<U: Ord>(units: &[U]) -> usize {
    units
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.cmp(b))
        .map_or(0, |(idx, _)| idx)
}
