pub mod graph;
pub mod solver;
pub mod traits;

pub use graph::RateGraph;
pub use solver::{DfsCycleSolver, SearchLimits, SearchReport, SearchStats};
pub use traits::CycleSolver;
