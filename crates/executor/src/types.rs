use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::error::Error;
use fx_cycles_core::RateGraph;

/// The most recently published complete graph. The searcher clones the inner `Arc`
/// and never observes a graph that is still being filled.
pub type SharedGraph = Arc<RwLock<Arc<RateGraph<String>>>>;

/// A trait defining the contract for any source of conversion rates.
///
/// This trait decouples the Producer task from the specific data source
/// (e.g., CSV file vs. HTTP pricing service vs. simulated data).
///
/// The trait bounds (`Send`, `Sync`, `'static`) are mandatory to ensure the
/// implementation can be safely executed by the multi-threaded asynchronous runtime (Tokio).
#[async_trait::async_trait]
pub trait RateSource: Send + Sync + 'static {
    /// Rates converting one unit of `base` into each unit of `units` the source knows.
    ///
    /// Units the source has no rate for are simply absent from the result.
    async fn fetch_rates(&self, base: &str, units: &[String])
    -> Result<BTreeMap<String, f64>, Error>;
}

/// Rates quoted against a single base unit.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteBatch {
    pub base: String,
    pub rates: BTreeMap<String, f64>,
}

/// Messages from the producer to the writer. A pass is framed by `PassStarted` and either
/// `PassComplete` or `PassFailed`.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphUpdate {
    PassStarted(u64),
    Node(String),
    Quotes(QuoteBatch),
    PassComplete(u64),
    PassFailed(u64),
}
