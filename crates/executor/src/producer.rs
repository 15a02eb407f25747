use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio::time;
use tracing::{error, info, warn};

use super::{
    error::Error,
    types::{GraphUpdate, QuoteBatch, RateSource},
};

/// Drives a [`RateSource`] through refresh passes and streams the quotes to the writer.
///
/// One pass:
/// 1. the base unit is announced as a node if it is a unit of interest
/// 2. base rates are fetched; if that fails the pass is abandoned
/// 3. every other unit returned for the base is fetched in turn; failures are logged and
///    skipped so the pass still publishes a partial graph
pub struct Producer<S: RateSource> {
    source: S,
    base_unit: String,
    units: Vec<String>,
    passes: Option<u64>,
    refresh_interval: Duration,
}

impl<S> Producer<S>
where
    S: RateSource,
{
    pub fn new(
        source: S,
        base_unit: String,
        units: Vec<String>,
        passes: Option<u64>,
        refresh_interval: Duration,
    ) -> Self {
        Producer {
            source,
            base_unit,
            units,
            passes,
            refresh_interval,
        }
    }

    pub fn spawn(self, sender: Sender<GraphUpdate>) -> tokio::task::JoinHandle<Result<(), Error>> {
        info!("Producer ready.");
        tokio::spawn(async move { self.run(sender).await })
    }

    /// Runs the configured number of passes, or forever when unbounded.
    ///
    /// The first pass starts immediately; later passes wait for the refresh interval.
    pub async fn run(self, sender: Sender<GraphUpdate>) -> Result<(), Error> {
        let period = self.refresh_interval.max(Duration::from_millis(1));
        let mut interval = time::interval(period);

        let mut pass = 0u64;
        while self.passes.is_none_or(|limit| pass < limit) {
            interval.tick().await;
            pass += 1;
            self.collect_pass(pass, &sender).await?;
        }

        info!(passes = pass, "Producer finished all passes.");
        Ok(())
    }

    async fn collect_pass(&self, pass: u64, sender: &Sender<GraphUpdate>) -> Result<(), Error> {
        send(sender, GraphUpdate::PassStarted(pass)).await?;

        if self.units.contains(&self.base_unit) {
            send(sender, GraphUpdate::Node(self.base_unit.clone())).await?;
        }

        let base_rates = match self.source.fetch_rates(&self.base_unit, &self.units).await {
            Ok(rates) => rates,
            Err(e) => {
                error!(pass, base = %self.base_unit, error = %e, "Failed to fetch base rates, abandoning pass");
                return send(sender, GraphUpdate::PassFailed(pass)).await;
            }
        };

        let follow_up: Vec<String> = base_rates
            .keys()
            .filter(|unit| **unit != self.base_unit && self.units.contains(*unit))
            .cloned()
            .collect();

        send(
            sender,
            GraphUpdate::Quotes(QuoteBatch {
                base: self.base_unit.clone(),
                rates: base_rates,
            }),
        )
        .await?;

        let mut skipped = 0usize;
        for unit in follow_up {
            match self.source.fetch_rates(&unit, &self.units).await {
                Ok(rates) => {
                    send(sender, GraphUpdate::Quotes(QuoteBatch { base: unit, rates })).await?;
                }
                Err(e) => {
                    skipped += 1;
                    warn!(pass, unit = %unit, error = %e, "Error fetching rates, skipping unit");
                }
            }
        }

        info!(pass, skipped, "Rate collection complete");
        send(sender, GraphUpdate::PassComplete(pass)).await
    }
}

async fn send(sender: &Sender<GraphUpdate>, update: GraphUpdate) -> Result<(), Error> {
    sender.send(update).await.map_err(|_| {
        warn!("Producer shutting down: Writer receiver dropped.");
        Error::ChannelSendFailed
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use tokio::sync::mpsc;

    /// Fixed table of rates; bases listed in `failing` return an error.
    struct TableSource {
        table: BTreeMap<String, BTreeMap<String, f64>>,
        failing: Vec<String>,
    }

    #[async_trait]
    impl RateSource for TableSource {
        async fn fetch_rates(
            &self,
            base: &str,
            units: &[String],
        ) -> Result<BTreeMap<String, f64>, Error> {
            if self.failing.iter().any(|f| f == base) {
                return Err(Error::SourceError {
                    unit: base.to_string(),
                    reason: "simulated outage".to_string(),
                });
            }
            Ok(self
                .table
                .get(base)
                .map(|rates| {
                    rates
                        .iter()
                        .filter(|(unit, _)| units.contains(*unit))
                        .map(|(unit, rate)| (unit.clone(), *rate))
                        .collect()
                })
                .unwrap_or_default())
        }
    }

    fn rates(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|&(u, r)| (u.to_string(), r)).collect()
    }

    fn table_source(failing: &[&str]) -> TableSource {
        let mut table = BTreeMap::new();
        table.insert("USD".to_string(), rates(&[("USD", 1.0), ("EUR", 0.9), ("JPY", 150.0)]));
        table.insert("EUR".to_string(), rates(&[("EUR", 1.0), ("JPY", 160.0), ("USD", 1.1)]));
        table.insert("JPY".to_string(), rates(&[("USD", 0.0075)]));

        TableSource {
            table,
            failing: failing.iter().map(|f| f.to_string()).collect(),
        }
    }

    fn producer(source: TableSource, passes: u64) -> Producer<TableSource> {
        Producer::new(
            source,
            "USD".to_string(),
            vec!["USD".to_string(), "EUR".to_string(), "JPY".to_string()],
            Some(passes),
            Duration::from_millis(1),
        )
    }

    async fn drain(producer: Producer<TableSource>) -> (Result<(), Error>, Vec<GraphUpdate>) {
        let (tx, mut rx) = mpsc::channel(64);
        let result = producer.run(tx).await;

        let mut updates = Vec::new();
        while let Some(update) = rx.recv().await {
            updates.push(update);
        }
        (result, updates)
    }

    #[tokio::test]
    async fn test_single_pass_sequence() {
        let (result, updates) = drain(producer(table_source(&[]), 1)).await;
        assert!(result.is_ok());

        assert_eq!(
            updates,
            vec![
                GraphUpdate::PassStarted(1),
                GraphUpdate::Node("USD".to_string()),
                GraphUpdate::Quotes(QuoteBatch {
                    base: "USD".to_string(),
                    rates: rates(&[("USD", 1.0), ("EUR", 0.9), ("JPY", 150.0)]),
                }),
                GraphUpdate::Quotes(QuoteBatch {
                    base: "EUR".to_string(),
                    rates: rates(&[("EUR", 1.0), ("JPY", 160.0), ("USD", 1.1)]),
                }),
                GraphUpdate::Quotes(QuoteBatch {
                    base: "JPY".to_string(),
                    rates: rates(&[("USD", 0.0075)]),
                }),
                GraphUpdate::PassComplete(1),
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_unit_is_skipped() {
        let (result, updates) = drain(producer(table_source(&["EUR"]), 1)).await;
        assert!(result.is_ok());

        let bases: Vec<&str> = updates
            .iter()
            .filter_map(|u| match u {
                GraphUpdate::Quotes(batch) => Some(batch.base.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(bases, vec!["USD", "JPY"]);
        assert_eq!(updates.last(), Some(&GraphUpdate::PassComplete(1)));
    }

    #[tokio::test]
    async fn test_failing_base_abandons_pass() {
        let (result, updates) = drain(producer(table_source(&["USD"]), 1)).await;
        assert!(result.is_ok());

        assert_eq!(
            updates,
            vec![
                GraphUpdate::PassStarted(1),
                GraphUpdate::Node("USD".to_string()),
                GraphUpdate::PassFailed(1),
            ]
        );
    }

    #[tokio::test]
    async fn test_runs_configured_number_of_passes() {
        let (result, updates) = drain(producer(table_source(&[]), 3)).await;
        assert!(result.is_ok());

        let completed: Vec<u64> = updates
            .iter()
            .filter_map(|u| match u {
                GraphUpdate::PassComplete(pass) => Some(*pass),
                _ => None,
            })
            .collect();
        assert_eq!(completed, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_dropped_receiver_stops_producer() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let result = producer(table_source(&[]), 1).run(tx).await;
        assert!(matches!(result, Err(Error::ChannelSendFailed)));
    }
}
