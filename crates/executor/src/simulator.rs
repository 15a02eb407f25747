use async_trait::async_trait;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::error::Error;
use super::types::RateSource;

/// Reference value of each unit, quoted as units per one USD.
const REFERENCE_PER_USD: [(&str, f64); 10] = [
    ("USD", 1.0),
    ("EUR", 0.92),
    ("JPY", 150.0),
    ("GBP", 0.79),
    ("AUD", 1.52),
    ("CAD", 1.36),
    ("CHF", 0.88),
    ("CNY", 7.2),
    ("HKD", 7.8),
    ("NZD", 1.65),
];

/// Produces synthetic conversion rates for offline runs.
///
/// Every quote is the cross rate of the reference table perturbed by an independent
/// random fluctuation of at most `fluctuation_bps` basis points, so loops drift slightly
/// above and below break-even from pass to pass.
pub struct SimulatedRateSource {
    reference: BTreeMap<String, f64>,
    fluctuation: f64,
    rng: Mutex<SmallRng>,
}

impl SimulatedRateSource {
    pub fn new(fluctuation_bps: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };

        SimulatedRateSource {
            reference: REFERENCE_PER_USD
                .iter()
                .map(|&(unit, value)| (unit.to_string(), value))
                .collect(),
            fluctuation: fluctuation_bps / 10_000.0,
            rng: Mutex::new(rng),
        }
    }

    fn noise(&self) -> f64 {
        if self.fluctuation == 0.0 {
            return 1.0;
        }
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        1.0 + rng.random_range(-self.fluctuation..=self.fluctuation)
    }
}

#[async_trait]
impl RateSource for SimulatedRateSource {
    async fn fetch_rates(
        &self,
        base: &str,
        units: &[String],
    ) -> Result<BTreeMap<String, f64>, Error> {
        let base_value = self
            .reference
            .get(base)
            .copied()
            .ok_or_else(|| Error::SourceError {
                unit: base.to_string(),
                reason: "not in the simulated reference table".to_string(),
            })?;

        let rates = units
            .iter()
            .filter_map(|unit| {
                let quote_value = self.reference.get(unit)?;
                Some((unit.clone(), quote_value / base_value * self.noise()))
            })
            .collect();

        Ok(rates)
    }
}
