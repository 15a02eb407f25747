use async_trait::async_trait;
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::PathBuf;
use tracing::{debug, warn};

use super::error::Error;
use super::types::RateSource;

// Helper struct for CSV parsing
#[derive(Debug, Deserialize)]
pub struct CsvRecord {
    #[serde(rename = "base")]
    pub base_unit: String,

    #[serde(rename = "quote")]
    pub quote_unit: String,

    #[serde(rename = "rate")]
    pub rate_value: f64,
}

/// Reads `base,quote,rate` rows from a CSV file.
///
/// The file is re-read on every fetch so edits are picked up by the next refresh pass.
pub struct CsvRateSource {
    path: PathBuf,
}

impl CsvRateSource {
    pub fn new(path: PathBuf) -> Self {
        CsvRateSource { path }
    }

    fn parse_csv_rows(&self) -> Result<Vec<CsvRecord>, Error> {
        let file = File::open(&self.path).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "Failed to read rate file");
            Error::IoError(e)
        })?;

        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let mut records = Vec::new();
        for result in rdr.deserialize() {
            let record: CsvRecord = result?;
            records.push(record);
        }
        Ok(records)
    }
}

#[async_trait]
impl RateSource for CsvRateSource {
    async fn fetch_rates(
        &self,
        base: &str,
        units: &[String],
    ) -> Result<BTreeMap<String, f64>, Error> {
        let records = self.parse_csv_rows()?;

        let mut known_base = false;
        let mut rates = BTreeMap::new();
        for record in records.into_iter().filter(|r| r.base_unit == base) {
            known_base = true;
            if units.contains(&record.quote_unit) {
                rates.insert(record.quote_unit, record.rate_value);
            }
        }

        if !known_base {
            return Err(Error::SourceError {
                unit: base.to_string(),
                reason: format!("no rows in {}", self.path.display()),
            });
        }

        debug!(base, quotes = rates.len(), "Loaded rates from CSV");
        Ok(rates)
    }
}
