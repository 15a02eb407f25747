use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use super::error::Error;
use super::types::RateSource;

/// Timeout for a single rate request when the config does not set one.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    result: String,
    #[serde(default)]
    conversion_rates: BTreeMap<String, f64>,
    #[serde(rename = "error-type", default)]
    error_type: Option<String>,
}

/// Pricing service speaking the `{base_url}/{api_key}/latest/{base}` protocol.
pub struct HttpRateSource {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpRateSource {
    pub fn new(
        base_url: String,
        api_key: String,
        timeout_seconds: Option<u64>,
    ) -> Result<Self, Error> {
        if api_key.trim().is_empty() {
            return Err(Error::ConfigLoadError(
                "acquisition.source.api_key is required for the http source".to_string(),
            ));
        }

        let timeout = Duration::from_secs(timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS));
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn latest_url(&self, base: &str) -> String {
        format!("{}/{}/latest/{}", self.base_url, self.api_key, base)
    }
}

/// Decodes a reply body before looking at the status, so error replies keep their
/// `error-type`. Bodies that are not rate documents fall back to the HTTP status.
fn decode_response(
    status: StatusCode,
    body: &str,
    base: &str,
    units: &[String],
) -> Result<BTreeMap<String, f64>, Error> {
    match serde_json::from_str::<LatestRatesResponse>(body) {
        Ok(response) if status.is_success() || response.result != "success" => {
            extract_rates(response, base, units)
        }
        Ok(_) => Err(Error::SourceError {
            unit: base.to_string(),
            reason: format!("HTTP {}", status),
        }),
        Err(e) if status.is_success() => Err(Error::SourceError {
            unit: base.to_string(),
            reason: format!("malformed response: {}", e),
        }),
        Err(_) => Err(Error::SourceError {
            unit: base.to_string(),
            reason: format!("HTTP {}", status),
        }),
    }
}

/// Keeps the quotes for `units` out of a decoded response.
fn extract_rates(
    response: LatestRatesResponse,
    base: &str,
    units: &[String],
) -> Result<BTreeMap<String, f64>, Error> {
    if response.result != "success" {
        return Err(Error::SourceError {
            unit: base.to_string(),
            reason: response
                .error_type
                .unwrap_or_else(|| format!("result '{}'", response.result)),
        });
    }

    Ok(response
        .conversion_rates
        .into_iter()
        .filter(|(unit, _)| units.contains(unit))
        .collect())
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch_rates(
        &self,
        base: &str,
        units: &[String],
    ) -> Result<BTreeMap<String, f64>, Error> {
        // The key is part of the path, so only the base goes into the logs.
        debug!(base, base_url = %self.base_url, "Requesting latest rates");

        let response = self.client.get(self.latest_url(base)).send().await?;
        let status = response.status();
        let body = response.text().await?;

        decode_response(status, &body, base, units)
    }
}
