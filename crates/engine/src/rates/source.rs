//! Rate source adapters.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::{CurrencyCode, EngineError, ResultEngine};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RateSourceError {
    #[error("rate source unreachable: {0}")]
    Transport(String),
    #[error("rate source returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// External provider of rates relative to a base currency.
///
/// The returned map is `code -> units of code per one unit of base`.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Tag stored on every observation taken from this source.
    fn name(&self) -> &str;

    async fn fetch(&self, base: &CurrencyCode) -> Result<HashMap<String, f64>, RateSourceError>;
}

/// `GET {url}/{base}` against an exchangerate-api compatible endpoint.
#[derive(Debug)]
pub struct ExchangeRateApi {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    rates: HashMap<String, f64>,
}

impl ExchangeRateApi {
    pub fn new(url: &str, timeout_secs: u64) -> ResultEngine<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| EngineError::Configuration(e.to_string()))?;
        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RateSource for ExchangeRateApi {
    fn name(&self) -> &str {
        "exchangerate-api"
    }

    async fn fetch(&self, base: &CurrencyCode) -> Result<HashMap<String, f64>, RateSourceError> {
        let response = self
            .client
            .get(format!("{}/{}", self.url, base))
            .send()
            .await
            .map_err(|e| RateSourceError::Transport(e.without_url().to_string()))?;
        if !response.status().is_success() {
            return Err(RateSourceError::Transport(format!(
                "HTTP {}",
                response.status()
            )));
        }
        let body: LatestRatesResponse = response
            .json()
            .await
            .map_err(|e| RateSourceError::InvalidResponse(e.without_url().to_string()))?;
        Ok(body
            .rates
            .into_iter()
            .map(|(code, rate)| (code.to_ascii_uppercase(), rate))
            .collect())
    }
}

/// In-memory source with a fixed table, for offline runs and tests.
#[derive(Clone, Debug, Default)]
pub struct FixedRateSource {
    rates: HashMap<String, f64>,
}

impl FixedRateSource {
    pub fn new<I, S>(rates: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            rates: rates.into_iter().map(|(c, r)| (c.into(), r)).collect(),
        }
    }
}

#[async_trait]
impl RateSource for FixedRateSource {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn fetch(&self, _base: &CurrencyCode) -> Result<HashMap<String, f64>, RateSourceError> {
        Ok(self.rates.clone())
    }
}
