//! CoinGecko `simple/price` client.

use std::collections::HashMap;

use async_trait::async_trait;

use super::{PriceError, PriceSource, PriceTable, usable};

pub const PUBLIC_API: &str = "https://api.coingecko.com/api/v3";
pub const PRO_API: &str = "https://pro-api.coingecko.com/api/v3";

#[derive(Debug, Clone)]
pub struct CoinGeckoSource {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoSource {
    /// Client for the public API, or the pro API when a key is given.
    pub fn new(api_key: Option<String>) -> Self {
        let base_url = if api_key.is_some() { PRO_API } else { PUBLIC_API };
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.to_string(),
            api_key,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    async fn fetch(&self, ids: &[String], currency: &str) -> Result<PriceTable, PriceError> {
        let url = format!("{}/simple/price", self.base_url.trim_end_matches('/'));
        let mut req = self
            .client
            .get(&url)
            .query(&[("ids", ids.join(",")), ("vs_currencies", currency.to_string())])
            .header("Accept", "application/json");

        if let Some(key) = &self.api_key {
            req = req.header("x-cg-pro-api-key", key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| PriceError::Unavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(PriceError::Status(resp.status().as_u16()));
        }

        // { "bitcoin": { "usd": 56000.12 }, ... }
        let body: HashMap<String, HashMap<String, serde_json::Value>> = resp
            .json()
            .await
            .map_err(|e| PriceError::InvalidResponse(e.to_string()))?;

        Ok(ids
            .iter()
            .map(|id| {
                let price = body
                    .get(id)
                    .and_then(|quotes| quotes.get(currency))
                    .and_then(serde_json::Value::as_f64);
                (id.clone(), usable(price))
            })
            .collect())
    }
}
