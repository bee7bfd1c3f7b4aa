//! Price oracle adapter
//!
//! Two implementations: a reqwest client against a Chainlink-style feed
//! endpoint, and a static table for development mode. Both answer unknown
//! assets with $0 rather than an error; origination then fails the
//! collateral gate instead of the whole request.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::LendingResult;

/// Asset price and per-chain gas lookups
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// USD price per asset symbol. Unknown assets map to 0.0.
    async fn get_prices(&self, assets: &[String]) -> LendingResult<HashMap<String, f64>>;

    /// Current gas price per chain name, in the chain's native display unit.
    async fn get_gas_prices(&self, chains: &[String]) -> LendingResult<HashMap<String, f64>>;

    /// Convenience single-asset lookup.
    async fn get_price(&self, asset: &str) -> LendingResult<f64> {
        let prices = self.get_prices(&[asset.to_string()]).await?;
        Ok(prices.get(asset).copied().unwrap_or(0.0))
    }
}

#[derive(Debug, Deserialize)]
struct PriceFeedResponse {
    prices: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct GasFeedResponse {
    gas_prices: HashMap<String, f64>,
}

/// HTTP price feed client
#[derive(Clone)]
pub struct FeedPriceOracle {
    client: reqwest::Client,
    base_url: String,
}

impl FeedPriceOracle {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    fn normalize(&self, requested: &[String], mut found: HashMap<String, f64>) -> HashMap<String, f64> {
        // The feed omits symbols it does not track; callers always get an
        // entry per requested asset.
        requested
            .iter()
            .map(|a| (a.clone(), found.remove(a).unwrap_or(0.0)))
            .collect()
    }
}

#[async_trait]
impl PriceOracle for FeedPriceOracle {
    async fn get_prices(&self, assets: &[String]) -> LendingResult<HashMap<String, f64>> {
        let url = format!("{}/v1/prices", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("symbols", assets.join(","))])
            .send()
            .await?
            .error_for_status()?;

        let body: PriceFeedResponse = response.json().await?;
        Ok(self.normalize(assets, body.prices))
    }

    async fn get_gas_prices(&self, chains: &[String]) -> LendingResult<HashMap<String, f64>> {
        let url = format!("{}/v1/gas", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("chains", chains.join(","))])
            .send()
            .await?
            .error_for_status()?;

        let body: GasFeedResponse = response.json().await?;
        Ok(self.normalize(chains, body.gas_prices))
    }
}

/// Fixed price table for development mode and tests
#[derive(Clone)]
pub struct StaticPriceOracle {
    prices: HashMap<String, f64>,
    gas_prices: HashMap<String, f64>,
}

impl StaticPriceOracle {
    /// Development-mode table with a handful of liquid assets.
    pub fn sample() -> Self {
        let prices = [
            ("SOL", 125.50),
            ("BTC", 55000.00),
            ("ETH", 2800.75),
            ("AVAX", 75.25),
            ("USDC", 1.00),
            ("DAI", 1.00),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let gas_prices = [
            ("solana", 0.02),
            ("ethereum", 15.50),
            ("base", 2.25),
            ("avalanche", 3.75),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self { prices, gas_prices }
    }

    pub fn with_price(mut self, asset: &str, price: f64) -> Self {
        self.prices.insert(asset.to_string(), price);
        self
    }
}

#[async_trait]
impl PriceOracle for StaticPriceOracle {
    async fn get_prices(&self, assets: &[String]) -> LendingResult<HashMap<String, f64>> {
        Ok(assets
            .iter()
            .map(|a| (a.clone(), self.prices.get(a).copied().unwrap_or(0.0)))
            .collect())
    }

    async fn get_gas_prices(&self, chains: &[String]) -> LendingResult<HashMap<String, f64>> {
        Ok(chains
            .iter()
            .map(|c| (c.clone(), self.gas_prices.get(c).copied().unwrap_or(0.0)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_asset_prices_at_zero() {
        let oracle = StaticPriceOracle::sample();
        let prices = oracle
            .get_prices(&["ETH".to_string(), "SHITCOIN".to_string()])
            .await
            .unwrap();

        assert_eq!(prices["ETH"], 2800.75);
        assert_eq!(prices["SHITCOIN"], 0.0);
    }

    #[tokio::test]
    async fn test_single_price_helper() {
        let oracle = StaticPriceOracle::sample().with_price("ETH", 3000.0);
        assert_eq!(oracle.get_price("ETH").await.unwrap(), 3000.0);
        assert_eq!(oracle.get_price("UNKNOWN").await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_gas_prices() {
        let oracle = StaticPriceOracle::sample();
        let gas = oracle
            .get_gas_prices(&["base".to_string(), "unknown-chain".to_string()])
            .await
            .unwrap();
        assert_eq!(gas["base"], 2.25);
        assert_eq!(gas["unknown-chain"], 0.0);
    }
}
