//! Price and token metadata provider
//!
//! The wallet backend doubles as the price oracle: unit prices in USD,
//! token lookup by contract, extended market info and daily historical
//! quotes all live under the same base URL. Lookup endpoints distinguish
//! "definitively unknown" (ok=false or empty data, mapped to `Ok(None)` /
//! empty vec) from transport failures (mapped to `Err`), because callers
//! cache the former and retry the latter.

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiTransport, Envelope};
use crate::configs::Configs;
use crate::errors::{SwapError, SwapResult};
use crate::logger::{self, LogTag};
use crate::types::{Network, Token};

// =============================================================================
// TRAIT & WIRE TYPES
// =============================================================================

#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Current USD price of one unit of `symbol` on `network`. Never
    /// cached: the quote path always wants a fresh pair of prices.
    async fn unit_price(&self, symbol: &str, network: Network) -> SwapResult<f64>;

    /// Token metadata by contract address; `None` when the provider does
    /// not know the contract
    async fn token_info(&self, network: Network, contract: &str)
        -> SwapResult<Option<TokenInfo>>;

    /// Extended market info for a held token; `None` when unavailable
    async fn extended_info(&self, token: &Token) -> SwapResult<Option<ExtendedInfo>>;

    /// Daily close prices over the trailing `window_days`; empty when the
    /// provider has no history for the token
    async fn historical_quotes(
        &self,
        token: &Token,
        window_days: i64,
        interval: &str,
    ) -> SwapResult<Vec<HistoricalQuote>>;
}

/// Metadata for a token not yet in the wallet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub contract: String,
    pub symbol: String,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub price_change_percentage: f64,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedInfo {
    pub price: f64,
    #[serde(default)]
    pub percent_change_24h: f64,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub volume_24h: Option<f64>,
    #[serde(default)]
    pub total_supply: Option<f64>,
    #[serde(default)]
    pub max_supply: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalQuote {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

// =============================================================================
// HTTP IMPLEMENTATION
// =============================================================================

pub struct HttpPriceProvider {
    transport: ApiTransport,
    base_url: String,
}

impl HttpPriceProvider {
    pub fn new(configs: &Configs) -> SwapResult<Self> {
        Ok(Self {
            transport: ApiTransport::new(configs.http.request_timeout_secs)?,
            base_url: configs
                .endpoints
                .backend_url
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct PriceData {
    price: f64,
}

#[derive(Debug, Deserialize)]
struct HistoricalData {
    #[serde(default)]
    quotes: Vec<HistoricalQuote>,
}

#[async_trait]
impl PriceProvider for HttpPriceProvider {
    async fn unit_price(&self, symbol: &str, network: Network) -> SwapResult<f64> {
        let url = format!(
            "{}/price?symbol={}&network={}",
            self.base_url,
            symbol,
            network.as_str()
        );
        let envelope: Envelope<PriceData> = self.transport.get_json(&url).await?;
        let price = envelope.into_data(&url)?.price;
        if price <= 0.0 || !price.is_finite() {
            return Err(SwapError::Provider {
                endpoint: url,
                message: format!("non-positive price {} for {}", price, symbol),
            });
        }
        logger::debug(
            LogTag::Api,
            &format!("Unit price {}={} USD ({})", symbol, price, network.as_str()),
        );
        Ok(price)
    }

    async fn token_info(
        &self,
        network: Network,
        contract: &str,
    ) -> SwapResult<Option<TokenInfo>> {
        let url = format!(
            "{}/token-info?network={}&contract={}",
            self.base_url,
            network.as_str(),
            contract
        );
        let envelope: Envelope<TokenInfo> = self.transport.get_json(&url).await?;
        // ok=false means the provider does not know this contract
        if envelope.ok {
            Ok(envelope.data)
        } else {
            Ok(None)
        }
    }

    async fn extended_info(&self, token: &Token) -> SwapResult<Option<ExtendedInfo>> {
        let mut url = format!(
            "{}/extended-info?symbol={}&network={}",
            self.base_url,
            token.symbol,
            token.network.as_str()
        );
        if let Some(contract) = &token.contract {
            url.push_str(&format!("&contract={}", contract));
        }
        let envelope: Envelope<ExtendedInfo> = self.transport.get_json(&url).await?;
        if envelope.ok {
            Ok(envelope.data)
        } else {
            Ok(None)
        }
    }

    async fn historical_quotes(
        &self,
        token: &Token,
        window_days: i64,
        interval: &str,
    ) -> SwapResult<Vec<HistoricalQuote>> {
        let time_end = Utc::now();
        let time_start = time_end - Duration::days(window_days);
        let mut url = format!(
            "{}/historical-quotes?symbol={}&network={}&timeStart={}&timeEnd={}&interval={}&convert=USD",
            self.base_url,
            token.symbol,
            token.network.as_str(),
            time_start.to_rfc3339_opts(SecondsFormat::Secs, true),
            time_end.to_rfc3339_opts(SecondsFormat::Secs, true),
            interval
        );
        if let Some(contract) = &token.contract {
            url.push_str(&format!("&address={}", contract));
        }
        let envelope: Envelope<HistoricalData> = self.transport.get_json(&url).await?;
        if !envelope.ok {
            return Ok(Vec::new());
        }
        let quotes = envelope.data.map(|d| d.quotes).unwrap_or_default();
        logger::debug(
            LogTag::Api,
            &format!(
                "Fetched {} historical quotes for {} over {}d",
                quotes.len(),
                token.symbol,
                window_days
            ),
        );
        Ok(quotes)
    }
}
