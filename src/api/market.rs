//! Pool-data provider client
//!
//! Speaks the GeckoTerminal-style JSON:API dialect: `data[]` entries with
//! an `attributes` bag where every numeric field arrives as a string.
//! Responses are normalized into `PoolInfo` here so the cache layer never
//! touches the raw wire shape.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ApiTransport;
use crate::configs::Configs;
use crate::errors::{SwapError, SwapResult};
use crate::logger::{self, LogTag};
use crate::types::Network;

// =============================================================================
// TRAIT & NORMALIZED TYPES
// =============================================================================

#[async_trait]
pub trait PoolDataProvider: Send + Sync {
    /// Pools holding the token, ordered by 24h volume descending
    async fn pools_for_token(
        &self,
        network: Network,
        contract: &str,
    ) -> SwapResult<Vec<PoolInfo>>;

    /// Direct pool lookup; `None` when the provider does not know the address
    async fn pool_by_address(
        &self,
        network: Network,
        address: &str,
    ) -> SwapResult<Option<PoolInfo>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TxnWindow {
    pub buys: i64,
    pub sells: i64,
}

/// Normalized pool snapshot used for the buys/sells panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolInfo {
    pub address: String,
    pub name: String,
    pub base_symbol: String,
    pub quote_symbol: String,
    pub txns_m5: TxnWindow,
    pub txns_h1: TxnWindow,
    pub volume_usd_h24: f64,
    pub price_change_h24: f64,
}

impl PoolInfo {
    /// True if the pool quotes against USDT (preferred pool for natives
    /// and the tie-breaker for token searches)
    pub fn is_usdt_quoted(&self) -> bool {
        self.quote_symbol.eq_ignore_ascii_case("USDT")
    }
}

// =============================================================================
// HTTP IMPLEMENTATION
// =============================================================================

pub struct HttpPoolDataProvider {
    transport: ApiTransport,
    base_url: String,
}

impl HttpPoolDataProvider {
    pub fn new(configs: &Configs) -> SwapResult<Self> {
        Ok(Self {
            transport: ApiTransport::new(configs.http.request_timeout_secs)?,
            base_url: configs
                .endpoints
                .market_url
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

// Raw JSON:API shapes. Numbers come as strings, most fields are optional.

#[derive(Debug, Deserialize)]
struct GtListResponse {
    #[serde(default)]
    data: Vec<GtPool>,
}

#[derive(Debug, Deserialize)]
struct GtItemResponse {
    data: Option<GtPool>,
}

#[derive(Debug, Deserialize)]
struct GtPool {
    attributes: Option<GtPoolAttributes>,
}

#[derive(Debug, Deserialize)]
struct GtPoolAttributes {
    address: Option<String>,
    name: Option<String>,
    #[serde(default)]
    transactions: HashMap<String, GtTxnWindow>,
    #[serde(default)]
    volume_usd: HashMap<String, Option<String>>,
    #[serde(default)]
    price_change_percentage: HashMap<String, Option<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct GtTxnWindow {
    #[serde(default)]
    buys: Option<i64>,
    #[serde(default)]
    sells: Option<i64>,
}

fn normalize(pool: GtPool) -> Option<PoolInfo> {
    let attributes = pool.attributes?;
    let address = attributes.address?;
    let name = attributes.name.unwrap_or_default();
    let (base_symbol, quote_symbol) = split_pair_name(&name);
    Some(PoolInfo {
        address,
        base_symbol,
        quote_symbol,
        txns_m5: txn_window(attributes.transactions.get("m5")),
        txns_h1: txn_window(attributes.transactions.get("h1")),
        volume_usd_h24: string_metric(attributes.volume_usd.get("h24")),
        price_change_h24: string_metric(attributes.price_change_percentage.get("h24")),
        name,
    })
}

fn txn_window(raw: Option<&GtTxnWindow>) -> TxnWindow {
    match raw {
        Some(window) => TxnWindow {
            buys: window.buys.unwrap_or(0),
            sells: window.sells.unwrap_or(0),
        },
        None => TxnWindow::default(),
    }
}

/// Parse a string-encoded metric ("12345.67"), defaulting to 0 on absence
fn string_metric(raw: Option<&Option<String>>) -> f64 {
    raw.and_then(|v| v.as_deref())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Pool names look like "WETH / USDT 0.05%"; the fee tier tail is dropped
fn split_pair_name(name: &str) -> (String, String) {
    let mut parts = name.split(" / ");
    let base = parts.next().unwrap_or("").trim().to_string();
    let quote = parts
        .next()
        .unwrap_or("")
        .trim()
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_string();
    (base, quote)
}

#[async_trait]
impl PoolDataProvider for HttpPoolDataProvider {
    async fn pools_for_token(
        &self,
        network: Network,
        contract: &str,
    ) -> SwapResult<Vec<PoolInfo>> {
        let url = format!(
            "{}/networks/{}/tokens/{}/pools",
            self.base_url,
            network.market_slug(),
            contract
        );
        let response: GtListResponse = self.transport.get_json(&url).await?;
        let pools: Vec<PoolInfo> = response.data.into_iter().filter_map(normalize).collect();
        logger::debug(
            LogTag::Api,
            &format!(
                "Found {} pools for {} on {}",
                pools.len(),
                contract,
                network.market_slug()
            ),
        );
        Ok(pools)
    }

    async fn pool_by_address(
        &self,
        network: Network,
        address: &str,
    ) -> SwapResult<Option<PoolInfo>> {
        let url = format!(
            "{}/networks/{}/pools/{}",
            self.base_url,
            network.market_slug(),
            address
        );
        let response: GtItemResponse = match self.transport.get_json(&url).await {
            Ok(response) => response,
            // unknown pool addresses come back as 404
            Err(SwapError::Api { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(response.data.and_then(normalize))
    }
}
