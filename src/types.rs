//! Core domain types for the swap engine
//!
//! Everything here mirrors the wallet backend's JSON shapes (snake_case
//! fields) so reconciliation payloads deserialize straight into these
//! structs. Token identity is structural: (network, contract-or-native),
//! never object identity and never the backend `id` field, which is not
//! stable for tokens synthesized client-side.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{SwapError, SwapResult};

// =============================================================================
// NETWORKS
// =============================================================================

/// Supported blockchain networks. Closed set: the backend execution service
/// only routes swaps for these four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    #[serde(rename = "ETH")]
    Eth,
    #[serde(rename = "BSC")]
    Bsc,
    #[serde(rename = "SOL")]
    Sol,
    #[serde(rename = "TON")]
    Ton,
}

impl Network {
    /// Wire value used by the wallet backend and price endpoints
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Eth => "ETH",
            Network::Bsc => "BSC",
            Network::Sol => "SOL",
            Network::Ton => "TON",
        }
    }

    /// Human-readable name used in user-facing notices
    pub fn display_name(&self) -> &'static str {
        match self {
            Network::Eth => "Ethereum",
            Network::Bsc => "BSC",
            Network::Sol => "Solana",
            Network::Ton => "TON",
        }
    }

    /// Symbol of the chain's base currency
    pub fn native_symbol(&self) -> &'static str {
        match self {
            Network::Eth => "ETH",
            Network::Bsc => "BNB",
            Network::Sol => "SOL",
            Network::Ton => "TON",
        }
    }

    /// Fixed per-network fee heuristic in native units. These are swap
    /// envelope estimates shown before confirmation, not live gas quotes -
    /// the backend execution service prices the real transaction.
    pub fn base_fee(&self) -> f64 {
        match self {
            Network::Eth => 0.008,
            Network::Bsc => 0.0004,
            Network::Sol => 0.00022,
            Network::Ton => 0.18,
        }
    }

    /// Path slug used by the pool-data provider
    pub fn market_slug(&self) -> &'static str {
        match self {
            Network::Eth => "eth",
            Network::Bsc => "bsc",
            Network::Sol => "solana",
            Network::Ton => "ton",
        }
    }

    pub fn all() -> [Network; 4] {
        [Network::Eth, Network::Bsc, Network::Sol, Network::Ton]
    }

    /// Parse a wire value ("ETH", "BSC", ...). Unknown values are an
    /// `UnsupportedNetwork` error so deep links with networks we have no
    /// provider mapping for fail before any request is issued.
    pub fn parse(value: &str) -> SwapResult<Network> {
        match value.trim().to_uppercase().as_str() {
            "ETH" => Ok(Network::Eth),
            "BSC" => Ok(Network::Bsc),
            "SOL" => Ok(Network::Sol),
            "TON" => Ok(Network::Ton),
            other => Err(SwapError::UnsupportedNetwork(other.to_string())),
        }
    }

    /// Validate contract address syntax for this network. Purely local,
    /// no provider call - malformed input must never reach the network.
    pub fn is_valid_contract_address(&self, address: &str) -> bool {
        match self {
            Network::Eth | Network::Bsc => ETH_ADDRESS_RE.is_match(address),
            Network::Sol => SOL_ADDRESS_RE.is_match(address),
            Network::Ton => TON_ADDRESS_RE.is_match(address),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static ETH_ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[a-fA-F0-9]{40}$").unwrap());
static SOL_ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-zA-Z0-9]{32}|[a-zA-Z0-9]{43}|[a-zA-Z0-9]{44})$").unwrap());
static TON_ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(EQ|UQ)[a-zA-Z0-9_-]{46}$").unwrap());

// =============================================================================
// TOKENS & WALLETS
// =============================================================================

/// A token held (or about to be held) by a wallet.
///
/// `contract = None` means the network's native asset. `balance` and `price`
/// are only ever updated through wallet reconciliation - the engine never
/// patches them in place from other sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub wallet_id: String,
    pub network: Network,
    pub symbol: String,
    pub name: String,
    pub contract: Option<String>,
    pub balance: f64,
    pub balance_usd: f64,
    pub price: f64,
    #[serde(default)]
    pub price_change_percentage: f64,
    #[serde(default)]
    pub icon: String,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Token {
    /// Structural identity key for this token
    pub fn key(&self) -> TokenKey {
        TokenKey::new(self.network, self.contract.as_deref())
    }

    pub fn is_native(&self) -> bool {
        self.contract.is_none()
    }

    /// Two tokens are the same asset iff their keys match. This is the only
    /// sameness check the engine uses - backend ids for synthesized tokens
    /// are not stable across wallet fetches.
    pub fn is_same_asset(&self, other: &Token) -> bool {
        self.key() == other.key()
    }
}

/// Structural token identity: network plus lowercased contract address,
/// with `None` standing for the native asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenKey {
    pub network: Network,
    pub contract: Option<String>,
}

impl TokenKey {
    pub fn new(network: Network, contract: Option<&str>) -> Self {
        Self {
            network,
            contract: contract.map(|c| c.trim().to_lowercase()),
        }
    }
}

impl std::fmt::Display for TokenKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.contract {
            Some(contract) => write!(f, "{}:{}", self.network.as_str(), contract),
            None => write!(f, "{}:native", self.network.as_str()),
        }
    }
}

/// A wallet as reported by the backend. The tokens list is replaced
/// wholesale on every reconciliation, never patched field-by-field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: String,
    pub network: Network,
    pub address: String,
    pub tokens: Vec<Token>,
}

impl Wallet {
    /// Find a token by structural key
    pub fn find_token(&self, key: &TokenKey) -> Option<&Token> {
        self.tokens.iter().find(|t| t.key() == *key)
    }

    pub fn has_token(&self, key: &TokenKey) -> bool {
        self.find_token(key).is_some()
    }

    /// Find the network's native asset entry
    pub fn native_token(&self) -> Option<&Token> {
        self.tokens.iter().find(|t| t.is_native())
    }
}

// =============================================================================
// CACHING
// =============================================================================

/// A cached value with its fetch timestamp. Validity is decided by the
/// owning cache tier's TTL, not stored in the entry.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub fetched_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_expired(&self, ttl_secs: i64) -> bool {
        Utc::now() - self.fetched_at > Duration::seconds(ttl_secs)
    }
}
