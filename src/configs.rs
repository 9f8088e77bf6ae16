//! Runtime configuration loaded from configs.json
//!
//! Every section has full serde defaults so a partial (or missing) file
//! still yields a working configuration. The struct is built once at
//! startup and handed to the engine; nothing in the library reads it
//! through a global.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Runtime configuration for the swap engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Configs {
    #[serde(default)]
    pub endpoints: EndpointConfigs,
    #[serde(default)]
    pub http: HttpConfigs,
    #[serde(default)]
    pub swap: SwapConfigs,
    #[serde(default)]
    pub cache: CacheConfigs,
}

/// Reads a configs.json file and returns a Configs object
pub fn read_configs<P: AsRef<Path>>(path: P) -> Result<Configs, Box<dyn std::error::Error>> {
    let data = fs::read_to_string(path)?;
    let configs: Configs = serde_json::from_str(&data)?;
    Ok(configs)
}

// =============================================================================
// SECTIONS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfigs {
    /// Wallet backend base URL (wallets, token add, swap, price endpoints)
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    /// Pool-data provider base URL
    #[serde(default = "default_market_url")]
    pub market_url: String,
}

impl Default for EndpointConfigs {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            market_url: default_market_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfigs {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for HttpConfigs {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapConfigs {
    /// Trailing-edge debounce window for quote and info refreshes
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Default slippage tolerance in basis points (500 = 5%)
    #[serde(default = "default_slippage_bps")]
    pub default_slippage_bps: u32,
    /// Delay before the post-swap wallet refresh fires
    #[serde(default = "default_post_swap_refresh_secs")]
    pub post_swap_refresh_secs: u64,
    /// Minimum spacing between two wallet refreshes
    #[serde(default = "default_min_refresh_spacing_secs")]
    pub min_refresh_spacing_secs: u64,
}

impl Default for SwapConfigs {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            default_slippage_bps: default_slippage_bps(),
            post_swap_refresh_secs: default_post_swap_refresh_secs(),
            min_refresh_spacing_secs: default_min_refresh_spacing_secs(),
        }
    }
}

/// TTLs per cache tier, in seconds. Unit prices are never cached; the
/// quote path always fetches them fresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfigs {
    #[serde(default = "default_pool_info_ttl_secs")]
    pub pool_info_ttl_secs: i64,
    #[serde(default = "default_extended_info_ttl_secs")]
    pub extended_info_ttl_secs: i64,
    #[serde(default = "default_pool_address_ttl_secs")]
    pub pool_address_ttl_secs: i64,
    #[serde(default = "default_token_info_ttl_secs")]
    pub token_info_ttl_secs: i64,
}

impl Default for CacheConfigs {
    fn default() -> Self {
        Self {
            pool_info_ttl_secs: default_pool_info_ttl_secs(),
            extended_info_ttl_secs: default_extended_info_ttl_secs(),
            pool_address_ttl_secs: default_pool_address_ttl_secs(),
            token_info_ttl_secs: default_token_info_ttl_secs(),
        }
    }
}

// =============================================================================
// DEFAULTS
// =============================================================================

fn default_backend_url() -> String {
    "https://api.cryptoswap.app/v1".to_string()
}

fn default_market_url() -> String {
    "https://api.geckoterminal.com/api/v2".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_debounce_ms() -> u64 {
    350
}

fn default_slippage_bps() -> u32 {
    500
}

fn default_post_swap_refresh_secs() -> u64 {
    50
}

fn default_min_refresh_spacing_secs() -> u64 {
    3
}

fn default_pool_info_ttl_secs() -> i64 {
    60
}

fn default_extended_info_ttl_secs() -> i64 {
    60
}

fn default_pool_address_ttl_secs() -> i64 {
    6 * 3600
}

fn default_token_info_ttl_secs() -> i64 {
    24 * 3600
}
