//! Market data cache
//!
//! Read-through cache in front of the pool-data and price providers with
//! one TTL per tier: pool snapshots and extended info are short-lived,
//! pool-address resolution and token metadata are effectively static.
//! Lookups that fail transiently are never cached (the next trigger
//! retries); lookups that succeed with "no data" are not cached either,
//! so a token listed minutes later shows up as soon as a fresh trigger
//! fires.
//!
//! Cache keys are `<network-slug>:<contract>` for contract tokens and
//! `<network-slug>:<symbol>` for natives, lowercased.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::api::{ExtendedInfo, PoolDataProvider, PoolInfo, PriceProvider, TokenInfo};
use crate::configs::CacheConfigs;
use crate::errors::SwapResult;
use crate::logger::{self, LogTag};
use crate::types::{CacheEntry, Network, Token};

/// Well-known native/USDT pools, one per network. Native assets have no
/// contract address to search pools by, so their market panel is pinned
/// to the deepest USDT pool on the chain's flagship venue.
pub fn native_usdt_pool(network: Network) -> &'static str {
    match network {
        Network::Eth => "0x11b815efb8f581194ae79006d24e0d814b7697f6",
        Network::Bsc => "0x16b9a82891338f9ba80e2d6970fdda79d1eb0dae",
        Network::Sol => "58oQChx4yWmvKdwLLZzBi4ChoCc2fqCUWBkwMihLYQo2",
        Network::Ton => "EQD8TJ8xEWB1SpnRE4d89YO3jl0W0EiBnNS4IBaHaUmdfizE",
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub pool_info_entries: usize,
    pub extended_info_entries: usize,
    pub pool_address_entries: usize,
    pub token_info_entries: usize,
}

pub struct MarketDataCache {
    pools: Arc<dyn PoolDataProvider>,
    prices: Arc<dyn PriceProvider>,
    ttl: CacheConfigs,
    pool_info: RwLock<HashMap<String, CacheEntry<PoolInfo>>>,
    extended_info: RwLock<HashMap<String, CacheEntry<ExtendedInfo>>>,
    pool_addresses: RwLock<HashMap<String, CacheEntry<String>>>,
    token_info: RwLock<HashMap<String, CacheEntry<TokenInfo>>>,
}

impl MarketDataCache {
    pub fn new(
        pools: Arc<dyn PoolDataProvider>,
        prices: Arc<dyn PriceProvider>,
        ttl: CacheConfigs,
    ) -> Self {
        Self {
            pools,
            prices,
            ttl,
            pool_info: RwLock::new(HashMap::new()),
            extended_info: RwLock::new(HashMap::new()),
            pool_addresses: RwLock::new(HashMap::new()),
            token_info: RwLock::new(HashMap::new()),
        }
    }

    fn cache_key(token: &Token) -> String {
        match &token.contract {
            Some(contract) => {
                format!("{}:{}", token.network.market_slug(), contract.to_lowercase())
            }
            None => format!(
                "{}:{}",
                token.network.market_slug(),
                token.symbol.to_lowercase()
            ),
        }
    }

    // =========================================================================
    // POOL SNAPSHOTS
    // =========================================================================

    /// Pool snapshot for the token's primary pool. `Ok(None)` means the
    /// provider definitively knows no pool; transport failures bubble up.
    pub async fn get_pool_info(&self, token: &Token) -> SwapResult<Option<PoolInfo>> {
        let key = Self::cache_key(token);
        {
            let cache = self.pool_info.read().await;
            if let Some(entry) = cache.get(&key) {
                if !entry.is_expired(self.ttl.pool_info_ttl_secs) {
                    logger::debug(LogTag::Market, &format!("Pool info cache hit for {}", key));
                    return Ok(Some(entry.value.clone()));
                }
            }
        }

        let fetched = self.fetch_pool_info(token, &key).await?;
        if let Some(info) = &fetched {
            let mut cache = self.pool_info.write().await;
            cache.insert(key.clone(), CacheEntry::new(info.clone()));
            logger::debug(
                LogTag::Market,
                &format!("Cached pool {} for {}", info.address, key),
            );
        }
        Ok(fetched)
    }

    async fn fetch_pool_info(&self, token: &Token, key: &str) -> SwapResult<Option<PoolInfo>> {
        match &token.contract {
            None => {
                let address = native_usdt_pool(token.network);
                self.pools.pool_by_address(token.network, address).await
            }
            Some(contract) => {
                // address tier first: it outlives the snapshot TTL by hours
                if let Some(address) = self.cached_pool_address(key).await {
                    if let Some(info) =
                        self.pools.pool_by_address(token.network, &address).await?
                    {
                        return Ok(Some(info));
                    }
                    // cached address went dark, fall through to a fresh search
                }

                let pools = self.pools.pools_for_token(token.network, contract).await?;
                let best = pick_pool(pools);
                if let Some(info) = &best {
                    let mut cache = self.pool_addresses.write().await;
                    cache.insert(key.to_string(), CacheEntry::new(info.address.clone()));
                }
                Ok(best)
            }
        }
    }

    async fn cached_pool_address(&self, key: &str) -> Option<String> {
        let cache = self.pool_addresses.read().await;
        cache
            .get(key)
            .filter(|entry| !entry.is_expired(self.ttl.pool_address_ttl_secs))
            .map(|entry| entry.value.clone())
    }

    // =========================================================================
    // EXTENDED INFO
    // =========================================================================

    /// Extended market info for a held token, short TTL
    pub async fn get_extended_info(&self, token: &Token) -> SwapResult<Option<ExtendedInfo>> {
        let key = Self::cache_key(token);
        {
            let cache = self.extended_info.read().await;
            if let Some(entry) = cache.get(&key) {
                if !entry.is_expired(self.ttl.extended_info_ttl_secs) {
                    return Ok(Some(entry.value.clone()));
                }
            }
        }

        let fetched = self.prices.extended_info(token).await?;
        if let Some(info) = &fetched {
            let mut cache = self.extended_info.write().await;
            cache.insert(key, CacheEntry::new(info.clone()));
        }
        Ok(fetched)
    }

    // =========================================================================
    // TOKEN METADATA
    // =========================================================================

    /// Token metadata by contract, long TTL. Metadata is effectively
    /// static; only a process restart or TTL expiry refetches it.
    pub async fn get_token_info(
        &self,
        network: Network,
        contract: &str,
    ) -> SwapResult<Option<TokenInfo>> {
        let key = format!("{}:{}", network.market_slug(), contract.to_lowercase());
        {
            let cache = self.token_info.read().await;
            if let Some(entry) = cache.get(&key) {
                if !entry.is_expired(self.ttl.token_info_ttl_secs) {
                    return Ok(Some(entry.value.clone()));
                }
            }
        }

        let fetched = self.prices.token_info(network, contract).await?;
        if let Some(info) = &fetched {
            let mut cache = self.token_info.write().await;
            cache.insert(key, CacheEntry::new(info.clone()));
        }
        Ok(fetched)
    }

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            pool_info_entries: self.pool_info.read().await.len(),
            extended_info_entries: self.extended_info.read().await.len(),
            pool_address_entries: self.pool_addresses.read().await.len(),
            token_info_entries: self.token_info.read().await.len(),
        }
    }

    pub async fn clear(&self) {
        self.pool_info.write().await.clear();
        self.extended_info.write().await.clear();
        self.pool_addresses.write().await.clear();
        self.token_info.write().await.clear();
    }
}

/// Prefer the USDT-quoted pool, else take the most liquid one (the
/// provider already orders by 24h volume descending)
fn pick_pool(pools: Vec<PoolInfo>) -> Option<PoolInfo> {
    if let Some(index) = pools.iter().position(|p| p.is_usdt_quoted()) {
        return pools.into_iter().nth(index);
    }
    pools.into_iter().next()
}
