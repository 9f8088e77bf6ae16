//! Token resolution
//!
//! Maps a (network, contract-or-native) reference to a concrete `Token`.
//! Wallet hits are returned unchanged with zero network traffic. Misses on
//! a contract token go through the token-info tier of the market data
//! cache, get synthesized with a zero balance, and are registered with the
//! backend so the wallet starts tracking them (the add is idempotent
//! server-side). Natives are always seeded by the backend at wallet
//! creation, so a native miss is a hard not-found.

use chrono::Utc;
use std::sync::Arc;

use crate::api::{TokenInfo, WalletBackend};
use crate::errors::{SwapError, SwapResult};
use crate::logger::{self, LogTag};
use crate::market_data::MarketDataCache;
use crate::types::{Network, Token, TokenKey, Wallet};

/// A user-supplied token reference, e.g. from a deep link
#[derive(Debug, Clone)]
pub struct TokenRef {
    pub network: Network,
    /// `None` (or the literal "native" upstream) means the native asset
    pub contract: Option<String>,
}

impl TokenRef {
    pub fn parse(network: Network, raw: &str) -> Self {
        let trimmed = raw.trim();
        let contract = if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("native") {
            None
        } else {
            Some(trimmed.to_string())
        };
        Self { network, contract }
    }

    fn key(&self) -> TokenKey {
        TokenKey::new(self.network, self.contract.as_deref())
    }
}

pub struct TokenResolver {
    market: Arc<MarketDataCache>,
    backend: Arc<dyn WalletBackend>,
}

impl TokenResolver {
    pub fn new(market: Arc<MarketDataCache>, backend: Arc<dyn WalletBackend>) -> Self {
        Self { market, backend }
    }

    /// Resolve a token reference against the wallet. Idempotent: a
    /// reference already present in the wallet is returned as-is and never
    /// re-added.
    pub async fn resolve(&self, reference: &TokenRef, wallet: &Wallet) -> SwapResult<Token> {
        if let Some(existing) = wallet.find_token(&reference.key()) {
            logger::debug(
                LogTag::Resolver,
                &format!("Wallet hit for {}", reference.key()),
            );
            return Ok(existing.clone());
        }

        let contract = match &reference.contract {
            Some(contract) => contract,
            // natives are seeded at wallet creation; nothing to synthesize
            None => {
                return Err(SwapError::TokenNotFound {
                    network: reference.network,
                    reference: "native".to_string(),
                })
            }
        };

        if !reference.network.is_valid_contract_address(contract) {
            return Err(SwapError::InvalidAddress {
                network: reference.network,
                address: contract.clone(),
            });
        }

        let info = self
            .market
            .get_token_info(reference.network, contract)
            .await?
            .ok_or_else(|| SwapError::TokenNotFound {
                network: reference.network,
                reference: contract.clone(),
            })?;

        let token = synthesize(wallet, reference.network, contract, &info);
        self.backend.add_token(wallet, contract).await?;
        logger::info(
            LogTag::Resolver,
            &format!(
                "Resolved new token {} ({}) on {}",
                token.symbol,
                contract,
                reference.network.as_str()
            ),
        );
        Ok(token)
    }

    /// Resolve both sides of a deep-link pair in one go
    pub async fn resolve_pair(
        &self,
        from: &TokenRef,
        to: &TokenRef,
        wallet: &Wallet,
    ) -> SwapResult<(Token, Token)> {
        let from_token = self.resolve(from, wallet).await?;
        let to_token = self.resolve(to, wallet).await?;
        Ok((from_token, to_token))
    }
}

/// Build a Token for a contract the wallet does not hold yet. Balance is
/// zero until the next reconciliation; the id mirrors the contract until
/// the backend assigns its own.
fn synthesize(wallet: &Wallet, network: Network, contract: &str, info: &TokenInfo) -> Token {
    let now = Utc::now();
    Token {
        id: info.contract.clone(),
        wallet_id: wallet.id.clone(),
        network,
        symbol: info.symbol.clone(),
        name: info.name.clone(),
        contract: Some(contract.to_string()),
        balance: 0.0,
        balance_usd: 0.0,
        price: info.price,
        price_change_percentage: info.price_change_percentage,
        icon: info.icon.clone(),
        added_at: now,
        updated_at: now,
    }
}
