//! Quote engine
//!
//! Computes the conversion rate and output amount for the working pair.
//! Local preconditions run first and issue zero network traffic when
//! violated; a valid request then reconciles the wallet (rebinding both
//! sides by structural key), fetches a fresh unit price per side, and
//! derives `rate = from_price / to_price`. Unit prices are never cached.
//!
//! Debouncing and last-issued-wins arbitration live in the session layer;
//! this engine is a plain async call.

use std::sync::Arc;

use crate::api::PriceProvider;
use crate::errors::{SwapError, SwapResult};
use crate::logger::{self, LogTag};
use crate::types::Token;
use crate::wallets::{rebind, WalletReconciler};

/// A computed conversion. The rebound tokens ride along so the caller can
/// adopt the freshly reconciled balances in the same state write.
#[derive(Debug, Clone)]
pub struct Quote {
    pub rate: f64,
    pub to_amount_text: String,
    pub from_token: Token,
    pub to_token: Token,
}

pub struct QuoteEngine {
    prices: Arc<dyn PriceProvider>,
    reconciler: Arc<WalletReconciler>,
}

impl QuoteEngine {
    pub fn new(prices: Arc<dyn PriceProvider>, reconciler: Arc<WalletReconciler>) -> Self {
        Self { prices, reconciler }
    }

    pub async fn quote(
        &self,
        wallet_id: &str,
        from: &Token,
        to: &Token,
        amount_text: &str,
    ) -> SwapResult<Quote> {
        let amount = parse_amount(amount_text)?;
        if amount > from.balance {
            return Err(SwapError::Validation(format!(
                "amount {} exceeds {} balance {}",
                amount, from.symbol, from.balance
            )));
        }

        // authoritative balances before any price math
        let wallet = self.reconciler.reconcile(wallet_id).await?;
        let from = rebind(&wallet, from).clone();
        let to = rebind(&wallet, to).clone();

        let from_price = self.prices.unit_price(&from.symbol, from.network).await?;
        let to_price = self.prices.unit_price(&to.symbol, to.network).await?;
        if to_price <= 0.0 || !to_price.is_finite() {
            return Err(SwapError::Provider {
                endpoint: "price".to_string(),
                message: format!("unusable price {} for {}", to_price, to.symbol),
            });
        }

        let rate = from_price / to_price;
        let to_amount = amount * rate;
        logger::debug(
            LogTag::Quote,
            &format!(
                "{} {} -> {} {} (rate {})",
                amount, from.symbol, to_amount, to.symbol, rate
            ),
        );

        Ok(Quote {
            rate,
            to_amount_text: format!("{:.6}", to_amount),
            from_token: from,
            to_token: to,
        })
    }
}

/// Parse an amount entered by the user. Non-negative finite decimals only.
pub fn parse_amount(text: &str) -> SwapResult<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(SwapError::Validation("amount is empty".to_string()));
    }
    let amount: f64 = trimmed
        .parse()
        .map_err(|_| SwapError::Validation(format!("amount '{}' is not a number", trimmed)))?;
    if !amount.is_finite() || amount < 0.0 {
        return Err(SwapError::Validation(format!(
            "amount '{}' is out of range",
            trimmed
        )));
    }
    Ok(amount)
}
