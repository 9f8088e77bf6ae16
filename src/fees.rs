//! Fee estimation
//!
//! The fee shown on the confirmation screen is a fixed per-network
//! heuristic, not a live gas quote: the execution service prices the real
//! transaction when it builds it. Only the USD conversion needs a network
//! call, and a failed native-price lookup degrades to `fee_usd = 0` while
//! the native-unit fee stays populated.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::PriceProvider;
use crate::logger::{self, LogTag};
use crate::types::Network;

/// Estimated swap fee in native units plus its USD value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeEstimate {
    pub fee: f64,
    pub fee_usd: f64,
}

pub struct FeeEstimator {
    prices: Arc<dyn PriceProvider>,
}

impl FeeEstimator {
    pub fn new(prices: Arc<dyn PriceProvider>) -> Self {
        Self { prices }
    }

    /// Estimate the fee for a swap on `network`. Infallible: the constant
    /// part always resolves, and the USD part falls back to zero.
    pub async fn estimate(&self, network: Network) -> FeeEstimate {
        let fee = network.base_fee();
        let native = network.native_symbol();

        let fee_usd = match self.prices.unit_price(native, network).await {
            Ok(price) => fee * price,
            Err(e) => {
                logger::warning(
                    LogTag::Fees,
                    &format!(
                        "Native price lookup failed for {} ({}), reporting fee without USD value",
                        native, e
                    ),
                );
                0.0
            }
        };

        logger::debug(
            LogTag::Fees,
            &format!(
                "Estimated fee on {}: {} {} (${:.2})",
                network.as_str(),
                fee,
                native,
                fee_usd
            ),
        );
        FeeEstimate { fee, fee_usd }
    }
}
