//! Wallet backend client
//!
//! Covers the three custodial operations the engine needs: listing wallets
//! with fresh balances, tracking a new token in a wallet, and submitting a
//! swap to the execution service. Swap rejections come back as ok=false
//! bodies (sometimes on 4xx statuses) carrying `message` and `error_code`;
//! both shapes map to `SwapError::Backend`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ApiTransport, Envelope};
use crate::configs::Configs;
use crate::errors::{SwapError, SwapResult};
use crate::logger::{self, LogTag};
use crate::types::{Network, Wallet};

// =============================================================================
// TRAIT & WIRE TYPES
// =============================================================================

#[async_trait]
pub trait WalletBackend: Send + Sync {
    /// Fetch the full wallet list with current balances
    async fn get_wallets(&self) -> SwapResult<Vec<Wallet>>;

    /// Start tracking `contract` in the given wallet
    async fn add_token(&self, wallet: &Wallet, contract: &str) -> SwapResult<()>;

    /// Submit a swap for execution
    async fn submit_swap(
        &self,
        network: Network,
        submission: &SwapSubmission,
    ) -> SwapResult<SwapReceipt>;
}

/// Swap order as the execution service expects it. The amount is already
/// rounded to 9 decimals by the session before it gets here.
#[derive(Debug, Clone, Serialize)]
pub struct SwapSubmission {
    pub wallet_id: String,
    pub from_token_id: String,
    pub to_token_id: String,
    pub amount: f64,
    // the execution service expects this one field in camelCase
    #[serde(rename = "slippageBps")]
    pub slippage_bps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapReceipt {
    #[serde(default)]
    pub tx_ref: String,
}

// =============================================================================
// HTTP IMPLEMENTATION
// =============================================================================

pub struct HttpWalletBackend {
    transport: ApiTransport,
    base_url: String,
}

impl HttpWalletBackend {
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

#[derive(Debug, Serialize)]
struct AddTokenBody<'a> {
    wallet_address: &'a str,
    network: &'a str,
    contract: &'a str,
}

/// Flat response of POST /swap; unlike the listing endpoints it has no
/// `data` wrapper
#[derive(Debug, Deserialize)]
struct SwapResponse {
    ok: bool,
    #[serde(default)]
    tx_ref: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
}

#[async_trait]
impl WalletBackend for HttpWalletBackend {
    async fn get_wallets(&self) -> SwapResult<Vec<Wallet>> {
        let url = format!("{}/wallets", self.base_url);
        let envelope: Envelope<Vec<Wallet>> = self.transport.get_json(&url).await?;
        let wallets = envelope.into_data(&url)?;
        logger::debug(
            LogTag::Wallet,
            &format!("Fetched {} wallets from backend", wallets.len()),
        );
        Ok(wallets)
    }

    async fn add_token(&self, wallet: &Wallet, contract: &str) -> SwapResult<()> {
        let url = format!("{}/wallets/{}/tokens", self.base_url, wallet.id);
        let body = AddTokenBody {
            wallet_address: &wallet.address,
            network: wallet.network.as_str(),
            contract,
        };
        let envelope: Envelope<serde_json::Value> =
            self.transport.post_json(&url, &body).await?;
        if envelope.ok {
            logger::info(
                LogTag::Wallet,
                &format!(
                    "Token {} now tracked in wallet {} ({})",
                    contract,
                    wallet.id,
                    wallet.network.as_str()
                ),
            );
            Ok(())
        } else {
            Err(SwapError::TokenNotFound {
                network: wallet.network,
                reference: contract.to_string(),
            })
        }
    }

    async fn submit_swap(
        &self,
        network: Network,
        submission: &SwapSubmission,
    ) -> SwapResult<SwapReceipt> {
        let url = format!("{}/swap", self.base_url);
        logger::info(
            LogTag::Api,
            &format!(
                "Submitting swap: wallet={} from={} to={} amount={} slippage_bps={}",
                submission.wallet_id,
                submission.from_token_id,
                submission.to_token_id,
                submission.amount,
                submission.slippage_bps
            ),
        );

        let response: SwapResponse = match self.transport.post_json(&url, submission).await {
            Ok(response) => response,
            // rejections may arrive as 4xx with the same JSON body
            Err(SwapError::Api {
                endpoint,
                status,
                body,
            }) => match serde_json::from_str::<SwapResponse>(&body) {
                Ok(response) => response,
                Err(_) => {
                    return Err(SwapError::Api {
                        endpoint,
                        status,
                        body,
                    })
                }
            },
            Err(e) => return Err(e),
        };

        if response.ok {
            let receipt = SwapReceipt {
                tx_ref: response.tx_ref.unwrap_or_default(),
            };
            logger::info(
                LogTag::Api,
                &format!("Swap accepted, tx_ref={}", receipt.tx_ref),
            );
            Ok(receipt)
        } else {
            let message = response
                .message
                .unwrap_or_else(|| "swap rejected".to_string());
            logger::warning(
                LogTag::Api,
                &format!(
                    "Swap rejected on {}: {} (code={:?})",
                    network.as_str(),
                    message,
                    response.error_code
                ),
            );
            Err(SwapError::Backend {
                network,
                message,
                error_code: response.error_code,
            })
        }
    }
}
