//! HTTP provider clients
//!
//! Three external services back the engine: the wallet backend (wallets,
//! token add, swap execution, price endpoints) and the pool-data provider.
//! Each client is a trait so the engine can be wired against mocks; the
//! HTTP implementations share the transport in this module.

pub mod backend;
pub mod market;
pub mod prices;

pub use backend::{HttpWalletBackend, SwapReceipt, SwapSubmission, WalletBackend};
pub use market::{HttpPoolDataProvider, PoolDataProvider, PoolInfo, TxnWindow};
pub use prices::{
    ExtendedInfo, HistoricalQuote, HttpPriceProvider, PriceProvider, TokenInfo,
};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;

use crate::errors::{SwapError, SwapResult};
use crate::logger::{self, LogTag};

const BODY_PREVIEW_CHARS: usize = 200;

// =============================================================================
// TRANSPORT
// =============================================================================

/// Shared request plumbing: one client with a connect/read timeout plus an
/// outer deadline on the whole call, so a stalled response body cannot hang
/// a refresh task.
pub(crate) struct ApiTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ApiTransport {
    pub fn new(timeout_secs: u64) -> SwapResult<Self> {
        let timeout = Duration::from_secs(timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SwapError::Http {
                endpoint: "client".to_string(),
                message: format!("failed to build http client: {}", e),
            })?;
        Ok(Self { client, timeout })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> SwapResult<T> {
        logger::debug(LogTag::Api, &format!("GET {}", url));
        let response = match timeout(self.timeout, self.client.get(url).send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return Err(SwapError::Http {
                    endpoint: url.to_string(),
                    message: e.to_string(),
                })
            }
            Err(_) => {
                return Err(SwapError::Timeout {
                    endpoint: url.to_string(),
                    seconds: self.timeout.as_secs(),
                })
            }
        };
        self.decode(url, response).await
    }

    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> SwapResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        logger::debug(LogTag::Api, &format!("POST {}", url));
        let request = self.client.post(url).json(body);
        let response = match timeout(self.timeout, request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return Err(SwapError::Http {
                    endpoint: url.to_string(),
                    message: e.to_string(),
                })
            }
            Err(_) => {
                return Err(SwapError::Timeout {
                    endpoint: url.to_string(),
                    seconds: self.timeout.as_secs(),
                })
            }
        };
        self.decode(url, response).await
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        url: &str,
        response: reqwest::Response,
    ) -> SwapResult<T> {
        let status = response.status();
        let body = response.text().await.map_err(|e| SwapError::Http {
            endpoint: url.to_string(),
            message: format!("failed to read response body: {}", e),
        })?;

        if !status.is_success() {
            logger::debug(
                LogTag::Api,
                &format!("HTTP {} from {}: {}", status.as_u16(), url, preview(&body)),
            );
            return Err(SwapError::Api {
                endpoint: url.to_string(),
                status: status.as_u16(),
                body: preview(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| SwapError::Parse {
            endpoint: url.to_string(),
            message: format!("{} (body: {})", e, preview(&body)),
        })
    }
}

/// Truncate a response body for error messages, char-safe
fn preview(body: &str) -> String {
    if body.chars().count() <= BODY_PREVIEW_CHARS {
        return body.to_string();
    }
    let truncated: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
    format!("{}...", truncated)
}

// =============================================================================
// BACKEND ENVELOPE
// =============================================================================

/// Standard wallet-backend response wrapper: `{ok, data, message?, error_code?}`
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub ok: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
}

impl<T> Envelope<T> {
    /// Unwrap `data` from an ok response; anything else is a provider failure
    pub fn into_data(self, endpoint: &str) -> SwapResult<T> {
        if self.ok {
            if let Some(data) = self.data {
                return Ok(data);
            }
        }
        Err(SwapError::Provider {
            endpoint: endpoint.to_string(),
            message: self
                .message
                .unwrap_or_else(|| "response carried ok=false or no data".to_string()),
        })
    }
}
