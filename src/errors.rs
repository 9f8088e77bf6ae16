//! Error types for the swap engine
//!
//! Split along the line the session logic cares about: validation errors
//! are terminal (surface immediately, never retry), transient errors are
//! swallowed by background refreshes (keep the last good value), backend
//! rejections carry the execution service's message and error code so the
//! session can translate them for the user.

use thiserror::Error;

use crate::types::Network;

pub type SwapResult<T> = Result<T, SwapError>;

#[derive(Error, Debug, Clone)]
pub enum SwapError {
    /// Local input validation failed (bad amount, insufficient balance)
    #[error("validation failed: {0}")]
    Validation(String),

    /// Contract address does not match the network's address syntax
    #[error("invalid {} token address: {address}", network.display_name())]
    InvalidAddress { network: Network, address: String },

    /// Token could not be resolved in the wallet or through the token-info
    /// provider
    #[error("token not found on {network}: {reference}")]
    TokenNotFound { network: Network, reference: String },

    /// Pool-data provider knows no pool for this token
    #[error("no pool found for {symbol} on {network}")]
    PoolNotFound { network: Network, symbol: String },

    /// Reconciliation could not find the active wallet in the backend's list
    #[error("wallet not found: {0}")]
    WalletNotFound(String),

    /// Network value with no provider mapping
    #[error("unsupported network: {0}")]
    UnsupportedNetwork(String),

    /// Transport-level failure (connect, TLS, client build)
    #[error("http error for {endpoint}: {message}")]
    Http { endpoint: String, message: String },

    /// Request exceeded the configured deadline
    #[error("request to {endpoint} timed out after {seconds}s")]
    Timeout { endpoint: String, seconds: u64 },

    /// Provider answered with a non-success HTTP status
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Provider answered 200 but the payload did not deserialize
    #[error("failed to parse response from {endpoint}: {message}")]
    Parse { endpoint: String, message: String },

    /// Provider answered a well-formed ok=false without rejecting the swap
    /// itself (wallet listing, token add, price lookups)
    #[error("{endpoint} reported failure: {message}")]
    Provider { endpoint: String, message: String },

    /// The execution service refused the swap
    #[error("swap rejected on {}: {message}", network.display_name())]
    Backend {
        network: Network,
        message: String,
        error_code: Option<String>,
    },
}

impl SwapError {
    /// Transient errors are swallowed by quote and info refreshes: the
    /// session keeps its last good value and waits for the next trigger.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SwapError::Http { .. }
                | SwapError::Timeout { .. }
                | SwapError::Api { .. }
                | SwapError::Parse { .. }
                | SwapError::Provider { .. }
        )
    }

    /// Local precondition failures, reported without any network call
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SwapError::Validation(_) | SwapError::InvalidAddress { .. }
        )
    }

    /// Message shown to the user when a swap attempt fails. Backend
    /// rejections are translated per network, everything else degrades to
    /// the generic retry text.
    pub fn swap_failure_message(&self, network: Network) -> String {
        match self {
            SwapError::Backend {
                network,
                message,
                error_code,
            } => backend_rejection_message(*network, message, error_code.as_deref()),
            _ => format!(
                "Failed to swap on {}. Please try again",
                network.display_name()
            ),
        }
    }
}

/// Map a raw execution-service rejection to the user-facing notice text.
/// Matched in order: the gas shortfall substring, the broadcast error code,
/// the internal-error marker, then the generic fallback.
pub fn backend_rejection_message(
    network: Network,
    message: &str,
    error_code: Option<&str>,
) -> String {
    let name = network.display_name();
    if message.contains("insufficient funds") {
        format!("Insufficient {} native token for gas fees", name)
    } else if error_code == Some("eth.broadcast.failed") {
        format!(
            "Failed to broadcast transaction on {}. Check your gas balance",
            name
        )
    } else if message.contains("INTERNAL_ERROR") {
        format!("Network error on {}. Please try again", name)
    } else {
        format!("Failed to swap on {}. Please try again", name)
    }
}
