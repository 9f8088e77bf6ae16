//! Wallet reconciliation and the delayed refresh scheduler
//!
//! Reconciliation exists to defeat staleness: it always does a full wallet
//! fetch from the backend, never a cache read, because the caller is about
//! to make a balance-sensitive decision. Callers holding `Token` values
//! must rebind them against the returned wallet by structural key - the
//! backend's `id` field is not stable for tokens added client-side.
//!
//! The refresher owns the post-swap delayed update: settlement on the
//! backend is asynchronous, so a successful submission arms a timer (~50 s)
//! that re-fetches the wallet once the balances have had time to move.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::api::WalletBackend;
use crate::errors::{SwapError, SwapResult};
use crate::logger::{self, LogTag};
use crate::types::{Token, Wallet};

// =============================================================================
// RECONCILIATION
// =============================================================================

pub struct WalletReconciler {
    backend: Arc<dyn WalletBackend>,
}

impl WalletReconciler {
    pub fn new(backend: Arc<dyn WalletBackend>) -> Self {
        Self { backend }
    }

    /// Fetch the authoritative wallet state. Always a full backend call.
    pub async fn reconcile(&self, wallet_id: &str) -> SwapResult<Wallet> {
        let wallets = self.backend.get_wallets().await?;
        let wallet = wallets
            .into_iter()
            .find(|w| w.id == wallet_id)
            .ok_or_else(|| SwapError::WalletNotFound(wallet_id.to_string()))?;
        logger::debug(
            LogTag::Wallet,
            &format!(
                "Reconciled wallet {} ({} tokens)",
                wallet.id,
                wallet.tokens.len()
            ),
        );
        Ok(wallet)
    }
}

/// Rebind a held token to its entry in a freshly reconciled wallet. Falls
/// back to the held copy when the wallet no longer lists the asset (the
/// caller decides whether that is an error).
pub fn rebind<'a>(wallet: &'a Wallet, token: &'a Token) -> &'a Token {
    wallet.find_token(&token.key()).unwrap_or(token)
}

// =============================================================================
// DELAYED REFRESH
// =============================================================================

/// Keeps the shared active-wallet snapshot current. Refreshes are spaced at
/// least `min_spacing` apart and never overlap; the delayed variant is a
/// resettable timer, so re-arming cancels the previous schedule.
pub struct WalletRefresher {
    reconciler: Arc<WalletReconciler>,
    wallet: Arc<RwLock<Wallet>>,
    min_spacing: Duration,
    last_refresh: Mutex<Option<Instant>>,
    refreshing: AtomicBool,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl WalletRefresher {
    pub fn new(
        reconciler: Arc<WalletReconciler>,
        wallet: Arc<RwLock<Wallet>>,
        min_spacing: Duration,
    ) -> Self {
        Self {
            reconciler,
            wallet,
            min_spacing,
            last_refresh: Mutex::new(None),
            refreshing: AtomicBool::new(false),
            pending: Mutex::new(None),
        }
    }

    /// Refresh the snapshot now, unless one is already running or the last
    /// one was too recent. Failures are logged and swallowed: the snapshot
    /// keeps its last good state.
    pub async fn refresh_now(&self) {
        if self.refreshing.swap(true, Ordering::SeqCst) {
            return;
        }

        let due = {
            let last = self.last_refresh.lock().unwrap_or_else(|p| p.into_inner());
            match *last {
                Some(at) => at.elapsed() >= self.min_spacing,
                None => true,
            }
        };

        if due {
            let wallet_id = self.wallet.read().await.id.clone();
            match self.reconciler.reconcile(&wallet_id).await {
                Ok(fresh) => {
                    *self.wallet.write().await = fresh;
                    let mut last =
                        self.last_refresh.lock().unwrap_or_else(|p| p.into_inner());
                    *last = Some(Instant::now());
                    logger::debug(LogTag::Wallet, "Wallet snapshot refreshed");
                }
                Err(e) => {
                    logger::warning(
                        LogTag::Wallet,
                        &format!("Wallet refresh failed, keeping snapshot: {}", e),
                    );
                }
            }
        }

        self.refreshing.store(false, Ordering::SeqCst);
    }

    /// Arm a one-shot refresh after `delay`, replacing any pending one
    pub fn schedule_after(self: &Arc<Self>, delay: Duration) {
        let refresher = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            refresher.refresh_now().await;
        });
        let previous = {
            let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
            pending.replace(handle)
        };
        if let Some(previous) = previous {
            previous.abort();
        }
        logger::debug(
            LogTag::Wallet,
            &format!("Wallet refresh scheduled in {}s", delay.as_secs()),
        );
    }

    /// Drop a pending delayed refresh without running it
    pub fn cancel_pending(&self) {
        let previous = {
            let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
            pending.take()
        };
        if let Some(previous) = previous {
            previous.abort();
        }
    }
}

impl Drop for WalletRefresher {
    fn drop(&mut self) {
        let previous = {
            let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
            pending.take()
        };
        if let Some(previous) = previous {
            previous.abort();
        }
    }
}
