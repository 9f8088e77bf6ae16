//! Swap session state machine
//!
//! `SwapEngine` is the top-level orchestrator: it owns the working
//! selection (tokens, amount, view), the active wallet snapshot, and the
//! injected services, and drives them at the right transitions. The
//! embedding UI calls the operation methods and renders `snapshot()`;
//! anything the user should be told flows out of the notice channel.
//!
//! Concurrency discipline: quote and market-info refreshes are debounced
//! on input inactivity, and every trigger bumps a generation counter. A
//! completion writes back only while its generation is still current, so
//! overlapping responses resolve last-issued-wins no matter the arrival
//! order. Double submission is prevented by the `Executing` view, not by
//! a lock.

pub mod notice;
pub mod state;

#[cfg(test)]
mod tests;

pub use notice::{notice_channel, Notice, NoticeLevel, NoticeSender};
pub use state::{SessionView, SwapSession};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

use crate::api::{PriceProvider, SwapSubmission, WalletBackend};
use crate::configs::Configs;
use crate::debounce::{Debouncer, Generation};
use crate::errors::SwapError;
use crate::fees::FeeEstimator;
use crate::logger::{self, LogTag};
use crate::market_data::MarketDataCache;
use crate::quote::{parse_amount, QuoteEngine};
use crate::resolver::{TokenRef, TokenResolver};
use crate::types::{Network, Token, Wallet};
use crate::wallets::{WalletReconciler, WalletRefresher};

const HISTORICAL_WINDOW_DAYS: i64 = 30;
const HISTORICAL_INTERVAL: &str = "1d";

/// Cheap-to-clone handle; all state lives behind the shared inner
#[derive(Clone)]
pub struct SwapEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    session: RwLock<SwapSession>,
    wallet: Arc<RwLock<Wallet>>,
    backend: Arc<dyn WalletBackend>,
    prices: Arc<dyn PriceProvider>,
    market: Arc<MarketDataCache>,
    resolver: TokenResolver,
    reconciler: Arc<WalletReconciler>,
    quotes: QuoteEngine,
    fees: FeeEstimator,
    refresher: Arc<WalletRefresher>,
    quote_debounce: Debouncer,
    info_debounce: Debouncer,
    quote_generation: Generation,
    info_generation: Generation,
    notices: NoticeSender,
    default_slippage_bps: u32,
    post_swap_refresh: Duration,
}

impl SwapEngine {
    /// Wire the engine for the given active wallet. Returns the engine and
    /// the notice stream the embedding layer should drain.
    pub fn new(
        configs: &Configs,
        wallet: Wallet,
        backend: Arc<dyn WalletBackend>,
        prices: Arc<dyn PriceProvider>,
        market: Arc<MarketDataCache>,
    ) -> (SwapEngine, mpsc::UnboundedReceiver<Notice>) {
        let (notices, notice_rx) = notice_channel();
        let wallet = Arc::new(RwLock::new(wallet));
        let reconciler = Arc::new(WalletReconciler::new(backend.clone()));
        let refresher = Arc::new(WalletRefresher::new(
            reconciler.clone(),
            wallet.clone(),
            Duration::from_secs(configs.swap.min_refresh_spacing_secs),
        ));
        let debounce = Duration::from_millis(configs.swap.debounce_ms);

        let inner = EngineInner {
            session: RwLock::new(SwapSession::new(configs.swap.default_slippage_bps)),
            wallet,
            backend: backend.clone(),
            prices: prices.clone(),
            market: market.clone(),
            resolver: TokenResolver::new(market, backend),
            reconciler: reconciler.clone(),
            quotes: QuoteEngine::new(prices.clone(), reconciler),
            fees: FeeEstimator::new(prices),
            refresher,
            quote_debounce: Debouncer::new(debounce),
            info_debounce: Debouncer::new(debounce),
            quote_generation: Generation::new(),
            info_generation: Generation::new(),
            notices,
            default_slippage_bps: configs.swap.default_slippage_bps,
            post_swap_refresh: Duration::from_secs(configs.swap.post_swap_refresh_secs),
        };
        (
            SwapEngine {
                inner: Arc::new(inner),
            },
            notice_rx,
        )
    }

    // =========================================================================
    // SNAPSHOTS & CANDIDATES
    // =========================================================================

    pub async fn snapshot(&self) -> SwapSession {
        self.inner.session.read().await.clone()
    }

    pub async fn active_wallet(&self) -> Wallet {
        self.inner.wallet.read().await.clone()
    }

    /// Tokens offered as a "from" side: only assets with a spendable balance
    pub async fn from_candidates(&self) -> Vec<Token> {
        self.inner
            .wallet
            .read()
            .await
            .tokens
            .iter()
            .filter(|t| t.balance > 0.0)
            .cloned()
            .collect()
    }

    /// Tokens offered as a "to" side: everything the wallet tracks
    pub async fn to_candidates(&self) -> Vec<Token> {
        self.inner.wallet.read().await.tokens.clone()
    }

    // =========================================================================
    // TOKEN SELECTION
    // =========================================================================

    pub async fn open_from_picker(&self) {
        let mut session = self.inner.session.write().await;
        if session.view == SessionView::Editing {
            session.view = SessionView::SelectingFrom;
        }
    }

    pub async fn open_to_picker(&self) {
        let mut session = self.inner.session.write().await;
        if session.view == SessionView::Editing {
            session.view = SessionView::SelectingTo;
        }
    }

    pub async fn cancel_picker(&self) {
        let mut session = self.inner.session.write().await;
        if matches!(
            session.view,
            SessionView::SelectingFrom | SessionView::SelectingTo
        ) {
            session.view = SessionView::Editing;
        }
    }

    /// Set the "from" side. Choosing the asset currently on the "to" side
    /// clears that side and its derived market data.
    pub async fn select_from_token(&self, token: Token) {
        let requote = {
            let mut session = self.inner.session.write().await;
            if session
                .to_token
                .as_ref()
                .map(|t| t.is_same_asset(&token))
                .unwrap_or(false)
            {
                session.clear_to_side();
            }
            logger::info(
                LogTag::Session,
                &format!("From token set to {}", token.symbol),
            );
            session.from_token = Some(token);
            session.view = SessionView::Editing;
            !session.from_amount_text.is_empty()
        };
        if requote {
            self.schedule_quote();
        }
    }

    /// Set the "to" side. A token the wallet does not hold yet is first
    /// registered with the backend (idempotent), then the snapshot is
    /// refreshed so it shows up in candidate lists.
    pub async fn select_to_token(&self, token: Token) {
        let needs_add = {
            let wallet = self.inner.wallet.read().await;
            !wallet.has_token(&token.key())
        };

        if needs_add {
            if let Some(contract) = token.contract.clone() {
                let wallet = self.inner.wallet.read().await.clone();
                if let Err(e) = self.inner.backend.add_token(&wallet, &contract).await {
                    logger::warning(
                        LogTag::Session,
                        &format!("Token add failed for {}: {}", contract, e),
                    );
                    self.inner
                        .notices
                        .push(Notice::error("Failed to process token"));
                    let mut session = self.inner.session.write().await;
                    session.clear_to_side();
                    session.view = SessionView::Editing;
                    return;
                }
                // pick up the backend's entry for the new token
                match self.inner.reconciler.reconcile(&wallet.id).await {
                    Ok(fresh) => *self.inner.wallet.write().await = fresh,
                    Err(e) => logger::warning(
                        LogTag::Session,
                        &format!("Post-add wallet refresh failed: {}", e),
                    ),
                }
            }
        }

        let requote = {
            let mut session = self.inner.session.write().await;
            if session
                .from_token
                .as_ref()
                .map(|t| t.is_same_asset(&token))
                .unwrap_or(false)
            {
                session.from_token = None;
            }
            logger::info(
                LogTag::Session,
                &format!("To token set to {}", token.symbol),
            );
            session.extended_info = None;
            session.historical.clear();
            session.to_token = Some(token.clone());
            session.view = SessionView::Editing;
            !session.from_amount_text.is_empty()
        };

        self.schedule_info_refresh(token);
        if requote {
            self.schedule_quote();
        }
    }

    /// Exchange the two sides atomically in one state write, then refresh
    /// market data for the token that just became the "to" side
    pub async fn flip_sides(&self) {
        let new_to = {
            let mut session = self.inner.session.write().await;
            if session.view != SessionView::Editing {
                return;
            }
            let state = &mut *session;
            std::mem::swap(&mut state.from_token, &mut state.to_token);
            std::mem::swap(&mut state.from_amount_text, &mut state.to_amount_text);
            logger::info(LogTag::Session, "Sides flipped");
            session.to_token.clone()
        };
        if let Some(token) = new_to {
            self.schedule_info_refresh(token);
        }
    }

    // =========================================================================
    // AMOUNT ENTRY
    // =========================================================================

    /// Update the "from" amount as the user types. An amount above the held
    /// balance gets a warning immediately; the quote itself is debounced.
    pub async fn set_from_amount(&self, text: &str) {
        let schedule = {
            let mut session = self.inner.session.write().await;
            if session.view != SessionView::Editing {
                return;
            }
            session.from_amount_text = text.trim().to_string();

            if let (Ok(amount), Some(from)) = (parse_amount(text), session.from_token.as_ref())
            {
                if amount > from.balance {
                    self.inner.notices.push(Notice::warning("Insufficient funds"));
                }
            }

            if session.from_amount_text.is_empty() {
                session.rate = 0.0;
                session.to_amount_text.clear();
                session.is_loading = false;
                false
            } else {
                session.is_loading = true;
                true
            }
        };

        if schedule {
            self.schedule_quote();
        } else {
            // nothing pending may write back a rate for the cleared input
            self.inner.quote_generation.invalidate();
            self.inner.quote_debounce.cancel();
        }
    }

    /// Fill the amount with the full "from" balance
    pub async fn use_max_balance(&self) {
        let balance = {
            let session = self.inner.session.read().await;
            if session.view != SessionView::Editing {
                return;
            }
            session.from_token.as_ref().map(|t| t.balance)
        };
        if let Some(balance) = balance {
            self.set_from_amount(&balance.to_string()).await;
        }
    }

    pub async fn set_slippage_bps(&self, slippage_bps: u32) {
        self.inner.session.write().await.slippage_bps = slippage_bps;
    }

    // =========================================================================
    // CONFIRMATION & EXECUTION
    // =========================================================================

    /// Move to the confirmation view. Reconciles the wallet first and
    /// re-checks the amount against the authoritative balance; any
    /// violation keeps the user in `Editing` with the session intact.
    pub async fn begin_confirm(&self) {
        let (from, to, amount_text) = {
            let session = self.inner.session.read().await;
            if session.view != SessionView::Editing {
                return;
            }
            match (session.from_token.clone(), session.to_token.clone()) {
                (Some(from), Some(to)) if !session.from_amount_text.is_empty() => {
                    (from, to, session.from_amount_text.clone())
                }
                _ => {
                    self.inner
                        .notices
                        .push(Notice::error("Missing required data for swap"));
                    return;
                }
            }
        };
        self.inner.session.write().await.is_loading = true;

        let wallet_id = self.inner.wallet.read().await.id.clone();
        let fresh = match self.inner.reconciler.reconcile(&wallet_id).await {
            Ok(fresh) => fresh,
            Err(SwapError::WalletNotFound(_)) => {
                self.inner.notices.push(Notice::error("Wallet not found"));
                self.inner.session.write().await.is_loading = false;
                return;
            }
            Err(e) => {
                logger::warning(
                    LogTag::Session,
                    &format!("Reconciliation failed before confirm: {}", e),
                );
                self.inner.session.write().await.is_loading = false;
                return;
            }
        };
        *self.inner.wallet.write().await = fresh.clone();

        let (from, to) = match (
            fresh.find_token(&from.key()).cloned(),
            fresh.find_token(&to.key()).cloned(),
        ) {
            (Some(from), Some(to)) => (from, to),
            _ => {
                self.inner.notices.push(Notice::error("Token data not found"));
                self.inner.session.write().await.is_loading = false;
                return;
            }
        };

        // balance-sensitive check against the reconciled state, never the
        // copy captured when the window opened
        match parse_amount(&amount_text) {
            Ok(amount) if amount <= from.balance => {}
            Ok(_) => {
                self.inner.notices.push(Notice::error("Insufficient funds"));
                self.inner.session.write().await.is_loading = false;
                return;
            }
            Err(_) => {
                self.inner.notices.push(Notice::error("Invalid amount"));
                self.inner.session.write().await.is_loading = false;
                return;
            }
        }

        let fee = self.inner.fees.estimate(from.network).await;

        let mut session = self.inner.session.write().await;
        session.from_token = Some(from);
        session.to_token = Some(to);
        session.estimated_fee = fee;
        session.view = SessionView::Confirming;
        session.is_loading = false;
        logger::info(LogTag::Session, "Entering confirmation");
    }

    pub async fn cancel_confirm(&self) {
        let mut session = self.inner.session.write().await;
        if session.view == SessionView::Confirming {
            session.view = SessionView::Editing;
        }
    }

    /// Submit the swap. Only valid from `Confirming`; while `Executing` the
    /// call is ignored, which is what makes double-taps harmless. Success
    /// resets the session and arms the delayed wallet refresh; failure
    /// returns to `Confirming` with the selection preserved for a retry.
    pub async fn confirm(&self) {
        let network = self.inner.wallet.read().await.network;
        let submission = {
            let mut session = self.inner.session.write().await;
            if session.view != SessionView::Confirming {
                return;
            }
            let (from, to) = match (session.from_token.as_ref(), session.to_token.as_ref()) {
                (Some(from), Some(to)) => (from, to),
                _ => {
                    self.inner
                        .notices
                        .push(Notice::error("Missing required data for swap"));
                    return;
                }
            };
            let amount = match parse_amount(&session.from_amount_text) {
                Ok(amount) => amount,
                Err(_) => {
                    self.inner.notices.push(Notice::error("Invalid amount"));
                    return;
                }
            };
            if amount > from.balance {
                self.inner.notices.push(Notice::error("Insufficient funds"));
                return;
            }
            let submission = SwapSubmission {
                wallet_id: from.wallet_id.clone(),
                from_token_id: from.id.clone(),
                to_token_id: to.id.clone(),
                amount: round_to_9_dp(amount),
                slippage_bps: session.slippage_bps,
            };
            session.view = SessionView::Executing;
            session.is_loading = true;
            submission
        };

        logger::info(
            LogTag::Session,
            &format!(
                "Executing swap {} -> {} on {}",
                submission.from_token_id,
                submission.to_token_id,
                network.as_str()
            ),
        );

        match self.inner.backend.submit_swap(network, &submission).await {
            Ok(receipt) => {
                self.inner.notices.push(Notice::success("Swap successful"));
                logger::info(
                    LogTag::Session,
                    &format!("Swap accepted, tx_ref={}", receipt.tx_ref),
                );
                self.reset_session().await;
                // settlement is asynchronous; refresh once it had time to land
                self.inner
                    .refresher
                    .schedule_after(self.inner.post_swap_refresh);
            }
            Err(e) => {
                self.inner
                    .notices
                    .push(Notice::error(e.swap_failure_message(network)));
                let mut session = self.inner.session.write().await;
                session.view = SessionView::Confirming;
                session.is_loading = false;
            }
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Close the swap UI from any state: unconditional reset to an empty
    /// `Editing` session. In-flight lookups are invalidated, not awaited.
    pub async fn close(&self) {
        self.reset_session().await;
        logger::info(LogTag::Session, "Session closed");
    }

    /// Deep-link entry: resolve both sides against the active wallet and
    /// preload market data for the "to" side
    pub async fn open_with_pair(&self, network: Network, from_ref: &str, to_ref: &str) {
        self.inner.session.write().await.is_loading = true;
        let wallet = self.inner.wallet.read().await.clone();
        let from = TokenRef::parse(network, from_ref);
        let to = TokenRef::parse(network, to_ref);

        match self.inner.resolver.resolve_pair(&from, &to, &wallet).await {
            Ok((from_token, to_token)) => {
                {
                    let mut session = self.inner.session.write().await;
                    session.from_token = Some(from_token);
                    session.to_token = Some(to_token.clone());
                    session.is_loading = false;
                }
                self.schedule_info_refresh(to_token);
            }
            Err(e) => {
                logger::warning(LogTag::Session, &format!("Pair resolution failed: {}", e));
                self.inner.notices.push(Notice::error("Failed to load tokens"));
                self.inner.session.write().await.is_loading = false;
            }
        }
    }

    async fn reset_session(&self) {
        self.inner.quote_debounce.cancel();
        self.inner.info_debounce.cancel();
        self.inner.quote_generation.invalidate();
        self.inner.info_generation.invalidate();
        self.inner
            .session
            .write()
            .await
            .reset(self.inner.default_slippage_bps);
    }

    // =========================================================================
    // DEBOUNCED REFRESHES
    // =========================================================================

    fn schedule_quote(&self) {
        let generation = self.inner.quote_generation.next();
        let engine = self.clone();
        self.inner.quote_debounce.call(async move {
            engine.run_quote(generation).await;
        });
    }

    async fn run_quote(&self, generation: u64) {
        let (from, to, amount_text) = {
            let session = self.inner.session.read().await;
            (
                session.from_token.clone(),
                session.to_token.clone(),
                session.from_amount_text.clone(),
            )
        };
        let (from, to) = match (from, to) {
            (Some(from), Some(to)) => (from, to),
            _ => {
                let mut session = self.inner.session.write().await;
                if self.inner.quote_generation.is_current(generation) {
                    session.is_loading = false;
                }
                return;
            }
        };

        let wallet_id = self.inner.wallet.read().await.id.clone();
        let result = self
            .inner
            .quotes
            .quote(&wallet_id, &from, &to, &amount_text)
            .await;

        let mut session = self.inner.session.write().await;
        if !self.inner.quote_generation.is_current(generation) {
            logger::debug(
                LogTag::Quote,
                &format!("Discarding superseded quote (generation {})", generation),
            );
            return;
        }
        match result {
            Ok(quote) => {
                session.rate = quote.rate;
                session.to_amount_text = quote.to_amount_text;
                session.from_token = Some(quote.from_token);
                session.to_token = Some(quote.to_token);
                session.is_loading = false;
            }
            Err(e) => {
                // stale over broken: keep the last good rate, just stop spinning
                logger::debug(LogTag::Quote, &format!("Quote degraded quietly: {}", e));
                session.is_loading = false;
            }
        }
    }

    fn schedule_info_refresh(&self, token: Token) {
        let generation = self.inner.info_generation.next();
        let engine = self.clone();
        self.inner.info_debounce.call(async move {
            engine.run_info_refresh(generation, token).await;
        });
    }

    async fn run_info_refresh(&self, generation: u64, token: Token) {
        {
            let mut session = self.inner.session.write().await;
            if !self.inner.info_generation.is_current(generation) {
                return;
            }
            session.is_info_loading = true;
        }

        let extended = self.inner.market.get_extended_info(&token).await;
        let historical = self
            .inner
            .prices
            .historical_quotes(&token, HISTORICAL_WINDOW_DAYS, HISTORICAL_INTERVAL)
            .await;

        let mut session = self.inner.session.write().await;
        if !self.inner.info_generation.is_current(generation) {
            return;
        }
        session.is_info_loading = false;
        match extended {
            Ok(Some(info)) => session.extended_info = Some(info),
            Ok(None) => {}
            Err(e) => {
                logger::debug(
                    LogTag::Market,
                    &format!("Extended info degraded quietly: {}", e),
                );
            }
        }
        match historical {
            Ok(quotes) => session.historical = quotes,
            Err(_) => session.historical.clear(),
        }
    }
}

/// The execution service expects at most 9 decimal places on the amount
fn round_to_9_dp(amount: f64) -> f64 {
    (amount * 1e9).round() / 1e9
}
