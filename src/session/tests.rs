//! End-to-end state machine suite: a mock backend and mock providers with
//! call counters, driven through the public engine operations. Timer-heavy
//! scenarios run under a paused clock.

use super::*;
use crate::api::{
    ExtendedInfo, HistoricalQuote, PoolDataProvider, PoolInfo, SwapReceipt, TokenInfo,
};
use crate::configs::{CacheConfigs, Configs};
use crate::errors::SwapResult;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

const USDT: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";
const PEPE: &str = "0x6982508145454ce325ddbe47a25d4ec3d2311933";

fn token(symbol: &str, contract: Option<&str>, balance: f64) -> Token {
    Token {
        id: contract.unwrap_or(symbol).to_string(),
        wallet_id: "w1".to_string(),
        network: Network::Eth,
        symbol: symbol.to_string(),
        name: symbol.to_string(),
        contract: contract.map(|c| c.to_string()),
        balance,
        balance_usd: balance,
        price: 1.0,
        price_change_percentage: 0.0,
        icon: String::new(),
        added_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn test_wallet(eth_balance: f64) -> Wallet {
    Wallet {
        id: "w1".to_string(),
        network: Network::Eth,
        address: "0x0".to_string(),
        tokens: vec![
            token("ETH", None, eth_balance),
            token("USDT", Some(USDT), 50.0),
        ],
    }
}

// =============================================================================
// MOCKS
// =============================================================================

struct TestBackend {
    wallets: Mutex<Vec<Wallet>>,
    get_calls: AtomicUsize,
    add_calls: AtomicUsize,
    swap_calls: AtomicUsize,
    swap_delay_ms: AtomicU64,
    swap_error: Mutex<Option<SwapError>>,
    last_amount: Mutex<Option<f64>>,
}

impl TestBackend {
    fn with(wallet: Wallet) -> Self {
        Self {
            wallets: Mutex::new(vec![wallet]),
            get_calls: AtomicUsize::new(0),
            add_calls: AtomicUsize::new(0),
            swap_calls: AtomicUsize::new(0),
            swap_delay_ms: AtomicU64::new(0),
            swap_error: Mutex::new(None),
            last_amount: Mutex::new(None),
        }
    }

    fn set_balance(&self, symbol: &str, balance: f64) {
        let mut wallets = self.wallets.lock().unwrap();
        for wallet in wallets.iter_mut() {
            for token in wallet.tokens.iter_mut() {
                if token.symbol == symbol {
                    token.balance = balance;
                }
            }
        }
    }
}

#[async_trait]
impl WalletBackend for TestBackend {
    async fn get_wallets(&self) -> SwapResult<Vec<Wallet>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.wallets.lock().unwrap().clone())
    }

    async fn add_token(&self, wallet: &Wallet, contract: &str) -> SwapResult<()> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        let mut wallets = self.wallets.lock().unwrap();
        for entry in wallets.iter_mut() {
            if entry.id == wallet.id && !entry.tokens.iter().any(|t| t.contract.as_deref() == Some(contract)) {
                entry.tokens.push(token("PEPE", Some(contract), 0.0));
            }
        }
        Ok(())
    }

    async fn submit_swap(
        &self,
        _network: Network,
        submission: &SwapSubmission,
    ) -> SwapResult<SwapReceipt> {
        let delay = self.swap_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.swap_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_amount.lock().unwrap() = Some(submission.amount);
        if let Some(error) = self.swap_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(SwapReceipt {
            tx_ref: "0xabc".to_string(),
        })
    }
}

struct TestPrices {
    prices: Mutex<HashMap<String, f64>>,
    delay_ms: AtomicU64,
    fail: Mutex<bool>,
    price_calls: AtomicUsize,
    extended_calls: AtomicUsize,
}

impl TestPrices {
    fn new() -> Self {
        let mut prices = HashMap::new();
        prices.insert("ETH".to_string(), 2000.0);
        prices.insert("USDT".to_string(), 1.0);
        prices.insert("PEPE".to_string(), 0.0001);
        Self {
            prices: Mutex::new(prices),
            delay_ms: AtomicU64::new(0),
            fail: Mutex::new(false),
            price_calls: AtomicUsize::new(0),
            extended_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl crate::api::PriceProvider for TestPrices {
    async fn unit_price(&self, symbol: &str, _network: Network) -> SwapResult<f64> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail.lock().unwrap() {
            return Err(SwapError::Timeout {
                endpoint: "price".to_string(),
                seconds: 10,
            });
        }
        self.prices
            .lock()
            .unwrap()
            .get(symbol)
            .copied()
            .ok_or_else(|| SwapError::Provider {
                endpoint: "price".to_string(),
                message: format!("no price for {}", symbol),
            })
    }

    async fn token_info(
        &self,
        _network: Network,
        contract: &str,
    ) -> SwapResult<Option<TokenInfo>> {
        if contract.eq_ignore_ascii_case(PEPE) {
            return Ok(Some(TokenInfo {
                contract: PEPE.to_string(),
                symbol: "PEPE".to_string(),
                name: "Pepe".to_string(),
                price: 0.0001,
                price_change_percentage: 0.0,
                icon: String::new(),
            }));
        }
        Ok(None)
    }

    async fn extended_info(&self, _token: &Token) -> SwapResult<Option<ExtendedInfo>> {
        self.extended_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(ExtendedInfo {
            price: 1.0,
            percent_change_24h: 2.5,
            market_cap: Some(1_000_000.0),
            volume_24h: None,
            total_supply: None,
            max_supply: None,
        }))
    }

    async fn historical_quotes(
        &self,
        _token: &Token,
        _window_days: i64,
        _interval: &str,
    ) -> SwapResult<Vec<HistoricalQuote>> {
        Ok(vec![HistoricalQuote {
            timestamp: Utc::now(),
            price: 1.0,
        }])
    }
}

struct NoPools;

#[async_trait]
impl PoolDataProvider for NoPools {
    async fn pools_for_token(
        &self,
        _network: Network,
        _contract: &str,
    ) -> SwapResult<Vec<PoolInfo>> {
        Ok(Vec::new())
    }

    async fn pool_by_address(
        &self,
        _network: Network,
        _address: &str,
    ) -> SwapResult<Option<PoolInfo>> {
        Ok(None)
    }
}

// =============================================================================
// FIXTURE
// =============================================================================

struct Fixture {
    engine: SwapEngine,
    notices: mpsc::UnboundedReceiver<Notice>,
    backend: Arc<TestBackend>,
    prices: Arc<TestPrices>,
}

impl Fixture {
    fn new(wallet: Wallet) -> Self {
        let configs = Configs::default();
        let backend = Arc::new(TestBackend::with(wallet.clone()));
        let prices = Arc::new(TestPrices::new());
        let market = Arc::new(MarketDataCache::new(
            Arc::new(NoPools),
            prices.clone(),
            CacheConfigs::default(),
        ));
        let (engine, notices) = SwapEngine::new(
            &configs,
            wallet,
            backend.clone(),
            prices.clone(),
            market,
        );
        Self {
            engine,
            notices,
            backend,
            prices,
        }
    }

    fn drain_notices(&mut self) -> Vec<Notice> {
        let mut drained = Vec::new();
        while let Ok(notice) = self.notices.try_recv() {
            drained.push(notice);
        }
        drained
    }

    async fn settle(&self) {
        // debounce window plus headroom
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}

fn eth() -> Token {
    token("ETH", None, 2.0)
}

fn usdt() -> Token {
    token("USDT", Some(USDT), 50.0)
}

// =============================================================================
// SELECTION RULES
// =============================================================================

#[tokio::test(start_paused = true)]
async fn selecting_from_then_to_keeps_both_sides() {
    let fx = Fixture::new(test_wallet(2.0));
    fx.engine.select_from_token(eth()).await;
    fx.engine.select_to_token(usdt()).await;
    fx.settle().await;

    let session = fx.engine.snapshot().await;
    assert_eq!(session.from_token.as_ref().map(|t| t.symbol.as_str()), Some("ETH"));
    assert_eq!(session.to_token.as_ref().map(|t| t.symbol.as_str()), Some("USDT"));
    assert_eq!(session.view, SessionView::Editing);
}

#[tokio::test(start_paused = true)]
async fn selecting_the_from_asset_as_to_clears_from() {
    let fx = Fixture::new(test_wallet(2.0));
    fx.engine.select_from_token(eth()).await;
    fx.engine.select_to_token(usdt()).await;
    fx.settle().await;

    // ETH is currently "from"; choosing it as "to" must vacate "from"
    fx.engine.select_to_token(eth()).await;
    fx.settle().await;

    let session = fx.engine.snapshot().await;
    assert!(session.from_token.is_none());
    assert_eq!(session.to_token.as_ref().map(|t| t.symbol.as_str()), Some("ETH"));
}

#[tokio::test(start_paused = true)]
async fn selecting_the_to_asset_as_from_clears_to_and_its_info() {
    let fx = Fixture::new(test_wallet(2.0));
    fx.engine.select_from_token(eth()).await;
    fx.engine.select_to_token(usdt()).await;
    fx.settle().await;
    assert!(fx.engine.snapshot().await.extended_info.is_some());

    fx.engine.select_from_token(usdt()).await;

    let session = fx.engine.snapshot().await;
    assert_eq!(session.from_token.as_ref().map(|t| t.symbol.as_str()), Some("USDT"));
    assert!(session.to_token.is_none());
    assert!(session.extended_info.is_none());
    assert!(session.historical.is_empty());
}

#[tokio::test(start_paused = true)]
async fn picker_views_round_trip() {
    let fx = Fixture::new(test_wallet(2.0));
    fx.engine.open_from_picker().await;
    assert_eq!(fx.engine.snapshot().await.view, SessionView::SelectingFrom);
    fx.engine.cancel_picker().await;
    assert_eq!(fx.engine.snapshot().await.view, SessionView::Editing);

    fx.engine.open_to_picker().await;
    assert_eq!(fx.engine.snapshot().await.view, SessionView::SelectingTo);
    fx.engine.select_to_token(usdt()).await;
    assert_eq!(fx.engine.snapshot().await.view, SessionView::Editing);
}

#[tokio::test(start_paused = true)]
async fn unknown_to_token_is_registered_with_the_backend() {
    let fx = Fixture::new(test_wallet(2.0));
    fx.engine.select_to_token(token("PEPE", Some(PEPE), 0.0)).await;
    fx.settle().await;

    assert_eq!(fx.backend.add_calls.load(Ordering::SeqCst), 1);
    // the refreshed snapshot now lists it as a candidate
    let candidates = fx.engine.to_candidates().await;
    assert!(candidates.iter().any(|t| t.symbol == "PEPE"));

    // re-selecting a held token never re-adds
    fx.engine.select_to_token(usdt()).await;
    assert_eq!(fx.backend.add_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn from_candidates_require_a_balance() {
    let fx = Fixture::new(test_wallet(2.0));
    fx.backend.set_balance("USDT", 0.0);
    fx.engine.select_to_token(token("PEPE", Some(PEPE), 0.0)).await;

    let from = fx.engine.from_candidates().await;
    assert!(from.iter().all(|t| t.balance > 0.0));
    let to = fx.engine.to_candidates().await;
    assert!(to.len() > from.len());
}

// =============================================================================
// QUOTING
// =============================================================================

#[tokio::test(start_paused = true)]
async fn typed_amount_produces_a_debounced_quote() {
    let fx = Fixture::new(test_wallet(2.0));
    fx.engine.select_from_token(eth()).await;
    fx.engine.select_to_token(usdt()).await;
    fx.settle().await;

    fx.engine.set_from_amount("1").await;
    assert!(fx.engine.snapshot().await.is_loading);
    fx.settle().await;

    let session = fx.engine.snapshot().await;
    assert_eq!(session.rate, 2000.0);
    assert_eq!(session.to_amount_text, "2000.000000");
    assert!(!session.is_loading);
}

#[tokio::test(start_paused = true)]
async fn rapid_typing_issues_one_quote() {
    let fx = Fixture::new(test_wallet(2.0));
    fx.engine.select_from_token(eth()).await;
    fx.engine.select_to_token(usdt()).await;
    fx.settle().await;
    let before = fx.prices.price_calls.load(Ordering::SeqCst);

    for text in ["1", "1.", "1.5"] {
        fx.engine.set_from_amount(text).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    fx.settle().await;

    // one quote, two unit prices
    assert_eq!(fx.prices.price_calls.load(Ordering::SeqCst) - before, 2);
    assert_eq!(fx.engine.snapshot().await.to_amount_text, "3000.000000");
}

#[tokio::test(start_paused = true)]
async fn superseded_quote_is_discarded_even_if_it_arrives_last() {
    let fx = Fixture::new(test_wallet(2.0));
    fx.engine.select_from_token(eth()).await;
    fx.engine.select_to_token(usdt()).await;
    fx.settle().await;

    // amount "1": its price lookups will stall for a second
    fx.prices.delay_ms.store(1000, Ordering::SeqCst);
    fx.engine.set_from_amount("1").await;
    tokio::time::sleep(Duration::from_millis(400)).await;

    // amount "2" supersedes it while the first fetch is still in flight,
    // and resolves instantly - so the stale response arrives after it
    fx.prices.delay_ms.store(0, Ordering::SeqCst);
    fx.engine.set_from_amount("2").await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let session = fx.engine.snapshot().await;
    assert_eq!(session.to_amount_text, "4000.000000");
    assert!(!session.is_loading);
}

#[tokio::test(start_paused = true)]
async fn quote_failure_keeps_the_last_good_value() {
    let mut fx = Fixture::new(test_wallet(2.0));
    fx.engine.select_from_token(eth()).await;
    fx.engine.select_to_token(usdt()).await;
    fx.settle().await;

    fx.engine.set_from_amount("1").await;
    fx.settle().await;
    assert_eq!(fx.engine.snapshot().await.rate, 2000.0);
    fx.drain_notices();

    *fx.prices.fail.lock().unwrap() = true;
    fx.engine.set_from_amount("1.5").await;
    fx.settle().await;

    let session = fx.engine.snapshot().await;
    // stale over broken: previous rate survives, spinner cleared
    assert_eq!(session.rate, 2000.0);
    assert_eq!(session.to_amount_text, "2000.000000");
    assert!(!session.is_loading);
    // quiet degradation: no error notice for a failed quote
    assert!(fx
        .drain_notices()
        .iter()
        .all(|n| n.level != NoticeLevel::Error));
}

#[tokio::test(start_paused = true)]
async fn clearing_the_amount_clears_the_quote() {
    let fx = Fixture::new(test_wallet(2.0));
    fx.engine.select_from_token(eth()).await;
    fx.engine.select_to_token(usdt()).await;
    fx.settle().await;
    fx.engine.set_from_amount("1").await;
    fx.settle().await;

    fx.engine.set_from_amount("").await;
    fx.settle().await;

    let session = fx.engine.snapshot().await;
    assert_eq!(session.rate, 0.0);
    assert!(session.to_amount_text.is_empty());
}

#[tokio::test(start_paused = true)]
async fn over_balance_amount_warns_and_never_quotes() {
    let mut fx = Fixture::new(test_wallet(0.5));
    fx.engine.select_from_token(token("ETH", None, 0.5)).await;
    fx.engine.select_to_token(usdt()).await;
    fx.settle().await;
    let before = fx.prices.price_calls.load(Ordering::SeqCst);

    fx.engine.set_from_amount("0.6").await;
    let warned = fx
        .drain_notices()
        .iter()
        .any(|n| n.level == NoticeLevel::Warning);
    assert!(warned);
    fx.settle().await;

    // precondition failed inside the quote engine: no price traffic
    assert_eq!(fx.prices.price_calls.load(Ordering::SeqCst), before);
    assert!(fx.engine.snapshot().await.to_amount_text.is_empty());
}

#[tokio::test(start_paused = true)]
async fn max_button_fills_the_full_balance() {
    let fx = Fixture::new(test_wallet(2.0));
    fx.engine.select_from_token(eth()).await;
    fx.engine.select_to_token(usdt()).await;
    fx.settle().await;

    fx.engine.use_max_balance().await;
    fx.settle().await;

    let session = fx.engine.snapshot().await;
    assert_eq!(session.from_amount_text, "2");
    assert_eq!(session.to_amount_text, "4000.000000");
}

// =============================================================================
// SIDE FLIP
// =============================================================================

#[tokio::test(start_paused = true)]
async fn flip_exchanges_tokens_and_amounts_atomically() {
    let fx = Fixture::new(test_wallet(2.0));
    fx.engine.select_from_token(eth()).await;
    fx.engine.select_to_token(usdt()).await;
    fx.settle().await;
    fx.engine.set_from_amount("1").await;
    fx.settle().await;
    let infos_before = fx.prices.extended_calls.load(Ordering::SeqCst);

    fx.engine.flip_sides().await;
    fx.settle().await;

    let session = fx.engine.snapshot().await;
    assert_eq!(session.from_token.as_ref().map(|t| t.symbol.as_str()), Some("USDT"));
    assert_eq!(session.to_token.as_ref().map(|t| t.symbol.as_str()), Some("ETH"));
    assert_eq!(session.from_amount_text, "2000.000000");
    assert_eq!(session.to_amount_text, "1");
    // the new "to" side got a market-info refetch
    assert!(fx.prices.extended_calls.load(Ordering::SeqCst) > infos_before);
}

// =============================================================================
// CONFIRMATION
// =============================================================================

#[tokio::test(start_paused = true)]
async fn confirming_displays_the_reconciled_balance() {
    let fx = Fixture::new(test_wallet(10.0));
    fx.engine.select_from_token(token("ETH", None, 10.0)).await;
    fx.engine.select_to_token(usdt()).await;
    fx.settle().await;
    fx.engine.set_from_amount("1").await;
    fx.settle().await;

    // balance moved server-side between open and confirm
    fx.backend.set_balance("ETH", 8.0);
    fx.engine.begin_confirm().await;

    let session = fx.engine.snapshot().await;
    assert_eq!(session.view, SessionView::Confirming);
    assert_eq!(session.from_token.as_ref().map(|t| t.balance), Some(8.0));
    // fee estimated on entry: 0.008 ETH at $2000
    assert_eq!(session.estimated_fee.fee, 0.008);
    assert!((session.estimated_fee.fee_usd - 16.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn confirm_is_blocked_when_the_fresh_balance_shrank_below_the_amount() {
    let mut fx = Fixture::new(test_wallet(10.0));
    fx.engine.select_from_token(token("ETH", None, 10.0)).await;
    fx.engine.select_to_token(usdt()).await;
    fx.settle().await;
    fx.engine.set_from_amount("9").await;
    fx.settle().await;
    fx.drain_notices();

    fx.backend.set_balance("ETH", 8.0);
    fx.engine.begin_confirm().await;

    let session = fx.engine.snapshot().await;
    assert_eq!(session.view, SessionView::Editing);
    assert!(fx
        .drain_notices()
        .iter()
        .any(|n| n.level == NoticeLevel::Error));
    // selection survives so the user can adjust the amount
    assert_eq!(session.from_amount_text, "9");
}

#[tokio::test(start_paused = true)]
async fn begin_confirm_without_a_pair_is_refused() {
    let mut fx = Fixture::new(test_wallet(2.0));
    fx.engine.begin_confirm().await;
    assert_eq!(fx.engine.snapshot().await.view, SessionView::Editing);
    assert!(fx
        .drain_notices()
        .iter()
        .any(|n| n.level == NoticeLevel::Error));
    assert_eq!(fx.backend.get_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn cancel_returns_to_editing_with_the_session_intact() {
    let fx = Fixture::new(test_wallet(2.0));
    fx.engine.select_from_token(eth()).await;
    fx.engine.select_to_token(usdt()).await;
    fx.settle().await;
    fx.engine.set_from_amount("1").await;
    fx.settle().await;
    fx.engine.begin_confirm().await;
    assert_eq!(fx.engine.snapshot().await.view, SessionView::Confirming);

    fx.engine.cancel_confirm().await;
    let session = fx.engine.snapshot().await;
    assert_eq!(session.view, SessionView::Editing);
    assert_eq!(session.from_amount_text, "1");
}

// =============================================================================
// EXECUTION
// =============================================================================

#[tokio::test(start_paused = true)]
async fn successful_swap_resets_and_schedules_the_delayed_refresh() {
    let mut fx = Fixture::new(test_wallet(2.0));
    fx.engine.select_from_token(eth()).await;
    fx.engine.select_to_token(usdt()).await;
    fx.settle().await;
    fx.engine.set_from_amount("1").await;
    fx.settle().await;
    fx.engine.begin_confirm().await;
    fx.drain_notices();

    fx.engine.confirm().await;

    assert_eq!(fx.backend.swap_calls.load(Ordering::SeqCst), 1);
    assert!(fx
        .drain_notices()
        .iter()
        .any(|n| n.level == NoticeLevel::Success));
    let session = fx.engine.snapshot().await;
    assert_eq!(session.view, SessionView::Editing);
    assert!(session.from_token.is_none());
    assert!(session.from_amount_text.is_empty());

    // settlement refresh fires ~50 s later and re-fetches the wallet
    let gets_before = fx.backend.get_calls.load(Ordering::SeqCst);
    fx.backend.set_balance("ETH", 1.0);
    tokio::time::sleep(Duration::from_secs(51)).await;
    assert!(fx.backend.get_calls.load(Ordering::SeqCst) > gets_before);
    let wallet = fx.engine.active_wallet().await;
    assert_eq!(wallet.native_token().map(|t| t.balance), Some(1.0));
}

#[tokio::test(start_paused = true)]
async fn rejected_swap_surfaces_the_cause_and_preserves_the_session() {
    let mut fx = Fixture::new(test_wallet(2.0));
    fx.engine.select_from_token(eth()).await;
    fx.engine.select_to_token(usdt()).await;
    fx.settle().await;
    fx.engine.set_from_amount("1").await;
    fx.settle().await;
    fx.engine.begin_confirm().await;
    fx.drain_notices();

    *fx.backend.swap_error.lock().unwrap() = Some(SwapError::Backend {
        network: Network::Eth,
        message: "insufficient funds for gas * price + value".to_string(),
        error_code: None,
    });
    fx.engine.confirm().await;

    let errors: Vec<Notice> = fx
        .drain_notices()
        .into_iter()
        .filter(|n| n.level == NoticeLevel::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].message,
        "Insufficient Ethereum native token for gas fees"
    );

    // back on the confirmation screen, everything still in place for retry
    let session = fx.engine.snapshot().await;
    assert_eq!(session.view, SessionView::Confirming);
    assert_eq!(session.from_amount_text, "1");
    assert!(session.from_token.is_some());
}

#[tokio::test(start_paused = true)]
async fn amount_edits_are_ignored_outside_the_editing_view() {
    let fx = Fixture::new(test_wallet(10.0));
    fx.engine.select_from_token(eth()).await;
    fx.engine.select_to_token(usdt()).await;
    fx.settle().await;
    fx.engine.set_from_amount("1").await;
    fx.settle().await;
    fx.engine.begin_confirm().await;
    assert_eq!(fx.engine.snapshot().await.view, SessionView::Confirming);

    // the balance check already passed; later edits must not slip through
    fx.engine.set_from_amount("999").await;
    fx.engine.use_max_balance().await;
    let session = fx.engine.snapshot().await;
    assert_eq!(session.from_amount_text, "1");

    fx.engine.confirm().await;
    assert_eq!(fx.backend.swap_calls.load(Ordering::SeqCst), 1);
    assert_eq!(*fx.backend.last_amount.lock().unwrap(), Some(1.0));
}

#[tokio::test(start_paused = true)]
async fn confirm_is_ignored_while_a_swap_is_executing() {
    let fx = Fixture::new(test_wallet(2.0));
    fx.engine.select_from_token(eth()).await;
    fx.engine.select_to_token(usdt()).await;
    fx.settle().await;
    fx.engine.set_from_amount("1").await;
    fx.settle().await;
    fx.engine.begin_confirm().await;

    fx.backend.swap_delay_ms.store(1000, Ordering::SeqCst);
    let engine = fx.engine.clone();
    let first = tokio::spawn(async move { engine.confirm().await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    // second tap lands while the first submission is in flight
    assert_eq!(fx.engine.snapshot().await.view, SessionView::Executing);
    fx.engine.confirm().await;

    first.await.unwrap();
    assert_eq!(fx.backend.swap_calls.load(Ordering::SeqCst), 1);
}

// =============================================================================
// LIFECYCLE
// =============================================================================

#[tokio::test(start_paused = true)]
async fn close_resets_from_any_state() {
    let fx = Fixture::new(test_wallet(2.0));
    fx.engine.select_from_token(eth()).await;
    fx.engine.select_to_token(usdt()).await;
    fx.settle().await;
    fx.engine.set_from_amount("1").await;
    fx.settle().await;
    fx.engine.set_slippage_bps(100).await;
    fx.engine.begin_confirm().await;

    fx.engine.close().await;

    let session = fx.engine.snapshot().await;
    assert_eq!(session.view, SessionView::Editing);
    assert!(session.from_token.is_none());
    assert!(session.to_token.is_none());
    assert!(session.from_amount_text.is_empty());
    assert_eq!(session.rate, 0.0);
    assert_eq!(session.slippage_bps, 500);
    assert_eq!(session.estimated_fee.fee, 0.0);
}

#[tokio::test(start_paused = true)]
async fn close_discards_a_quote_still_in_flight() {
    let fx = Fixture::new(test_wallet(2.0));
    fx.engine.select_from_token(eth()).await;
    fx.engine.select_to_token(usdt()).await;
    fx.settle().await;

    fx.prices.delay_ms.store(1000, Ordering::SeqCst);
    fx.engine.set_from_amount("1").await;
    tokio::time::sleep(Duration::from_millis(400)).await;

    // fetch is mid-flight; closing must win over its late completion
    fx.engine.close().await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let session = fx.engine.snapshot().await;
    assert!(session.to_amount_text.is_empty());
    assert_eq!(session.rate, 0.0);
}

#[tokio::test(start_paused = true)]
async fn deep_link_resolves_both_sides() {
    let fx = Fixture::new(test_wallet(2.0));
    fx.engine.open_with_pair(Network::Eth, "native", PEPE).await;
    fx.settle().await;

    let session = fx.engine.snapshot().await;
    assert_eq!(session.from_token.as_ref().map(|t| t.symbol.as_str()), Some("ETH"));
    assert_eq!(session.to_token.as_ref().map(|t| t.symbol.as_str()), Some("PEPE"));
    assert_eq!(session.to_token.as_ref().map(|t| t.balance), Some(0.0));
    assert_eq!(fx.backend.add_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn deep_link_with_an_unknown_contract_notifies() {
    let mut fx = Fixture::new(test_wallet(2.0));
    fx.engine
        .open_with_pair(
            Network::Eth,
            "native",
            "0x0000000000000000000000000000000000000bad",
        )
        .await;

    assert!(fx
        .drain_notices()
        .iter()
        .any(|n| n.level == NoticeLevel::Error));
    let session = fx.engine.snapshot().await;
    assert!(session.from_token.is_none());
    assert!(!session.is_loading);
}
