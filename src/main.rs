//! Console probe for the swap engine
//!
//! Wires the real HTTP services from configs.json and walks a scripted
//! session against the live backend: list candidates, pick a pair, quote
//! an amount, and open the confirmation view. Submission only happens
//! with --execute; without it the walk stops at the fee screen, which is
//! enough to exercise every network path.
//!
//! Flags: --execute, --amount <n>, --quiet, --verbose, --debug-<tag>

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use swapcore::api::{HttpPoolDataProvider, HttpPriceProvider, HttpWalletBackend, WalletBackend};
use swapcore::configs::{read_configs, Configs};
use swapcore::logger::{self, LogTag};
use swapcore::market_data::MarketDataCache;
use swapcore::session::{NoticeLevel, SessionView, SwapEngine};

const CONFIGS_PATH: &str = "configs.json";

#[tokio::main]
async fn main() -> Result<()> {
    logger::init();

    let args: Vec<String> = std::env::args().collect();
    let execute = args.iter().any(|a| a == "--execute");
    let amount = flag_value(&args, "--amount").unwrap_or_else(|| "0.01".to_string());

    let configs = load_configs();
    logger::info(
        LogTag::System,
        &format!(
            "swapcore probe starting (backend: {})",
            configs.endpoints.backend_url
        ),
    );

    let backend = Arc::new(HttpWalletBackend::new(&configs)?);
    let prices = Arc::new(HttpPriceProvider::new(&configs)?);
    let pools = Arc::new(HttpPoolDataProvider::new(&configs)?);
    let market = Arc::new(MarketDataCache::new(
        pools,
        prices.clone(),
        configs.cache.clone(),
    ));

    let wallets = backend
        .get_wallets()
        .await
        .context("failed to fetch wallets from the backend")?;
    let wallet = wallets
        .into_iter()
        .next()
        .context("the backend reports no wallets")?;
    logger::info(
        LogTag::System,
        &format!(
            "Active wallet {} on {} ({} tokens)",
            wallet.id,
            wallet.network.as_str(),
            wallet.tokens.len()
        ),
    );

    let (engine, mut notices) = SwapEngine::new(&configs, wallet, backend, prices, market);

    // surface notices the way the mini-app would show toasts
    tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            let prefix = match notice.level {
                NoticeLevel::Success => "OK",
                NoticeLevel::Warning => "WARN",
                NoticeLevel::Error => "ERR",
            };
            println!(">> [{}] {}", prefix, notice.message);
        }
    });

    walk_session(&engine, &amount, execute).await;
    logger::info(LogTag::System, "Probe finished");
    Ok(())
}

async fn walk_session(engine: &SwapEngine, amount: &str, execute: bool) {
    let from_candidates = engine.from_candidates().await;
    let to_candidates = engine.to_candidates().await;
    println!(
        "from candidates: {:?}",
        from_candidates
            .iter()
            .map(|t| t.symbol.as_str())
            .collect::<Vec<_>>()
    );
    println!(
        "to candidates:   {:?}",
        to_candidates
            .iter()
            .map(|t| t.symbol.as_str())
            .collect::<Vec<_>>()
    );

    let Some(from) = from_candidates.into_iter().next() else {
        logger::warning(LogTag::System, "No token with a balance to swap from");
        return;
    };
    let Some(to) = to_candidates
        .into_iter()
        .find(|t| !t.is_same_asset(&from))
    else {
        logger::warning(LogTag::System, "No second token to swap into");
        return;
    };

    engine.select_from_token(from).await;
    engine.select_to_token(to).await;
    engine.set_from_amount(amount).await;

    // let the debounced quote and market info land
    tokio::time::sleep(Duration::from_secs(3)).await;
    let session = engine.snapshot().await;
    println!(
        "quote: {} {} -> {} {} (rate {})",
        session.from_amount_text,
        session.from_token.as_ref().map(|t| t.symbol.as_str()).unwrap_or("?"),
        session.to_amount_text,
        session.to_token.as_ref().map(|t| t.symbol.as_str()).unwrap_or("?"),
        session.rate
    );
    if let Some(info) = &session.extended_info {
        println!(
            "market: price ${} ({:+.2}% 24h), mcap {:?}",
            info.price, info.percent_change_24h, info.market_cap
        );
    }

    engine.begin_confirm().await;
    let session = engine.snapshot().await;
    if session.view != SessionView::Confirming {
        logger::warning(LogTag::System, "Confirmation was refused, stopping");
        return;
    }
    println!(
        "fee: {} native (${:.2}), slippage {} bps",
        session.estimated_fee.fee, session.estimated_fee.fee_usd, session.slippage_bps
    );

    if execute {
        engine.confirm().await;
        // give the post-swap notice a moment to print
        tokio::time::sleep(Duration::from_millis(200)).await;
    } else {
        println!("dry run: stopping before submission (pass --execute to swap)");
        engine.cancel_confirm().await;
    }

    engine.close().await;
}

fn load_configs() -> Configs {
    if Path::new(CONFIGS_PATH).exists() {
        match read_configs(CONFIGS_PATH) {
            Ok(configs) => return configs,
            Err(e) => {
                logger::warning(
                    LogTag::System,
                    &format!("Failed to read {}: {}, using defaults", CONFIGS_PATH, e),
                );
            }
        }
    }
    Configs::default()
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
