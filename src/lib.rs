//! swapcore - swap orchestration engine
//!
//! Token resolution, debounced rate quoting, multi-tier market-data
//! caching, fee estimation, and the confirmation state machine that
//! reconciles wallet state against the backend before any
//! balance-sensitive decision. Signing and broadcasting are delegated to
//! the backend execution service; this crate never touches a chain.

pub mod api;
pub mod configs;
pub mod debounce;
pub mod errors;
pub mod fees;
pub mod logger;
pub mod market_data;
pub mod quote;
pub mod resolver;
pub mod session;
pub mod types;
pub mod wallets;
