//! Session state types
//!
//! `SwapSession` is the working selection while the swap UI is open. It is
//! a plain value behind the engine's lock; snapshots handed to callers are
//! clones, so a render can never observe a half-applied transition.

use serde::{Deserialize, Serialize};

use crate::api::{ExtendedInfo, HistoricalQuote};
use crate::fees::FeeEstimate;
use crate::types::Token;

/// The view the user is on. `Executing` accepts no further input; every
/// other view can be left through `close`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionView {
    Editing,
    SelectingFrom,
    SelectingTo,
    Confirming,
    Executing,
}

#[derive(Debug, Clone)]
pub struct SwapSession {
    pub from_token: Option<Token>,
    pub to_token: Option<Token>,
    pub from_amount_text: String,
    pub to_amount_text: String,
    pub rate: f64,
    pub slippage_bps: u32,
    pub view: SessionView,
    pub estimated_fee: FeeEstimate,
    pub extended_info: Option<ExtendedInfo>,
    pub historical: Vec<HistoricalQuote>,
    pub is_loading: bool,
    pub is_info_loading: bool,
}

impl SwapSession {
    pub fn new(slippage_bps: u32) -> Self {
        Self {
            from_token: None,
            to_token: None,
            from_amount_text: String::new(),
            to_amount_text: String::new(),
            rate: 0.0,
            slippage_bps,
            view: SessionView::Editing,
            estimated_fee: FeeEstimate::default(),
            extended_info: None,
            historical: Vec::new(),
            is_loading: false,
            is_info_loading: false,
        }
    }

    /// Unconditional reset to an empty `Editing` session. Slippage reverts
    /// to the configured default too.
    pub fn reset(&mut self, slippage_bps: u32) {
        *self = SwapSession::new(slippage_bps);
    }

    /// Drop the "to" side along with everything derived from it
    pub fn clear_to_side(&mut self) {
        self.to_token = None;
        self.extended_info = None;
        self.historical.clear();
    }

    /// True once both tokens and a non-empty amount are in place
    pub fn is_submit_ready(&self) -> bool {
        self.from_token.is_some() && self.to_token.is_some() && !self.from_amount_text.is_empty()
    }
}
