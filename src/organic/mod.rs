//! Organic trading analysis
//!
//! Separates genuine market activity from wash trading and bot flow using
//! wallet distribution, wash trading heuristics and pattern naturalness.

pub mod analyzer;
pub mod patterns;
pub mod types;
pub mod wash_trading;

pub use analyzer::{OrganicAnalyzer, ORGANIC_SCORE_THRESHOLD};
pub use types::{OrganicAnalysis, TradeEvent, TradeSide, WalletStat, WashTradingSignal};
