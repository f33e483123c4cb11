//! Stream module - Trade ingestion
//!
//! Supports:
//! - PumpPortal WebSocket (free, no approval needed)
//! - In-memory trade buffer for any other push-based feed

pub mod pumpportal;
pub mod source;

pub use pumpportal::{PumpPortalConfig, PumpPortalFeed};
pub use source::{TradeBuffer, TradeSource};
