//! Organic Volume Tracker Library
//!
//! Multi-timeframe volume tracking with spike detection and organic trading
//! analysis for pump.fun tokens.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod organic;
pub mod stream;
pub mod tracking;

// Re-export commonly used types
pub use api::{ApiResponse, VolumeApi};
pub use config::Config;
pub use error::{Error, Result};
pub use organic::{OrganicAnalysis, OrganicAnalyzer, TradeEvent};
pub use tracking::TrackingEngine;
