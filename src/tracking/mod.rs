//! Multi-timeframe volume tracking
//!
//! Polls trade sources for every tracked token, keeps 5m/1h/24h volume
//! windows, records history and flags volume spikes.

pub mod engine;
pub mod spike_log;
pub mod types;

pub use engine::TrackingEngine;
pub use spike_log::{SpikeLog, MAX_SPIKES};
pub use types::{
    BotRunState, BotStatus, EngineSnapshot, Timeframe, TokenVolumeState, VolumeHistoryRecord,
    VolumeSpikeRecord, WindowVolumes,
};
