//! Volume tracking state and records

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::organic::{OrganicAnalysis, TradeEvent};

/// Rolling volume window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "24h")]
    TwentyFourHours,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::FiveMinutes => "5m",
            Timeframe::OneHour => "1h",
            Timeframe::TwentyFourHours => "24h",
        }
    }

    pub fn duration_ms(&self) -> i64 {
        match self {
            Timeframe::FiveMinutes => 5 * 60 * 1000,
            Timeframe::OneHour => 60 * 60 * 1000,
            Timeframe::TwentyFourHours => 24 * 60 * 60 * 1000,
        }
    }

    pub fn all() -> [Timeframe; 3] {
        [
            Timeframe::FiveMinutes,
            Timeframe::OneHour,
            Timeframe::TwentyFourHours,
        ]
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Volumes for all three windows
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowVolumes {
    pub volume_5m: f64,
    pub volume_1h: f64,
    pub volume_24h: f64,
}

impl WindowVolumes {
    /// Sum trade amounts inside each window ending at `now_ms`
    pub fn from_trades(events: &[TradeEvent], now_ms: i64) -> Self {
        let mut volumes = Self::default();
        for timeframe in Timeframe::all() {
            let since = now_ms - timeframe.duration_ms();
            let total: f64 = events
                .iter()
                .filter(|e| e.timestamp >= since && e.timestamp <= now_ms)
                .map(|e| e.amount)
                .sum();
            volumes.set(timeframe, total);
        }
        volumes
    }

    pub fn get(&self, timeframe: Timeframe) -> f64 {
        match timeframe {
            Timeframe::FiveMinutes => self.volume_5m,
            Timeframe::OneHour => self.volume_1h,
            Timeframe::TwentyFourHours => self.volume_24h,
        }
    }

    pub fn set(&mut self, timeframe: Timeframe, volume: f64) {
        match timeframe {
            Timeframe::FiveMinutes => self.volume_5m = volume,
            Timeframe::OneHour => self.volume_1h = volume,
            Timeframe::TwentyFourHours => self.volume_24h = volume,
        }
    }
}

/// Latest volume and organic snapshot for one tracked token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenVolumeState {
    pub address: String,
    pub volume_5m: f64,
    pub volume_1h: f64,
    pub volume_24h: f64,
    pub price: f64,
    /// Last update, ms since epoch
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organic_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_wallets: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_count: Option<u32>,
}

impl TokenVolumeState {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            volume_5m: 0.0,
            volume_1h: 0.0,
            volume_24h: 0.0,
            price: 0.0,
            timestamp: 0,
            organic_score: None,
            unique_wallets: None,
            transaction_count: None,
        }
    }

    pub fn volumes(&self) -> WindowVolumes {
        WindowVolumes {
            volume_5m: self.volume_5m,
            volume_1h: self.volume_1h,
            volume_24h: self.volume_24h,
        }
    }

    pub fn set_volumes(&mut self, volumes: WindowVolumes) {
        self.volume_5m = volumes.volume_5m;
        self.volume_1h = volumes.volume_1h;
        self.volume_24h = volumes.volume_24h;
    }

    /// Copy the headline numbers of an analysis into this state
    pub fn merge_analysis(&mut self, analysis: &OrganicAnalysis) {
        self.organic_score = Some(analysis.organic_score);
        self.unique_wallets = Some(analysis.unique_wallets);
        self.transaction_count = Some(analysis.transaction_count);
    }
}

/// A detected volume spike
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSpikeRecord {
    pub token_address: String,
    pub previous_volume: f64,
    pub current_volume: f64,
    pub spike_multiplier: f64,
    pub timeframe: Timeframe,
    pub timestamp: i64,
    pub is_organic: bool,
}

/// One history entry, written every time a token is updated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeHistoryRecord {
    pub token_address: String,
    pub timestamp: i64,
    pub volume_5m: f64,
    pub volume_1h: f64,
    pub volume_24h: f64,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organic_score: Option<f64>,
}

impl From<&TokenVolumeState> for VolumeHistoryRecord {
    fn from(state: &TokenVolumeState) -> Self {
        Self {
            token_address: state.address.clone(),
            timestamp: state.timestamp,
            volume_5m: state.volume_5m,
            volume_1h: state.volume_1h,
            volume_24h: state.volume_24h,
            price: state.price,
            organic_score: state.organic_score,
        }
    }
}

/// Run state of the tracking loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotRunState {
    Stopped,
    Running,
}

/// Summary returned by the status query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotStatus {
    pub is_running: bool,
    pub tracked_tokens: usize,
    pub total_volume_spikes: usize,
    pub organic_tokens_detected: usize,
    /// Timestamp of the newest history record, 0 when there is none
    pub last_update: i64,
    pub start_time: i64,
    /// Tick interval in milliseconds
    pub update_interval: u64,
}

/// Point-in-time export of everything the engine holds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub status: BotStatus,
    pub tracked_tokens: Vec<String>,
    pub volumes: Vec<TokenVolumeState>,
    pub analyses: HashMap<String, OrganicAnalysis>,
    pub spikes: Vec<VolumeSpikeRecord>,
    pub history: Vec<VolumeHistoryRecord>,
    pub taken_at: chrono::DateTime<chrono::Utc>,
}
