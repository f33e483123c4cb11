//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

// Re-export the feed config so callers only need one import path
pub use crate::stream::pumpportal::PumpPortalConfig;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub volume: VolumeConfig,
    #[serde(default)]
    pub organic: OrganicConfig,
    #[serde(default)]
    pub pumpportal: PumpPortalConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Volume tracking loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct VolumeConfig {
    /// Start the tracking loop automatically with the `start` command
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Delay between ticks in milliseconds
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
    /// current/previous ratio at which a volume change counts as a spike
    #[serde(default = "default_spike_multiplier")]
    pub spike_multiplier: f64,
    #[serde(default = "default_true")]
    pub track_5m: bool,
    #[serde(default = "default_true")]
    pub track_1h: bool,
    #[serde(default = "default_true")]
    pub track_24h: bool,
    /// Tokens to track at startup
    #[serde(default)]
    pub tokens: Vec<String>,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            update_interval_ms: default_update_interval_ms(),
            spike_multiplier: default_spike_multiplier(),
            track_5m: true,
            track_1h: true,
            track_24h: true,
            tokens: vec![],
        }
    }
}

/// Organic trading analysis thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct OrganicConfig {
    /// Run the pattern analyzer on each tick
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_min_unique_wallets")]
    pub min_unique_wallets: u32,
    /// Maximum share of volume from the top wallet (0.3 = 30%)
    #[serde(default = "default_max_wallet_concentration")]
    pub max_wallet_concentration: f64,
    #[serde(default = "default_min_transaction_count")]
    pub min_transaction_count: u32,
    #[serde(default = "default_true")]
    pub wash_trading_detection: bool,
    #[serde(default = "default_true")]
    pub pattern_analysis_enabled: bool,
}

impl Default for OrganicConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_unique_wallets: default_min_unique_wallets(),
            max_wallet_concentration: default_max_wallet_concentration(),
            min_transaction_count: default_min_transaction_count(),
            wash_trading_detection: true,
            pattern_analysis_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_update_interval_ms() -> u64 {
    5000
}

fn default_spike_multiplier() -> f64 {
    2.0
}

fn default_min_unique_wallets() -> u32 {
    10
}

fn default_max_wallet_concentration() -> f64 {
    0.3
}

fn default_min_transaction_count() -> u32 {
    5
}

fn default_log_level() -> String {
    std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into())
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("volume.update_interval_ms", default_update_interval_ms() as i64)?
            .set_default("volume.spike_multiplier", default_spike_multiplier())?
            .set_default("logging.level", default_log_level())?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix ORGANIC_)
            .add_source(
                config::Environment::with_prefix("ORGANIC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.volume.update_interval_ms == 0 {
            anyhow::bail!("update_interval_ms must be positive");
        }

        if self.volume.spike_multiplier <= 0.0 {
            anyhow::bail!("spike_multiplier must be positive");
        }

        if !(0.0..=1.0).contains(&self.organic.max_wallet_concentration) {
            anyhow::bail!("max_wallet_concentration must be between 0 and 1");
        }

        // Both minimums are divisors in the organic score
        if self.organic.min_unique_wallets == 0 {
            anyhow::bail!("min_unique_wallets must be at least 1");
        }

        if self.organic.min_transaction_count == 0 {
            anyhow::bail!("min_transaction_count must be at least 1");
        }

        for token in &self.volume.tokens {
            if token.trim().is_empty() {
                anyhow::bail!("volume.tokens contains an empty token address");
            }
        }

        if self.volume.spike_multiplier < 1.0 {
            tracing::warn!(
                "spike_multiplier {} is below 1.0 - every stable or falling volume will be reported as a spike",
                self.volume.spike_multiplier
            );
        }

        Ok(())
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  Volume:
    enabled: {}
    update_interval: {}ms
    spike_multiplier: {}x
    timeframes: 5m={} 1h={} 24h={}
    tokens: {}
  Organic:
    enabled: {}
    min_unique_wallets: {}
    max_wallet_concentration: {}
    min_transaction_count: {}
    wash_trading_detection: {}
    pattern_analysis: {}
  PumpPortal:
    ws_url: {}
    reconnect_delay: {}ms
    trade_retention: {}s
  Logging:
    level: {}
    json: {}
"#,
            self.volume.enabled,
            self.volume.update_interval_ms,
            self.volume.spike_multiplier,
            self.volume.track_5m,
            self.volume.track_1h,
            self.volume.track_24h,
            self.volume.tokens.len(),
            self.organic.enabled,
            self.organic.min_unique_wallets,
            self.organic.max_wallet_concentration,
            self.organic.min_transaction_count,
            self.organic.wash_trading_detection,
            self.organic.pattern_analysis_enabled,
            mask_url(&self.pumpportal.ws_url),
            self.pumpportal.reconnect_delay_ms,
            self.pumpportal.trade_retention_secs,
            self.logging.level,
            self.logging.json,
        )
    }
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            volume: VolumeConfig::default(),
            organic: OrganicConfig::default(),
            pumpportal: PumpPortalConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
