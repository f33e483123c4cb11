//! CLI command implementations

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::organic::{OrganicAnalyzer, TradeEvent};
use crate::stream::PumpPortalFeed;
use crate::tracking::TrackingEngine;

/// How often the running tracker reports its status
const STATUS_REPORT_INTERVAL: Duration = Duration::from_secs(60);

/// Start the volume tracker with the PumpPortal trade feed
pub async fn start(config: &Config, tokens: Vec<String>, snapshot: Option<PathBuf>) -> Result<()> {
    if !config.volume.enabled {
        warn!("Volume tracking is disabled in config (volume.enabled = false)");
        return Ok(());
    }

    info!("Starting organic volume tracker...");
    info!(
        "Update interval: {}ms, spike multiplier: {}x",
        config.volume.update_interval_ms, config.volume.spike_multiplier
    );

    let feed = Arc::new(PumpPortalFeed::new(config.pumpportal.clone()));
    let feed_handle = feed.start()?;

    let engine = TrackingEngine::new(
        config.volume.clone(),
        config.organic.clone(),
        feed.clone(),
    );

    let mut initial: Vec<String> = config.volume.tokens.clone();
    initial.extend(tokens);
    for token in initial.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        engine.track(token).await;
    }

    if engine.tracked_tokens().await.is_empty() {
        warn!("No tokens to track - pass --token or set volume.tokens");
    }

    engine.start();
    info!("Tracker started. Press Ctrl+C to stop.");

    let mut status_timer = tokio::time::interval(STATUS_REPORT_INTERVAL);
    status_timer.tick().await;

    loop {
        tokio::select! {
            _ = status_timer.tick() => {
                let status = engine.status().await;
                info!(
                    tracked = status.tracked_tokens,
                    spikes = status.total_volume_spikes,
                    organic = status.organic_tokens_detected,
                    buffered_tokens = feed.buffer().token_count(),
                    "Tracker status"
                );

                if let Some(path) = &snapshot {
                    if let Err(e) = engine.save_snapshot(path).await {
                        error!("Failed to save snapshot: {}", e);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    engine.shutdown().await;
    feed.stop();
    if let Err(e) = feed_handle.await {
        warn!("PumpPortal feed task ended abnormally: {}", e);
    }

    if let Some(path) = &snapshot {
        engine
            .save_snapshot(path)
            .await
            .with_context(|| format!("Failed to save snapshot to {}", path.display()))?;
    }

    Ok(())
}

/// Run the organic analyzer over a JSON file of trades and print the result
pub async fn analyze(config: &Config, file: &Path, token: &str) -> Result<()> {
    let events = load_trades(file).await?;
    info!("Loaded {} trade(s) from {}", events.len(), file.display());

    let analyzer = OrganicAnalyzer::new(config.organic.clone());
    let analysis = analyzer.analyze(token, &events);

    println!("{}", serde_json::to_string_pretty(&analysis)?);
    println!(
        "\nOrganic: {}",
        if analyzer.is_organic(&analysis) { "YES" } else { "NO" }
    );

    Ok(())
}

/// Read trades from a JSON array, sorted oldest first
async fn load_trades(file: &Path) -> Result<Vec<TradeEvent>> {
    let data = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Cannot read trades file {}", file.display()))?;

    let mut events: Vec<TradeEvent> = serde_json::from_str(&data)
        .with_context(|| format!("Invalid trades JSON in {}", file.display()))?;

    if let Some(bad) = events.iter().find(|e| !e.amount.is_finite() || e.amount < 0.0) {
        anyhow::bail!("Trade amounts must be non-negative, got {} for {}", bad.amount, bad.wallet);
    }

    events.sort_by_key(|e| e.timestamp);
    Ok(events)
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}
