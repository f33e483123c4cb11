//! Volume tracking engine
//!
//! Owns the tracked token set and every piece of per-token state. A single
//! background loop ticks on a fixed interval: for each tracked token it pulls
//! recent trades, runs the organic analyzer, refreshes the token's volume
//! windows, appends a history record and checks each window for a spike
//! against the volumes stored by the previous tick.
//!
//! Ticks never overlap. `stop` cancels the loop's sleep but never interrupts
//! a tick that is already running, and a `start` issued while an old loop is
//! winding down waits for that loop's tick before its own first tick.
//!
//! Per-token fetches have no timeout; a source that hangs stalls the tick.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::spike_log::SpikeLog;
use super::types::{
    BotRunState, BotStatus, EngineSnapshot, Timeframe, TokenVolumeState, VolumeHistoryRecord,
    VolumeSpikeRecord, WindowVolumes,
};
use crate::config::{OrganicConfig, VolumeConfig};
use crate::error::{Error, Result};
use crate::organic::{OrganicAnalysis, OrganicAnalyzer, TradeEvent};
use crate::stream::TradeSource;

/// Spikes returned by the spike query
pub const RECENT_SPIKES_LIMIT: usize = 100;
/// History records returned when no token filter is given
pub const RECENT_HISTORY_LIMIT: usize = 1000;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// current/previous when it reaches the threshold; never for a zero baseline
pub fn spike_multiplier(previous: f64, current: f64, threshold: f64) -> Option<f64> {
    if previous <= 0.0 {
        return None;
    }
    let multiplier = current / previous;
    (multiplier >= threshold).then_some(multiplier)
}

/// Per-token tables, written only by ticks and track/untrack
#[derive(Debug, Default)]
struct EngineState {
    tracked: BTreeSet<String>,
    volumes: BTreeMap<String, TokenVolumeState>,
    analyses: HashMap<String, OrganicAnalysis>,
    /// Append-only; reads without a token filter are capped
    history: Vec<VolumeHistoryRecord>,
    spikes: SpikeLog,
}

struct RunControl {
    state: BotRunState,
    start_time: i64,
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

struct EngineInner {
    config: VolumeConfig,
    analyzer: OrganicAnalyzer,
    source: Arc<dyn TradeSource>,
    state: RwLock<EngineState>,
    run: Mutex<RunControl>,
    /// Held for the duration of a tick so ticks from successive loops never overlap
    tick_lock: tokio::sync::Mutex<()>,
    ticks: AtomicU64,
}

/// Handle to the tracking engine; clones share the same state
#[derive(Clone)]
pub struct TrackingEngine {
    inner: Arc<EngineInner>,
}

impl TrackingEngine {
    pub fn new(config: VolumeConfig, organic: OrganicConfig, source: Arc<dyn TradeSource>) -> Self {
        info!(
            source = source.name(),
            interval_ms = config.update_interval_ms,
            spike_multiplier = config.spike_multiplier,
            "Volume tracker initialized"
        );

        Self {
            inner: Arc::new(EngineInner {
                config,
                analyzer: OrganicAnalyzer::new(organic),
                source,
                state: RwLock::new(EngineState::default()),
                run: Mutex::new(RunControl {
                    state: BotRunState::Stopped,
                    start_time: 0,
                    cancel: None,
                    handle: None,
                }),
                tick_lock: tokio::sync::Mutex::new(()),
                ticks: AtomicU64::new(0),
            }),
        }
    }

    pub fn analyzer(&self) -> &OrganicAnalyzer {
        &self.inner.analyzer
    }

    /// Start the polling loop. Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let mut run = self.inner.lock_run();

        if run.state == BotRunState::Running {
            warn!("Volume tracker is already running");
            return;
        }

        let cancel = CancellationToken::new();
        run.state = BotRunState::Running;
        run.start_time = now_ms();
        run.cancel = Some(cancel.clone());

        let inner = self.inner.clone();
        run.handle = Some(tokio::spawn(async move {
            inner.run_loop(cancel).await;
        }));

        info!("Volume tracker started");
    }

    /// Signal the loop to exit. An in-flight tick runs to completion.
    pub fn stop(&self) {
        let mut run = self.inner.lock_run();

        if let Some(cancel) = run.cancel.take() {
            cancel.cancel();
        }

        if run.state == BotRunState::Running {
            run.state = BotRunState::Stopped;
            info!("Volume tracker stopped");
        }
    }

    /// Stop and wait for the loop task to finish its current tick
    pub async fn shutdown(&self) {
        self.stop();
        let handle = self.inner.lock_run().handle.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Tracking loop ended abnormally: {}", e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock_run().state == BotRunState::Running
    }

    /// Number of ticks completed since creation
    pub fn tick_count(&self) -> u64 {
        self.inner.ticks.load(Ordering::SeqCst)
    }

    /// Add a token to the tracked set (idempotent)
    pub async fn track(&self, token: &str) {
        let added = self.inner.state.write().await.tracked.insert(token.to_string());
        if added {
            self.inner.source.on_track(token).await;
            info!(token = %token, "Added token to tracking");
        } else {
            debug!(token = %token, "Token already tracked");
        }
    }

    /// Remove a token with its volume state and analysis; history and spikes stay
    pub async fn untrack(&self, token: &str) {
        let removed = {
            let mut state = self.inner.state.write().await;
            let removed = state.tracked.remove(token);
            state.volumes.remove(token);
            state.analyses.remove(token);
            removed
        };

        if removed {
            self.inner.source.on_untrack(token).await;
            info!(token = %token, "Removed token from tracking");
        }
    }

    pub async fn tracked_tokens(&self) -> Vec<String> {
        self.inner.state.read().await.tracked.iter().cloned().collect()
    }

    pub async fn status(&self) -> BotStatus {
        let (is_running, start_time) = {
            let run = self.inner.lock_run();
            (run.state == BotRunState::Running, run.start_time)
        };

        let state = self.inner.state.read().await;
        let organic_tokens_detected = state
            .analyses
            .values()
            .filter(|analysis| self.inner.analyzer.is_organic(analysis))
            .count();

        BotStatus {
            is_running,
            tracked_tokens: state.tracked.len(),
            total_volume_spikes: state.spikes.len(),
            organic_tokens_detected,
            last_update: state.history.last().map(|h| h.timestamp).unwrap_or(0),
            start_time,
            update_interval: self.inner.config.update_interval_ms,
        }
    }

    /// Volume state for one token, or for every token with state
    pub async fn volume_of(&self, token: Option<&str>) -> Vec<TokenVolumeState> {
        let state = self.inner.state.read().await;
        match token {
            Some(token) => state.volumes.get(token).cloned().into_iter().collect(),
            None => state.volumes.values().cloned().collect(),
        }
    }

    pub async fn organic_analysis_of(&self, token: &str) -> Option<OrganicAnalysis> {
        self.inner.state.read().await.analyses.get(token).cloned()
    }

    /// Tokens whose latest analysis passes every organic criterion
    pub async fn organic_tokens(&self) -> Vec<TokenVolumeState> {
        let state = self.inner.state.read().await;
        state
            .volumes
            .values()
            .filter(|volume| {
                state
                    .analyses
                    .get(&volume.address)
                    .is_some_and(|analysis| self.inner.analyzer.is_organic(analysis))
            })
            .cloned()
            .collect()
    }

    /// Most recent spikes, oldest first
    pub async fn spikes(&self) -> Vec<VolumeSpikeRecord> {
        self.inner.state.read().await.spikes.recent(RECENT_SPIKES_LIMIT)
    }

    /// Full history of one token, or the most recent records across all tokens
    pub async fn history(&self, token: Option<&str>) -> Vec<VolumeHistoryRecord> {
        let state = self.inner.state.read().await;
        match token {
            Some(token) => state
                .history
                .iter()
                .filter(|h| h.token_address == token)
                .cloned()
                .collect(),
            None => {
                let skip = state.history.len().saturating_sub(RECENT_HISTORY_LIMIT);
                state.history[skip..].to_vec()
            }
        }
    }

    /// Run a single tick now
    pub async fn tick(&self) {
        self.inner.tick_at(now_ms()).await;
    }

    /// Run a single tick with an explicit clock
    pub async fn tick_at(&self, now: i64) {
        self.inner.tick_at(now).await;
    }

    pub async fn snapshot(&self) -> EngineSnapshot {
        let status = self.status().await;
        let spikes = self.spikes().await;
        let history = self.history(None).await;

        let state = self.inner.state.read().await;
        EngineSnapshot {
            status,
            tracked_tokens: state.tracked.iter().cloned().collect(),
            volumes: state.volumes.values().cloned().collect(),
            analyses: state.analyses.clone(),
            spikes,
            history,
            taken_at: chrono::Utc::now(),
        }
    }

    /// Write a JSON snapshot of the engine to disk
    pub async fn save_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let snapshot = self.snapshot().await;
        let data = serde_json::to_string_pretty(&snapshot)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, data)
            .await
            .map_err(|e| Error::Io(format!("Failed to write snapshot {}: {}", path.display(), e)))?;

        info!(
            path = %path.display(),
            tokens = snapshot.volumes.len(),
            history = snapshot.history.len(),
            "Saved tracker snapshot"
        );
        Ok(())
    }
}

impl EngineInner {
    fn lock_run(&self) -> std::sync::MutexGuard<'_, RunControl> {
        // RunControl stays consistent even if a holder panicked
        self.run.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn run_loop(self: Arc<Self>, cancel: CancellationToken) {
        let interval = Duration::from_millis(self.config.update_interval_ms);
        debug!("Tracking loop running every {:?}", interval);

        loop {
            if cancel.is_cancelled() {
                break;
            }

            self.tick_at(now_ms()).await;

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = cancel.cancelled() => break,
            }
        }

        debug!("Tracking loop exited");
    }

    async fn tick_at(&self, now: i64) {
        let _tick = self.tick_lock.lock().await;

        let tokens: Vec<String> = self.state.read().await.tracked.iter().cloned().collect();
        let mut updated = 0usize;

        for token in &tokens {
            match self.source.recent_trades(token).await {
                Ok(events) => {
                    if self.process_token(token, &events, now).await {
                        updated += 1;
                    }
                }
                Err(e) => {
                    warn!(
                        token = %token,
                        source = self.source.name(),
                        retryable = e.is_retryable(),
                        "Failed to fetch trades: {}",
                        e
                    );
                }
            }
        }

        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(tick, tokens = tokens.len(), updated, "Tick complete");
    }

    /// Fold one batch into the token's state. Returns false when nothing changed.
    async fn process_token(&self, token: &str, events: &[TradeEvent], now: i64) -> bool {
        if events.is_empty() {
            debug!(token = %token, "No recent trades");
            return false;
        }

        let volumes = WindowVolumes::from_trades(events, now);
        let price = events.iter().rev().find_map(|e| e.price);
        let analysis = self
            .analyzer
            .config()
            .enabled
            .then(|| self.analyzer.analyze_at(token, events, now));

        let mut guard = self.state.write().await;
        let state = &mut *guard;

        // Untracked while the fetch was in flight
        if !state.tracked.contains(token) {
            return false;
        }

        if let Some(analysis) = analysis {
            state.analyses.insert(token.to_string(), analysis);
        }
        let analysis = state.analyses.get(token);

        // Read the old snapshot before it is overwritten
        let previous = state.volumes.get(token).map(TokenVolumeState::volumes);

        let entry = state
            .volumes
            .entry(token.to_string())
            .or_insert_with(|| TokenVolumeState::new(token));
        entry.set_volumes(volumes);
        if let Some(price) = price {
            entry.price = price;
        }
        entry.timestamp = now;
        if let Some(analysis) = analysis {
            entry.merge_analysis(analysis);
        }
        state.history.push(VolumeHistoryRecord::from(&*entry));

        if let Some(previous) = previous {
            let is_organic = analysis.is_some_and(|analysis| self.analyzer.is_organic(analysis));

            for timeframe in self.enabled_timeframes() {
                let previous_volume = previous.get(timeframe);
                let current_volume = volumes.get(timeframe);

                if let Some(multiplier) =
                    spike_multiplier(previous_volume, current_volume, self.config.spike_multiplier)
                {
                    info!(
                        token = %token,
                        timeframe = %timeframe,
                        multiplier = %format!("{:.2}x", multiplier),
                        organic = is_organic,
                        "Volume spike detected"
                    );

                    state.spikes.push(VolumeSpikeRecord {
                        token_address: token.to_string(),
                        previous_volume,
                        current_volume,
                        spike_multiplier: multiplier,
                        timeframe,
                        timestamp: now,
                        is_organic,
                    });
                }
            }
        }

        true
    }

    fn enabled_timeframes(&self) -> impl Iterator<Item = Timeframe> + '_ {
        Timeframe::all().into_iter().filter(|timeframe| match timeframe {
            Timeframe::FiveMinutes => self.config.track_5m,
            Timeframe::OneHour => self.config.track_1h,
            Timeframe::TwentyFourHours => self.config.track_24h,
        })
    }
}
