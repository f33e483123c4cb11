//! Trade event sources
//!
//! The tracking engine pulls a batch of recent trades per token on every tick
//! through the [`TradeSource`] trait. [`TradeBuffer`] is the in-memory source
//! filled by push-based feeds such as PumpPortal.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use tracing::debug;

use crate::error::Result;
use crate::organic::TradeEvent;

/// 24 hours, the widest volume window
pub const DEFAULT_RETENTION_MS: i64 = 24 * 60 * 60 * 1000;

/// Provides recent trades for a token
///
/// Implementations must return trades in chronological order. Errors are
/// treated as transient by the tracking loop and retried on the next tick.
#[async_trait]
pub trait TradeSource: Send + Sync {
    /// Source name for logging
    fn name(&self) -> &'static str;

    /// Recent trades for a token, oldest first
    async fn recent_trades(&self, token: &str) -> Result<Vec<TradeEvent>>;

    /// Called when a token starts being tracked
    async fn on_track(&self, _token: &str) {}

    /// Called when a token stops being tracked
    async fn on_untrack(&self, _token: &str) {}
}

/// In-memory per-token trade buffer with a retention window
pub struct TradeBuffer {
    trades: DashMap<String, VecDeque<TradeEvent>>,
    retention_ms: i64,
}

impl TradeBuffer {
    pub fn new(retention_ms: i64) -> Self {
        Self {
            trades: DashMap::new(),
            retention_ms,
        }
    }

    /// Append a trade and drop anything older than the retention window
    pub fn record(&self, token: &str, event: TradeEvent) {
        let cutoff = event.timestamp - self.retention_ms;
        let mut entry = self.trades.entry(token.to_string()).or_default();
        entry.push_back(event);

        while entry.front().is_some_and(|e| e.timestamp < cutoff) {
            entry.pop_front();
        }
    }

    /// Drop all buffered trades for a token
    pub fn forget(&self, token: &str) {
        if self.trades.remove(token).is_some() {
            debug!(token = %token, "Dropped buffered trades");
        }
    }

    /// Buffered trades for a token inside the retention window, oldest first
    pub fn snapshot(&self, token: &str) -> Vec<TradeEvent> {
        self.snapshot_at(token, chrono::Utc::now().timestamp_millis())
    }

    /// Prune against `now_ms` and return what is left
    pub fn snapshot_at(&self, token: &str, now_ms: i64) -> Vec<TradeEvent> {
        let cutoff = now_ms - self.retention_ms;
        let Some(mut trades) = self.trades.get_mut(token) else {
            return Vec::new();
        };

        while trades.front().is_some_and(|e| e.timestamp < cutoff) {
            trades.pop_front();
        }
        trades.iter().cloned().collect()
    }

    /// Number of trades buffered for a token
    pub fn len(&self, token: &str) -> usize {
        self.trades.get(token).map(|t| t.len()).unwrap_or(0)
    }

    /// Number of tokens with buffered trades
    pub fn token_count(&self) -> usize {
        self.trades.len()
    }
}

impl Default for TradeBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_MS)
    }
}

#[async_trait]
impl TradeSource for TradeBuffer {
    fn name(&self) -> &'static str {
        "trade_buffer"
    }

    async fn recent_trades(&self, token: &str) -> Result<Vec<TradeEvent>> {
        Ok(self.snapshot(token))
    }

    async fn on_untrack(&self, token: &str) {
        self.forget(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_keeps_arrival_order() {
        let buffer = TradeBuffer::default();
        buffer.record("mint1", TradeEvent::buy("a", 1.0, 1_000));
        buffer.record("mint1", TradeEvent::sell("b", 2.0, 2_000));
        buffer.record("mint2", TradeEvent::buy("c", 3.0, 2_500));

        let trades = buffer.snapshot_at("mint1", 3_000);
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].wallet, "a");
        assert_eq!(trades[1].wallet, "b");
        assert_eq!(buffer.token_count(), 2);
    }

    #[test]
    fn test_retention_prunes_old_trades() {
        let buffer = TradeBuffer::new(10_000);
        buffer.record("mint1", TradeEvent::buy("a", 1.0, 0));
        buffer.record("mint1", TradeEvent::buy("b", 1.0, 5_000));
        buffer.record("mint1", TradeEvent::buy("c", 1.0, 12_000));

        let wallets: Vec<String> = buffer
            .snapshot_at("mint1", 12_000)
            .into_iter()
            .map(|e| e.wallet)
            .collect();
        assert_eq!(wallets, vec!["b", "c"]);
    }

    #[test]
    fn test_quiet_token_expires_on_read() {
        let buffer = TradeBuffer::new(10_000);
        buffer.record("mint1", TradeEvent::buy("a", 1.0, 0));
        buffer.record("mint1", TradeEvent::buy("b", 1.0, 4_000));

        assert_eq!(buffer.snapshot_at("mint1", 12_000).len(), 1);
        assert!(buffer.snapshot_at("mint1", 20_000).is_empty());
        assert_eq!(buffer.len("mint1"), 0);
    }

    #[tokio::test]
    async fn test_recent_trades_skips_expired() {
        let buffer = TradeBuffer::default();
        let now = chrono::Utc::now().timestamp_millis();
        buffer.record("mint1", TradeEvent::buy("old", 1.0, now - DEFAULT_RETENTION_MS - 60_000));

        assert!(buffer.recent_trades("mint1").await.unwrap().is_empty());

        buffer.record("mint1", TradeEvent::sell("fresh", 2.0, now));
        let trades = buffer.recent_trades("mint1").await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].wallet, "fresh");
    }

    #[tokio::test]
    async fn test_unknown_token_is_empty() {
        let buffer = TradeBuffer::default();
        assert!(buffer.recent_trades("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_untrack_forgets_trades() {
        let buffer = TradeBuffer::default();
        buffer.record("mint1", TradeEvent::buy("a", 1.0, 0));
        buffer.on_untrack("mint1").await;
        assert_eq!(buffer.len("mint1"), 0);
    }
}
