//! Organic trading analyzer
//!
//! Turns a batch of trades for one token into an [`OrganicAnalysis`].
//!
//! Score breakdown (0-100):
//! - Unique wallets: up to 30 points, only once the minimum is met
//! - Wallet concentration: 25 points under the cap, scaled down above it
//! - Transaction count: up to 20 points, only once the minimum is met
//! - Wash trading: everything above is cut by 70%
//! - Pattern naturalness: up to 25 points, added after the penalty

use std::collections::HashMap;
use tracing::debug;

use super::patterns::{self, NEUTRAL_PATTERN_SCORE};
use super::types::{OrganicAnalysis, TradeEvent, WalletStat};
use super::wash_trading;
use crate::config::OrganicConfig;

/// Minimum organic score for a token to count as organic
pub const ORGANIC_SCORE_THRESHOLD: f64 = 50.0;

const MAX_WALLET_POINTS: f64 = 30.0;
const CONCENTRATION_POINTS: f64 = 25.0;
const MAX_TRANSACTION_POINTS: f64 = 20.0;
const PATTERN_POINTS: f64 = 25.0;
const WASH_TRADING_MULTIPLIER: f64 = 0.3;

/// Aggregate trades per wallet, in order of first appearance
pub fn aggregate_wallets(events: &[TradeEvent]) -> Vec<WalletStat> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut stats: Vec<WalletStat> = Vec::new();

    for event in events {
        let slot = *index.entry(event.wallet.as_str()).or_insert_with(|| {
            stats.push(WalletStat {
                wallet: event.wallet.clone(),
                ..Default::default()
            });
            stats.len() - 1
        });

        let stat = &mut stats[slot];
        stat.total_volume += event.amount;
        stat.transaction_count += 1;
        if event.side.is_buy() {
            stat.buy_count += 1;
        } else {
            stat.sell_count += 1;
        }
    }

    stats
}

/// Share of total volume held by the largest wallet (1.0 when there is no volume)
pub fn wallet_concentration(wallet_stats: &[WalletStat]) -> f64 {
    let total: f64 = wallet_stats.iter().map(|s| s.total_volume).sum();
    if wallet_stats.is_empty() || total <= 0.0 {
        return 1.0;
    }

    let top = wallet_stats
        .iter()
        .map(|s| s.total_volume)
        .fold(0.0_f64, f64::max);

    top / total
}

/// Stateless organic analyzer driven by [`OrganicConfig`] thresholds
#[derive(Debug, Clone)]
pub struct OrganicAnalyzer {
    config: OrganicConfig,
}

impl OrganicAnalyzer {
    pub fn new(config: OrganicConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OrganicConfig {
        &self.config
    }

    /// Analyze a batch of trades, stamping the result with the current time
    pub fn analyze(&self, token_address: &str, events: &[TradeEvent]) -> OrganicAnalysis {
        self.analyze_at(token_address, events, chrono::Utc::now().timestamp_millis())
    }

    /// Analyze a batch of trades with an explicit result timestamp
    pub fn analyze_at(
        &self,
        token_address: &str,
        events: &[TradeEvent],
        timestamp: i64,
    ) -> OrganicAnalysis {
        if events.is_empty() {
            return OrganicAnalysis::empty(token_address, timestamp);
        }

        let wallet_stats = aggregate_wallets(events);
        let unique_wallets = wallet_stats.len() as u32;
        let transaction_count = events.len() as u32;
        let concentration = wallet_concentration(&wallet_stats);

        let wash_signals = if self.config.wash_trading_detection {
            wash_trading::detect(events, &wallet_stats)
        } else {
            Vec::new()
        };
        let is_wash_trading = !wash_signals.is_empty();

        let pattern_score = if self.config.pattern_analysis_enabled {
            patterns::pattern_score(events, &wallet_stats)
        } else {
            NEUTRAL_PATTERN_SCORE
        };

        let organic_score = self.composite_score(
            unique_wallets,
            transaction_count,
            concentration,
            is_wash_trading,
            pattern_score,
        );

        debug!(
            token = %token_address,
            score = organic_score,
            wallets = unique_wallets,
            txs = transaction_count,
            concentration = %format!("{:.2}%", concentration * 100.0),
            wash = is_wash_trading,
            pattern = %format!("{:.3}", pattern_score),
            "Organic analysis complete"
        );

        OrganicAnalysis {
            token_address: token_address.to_string(),
            organic_score,
            unique_wallets,
            transaction_count,
            wallet_concentration: concentration,
            is_wash_trading,
            pattern_score,
            timestamp,
            wash_signals,
        }
    }

    /// Combine the factors into a 0-100 score rounded to two decimals
    fn composite_score(
        &self,
        unique_wallets: u32,
        transaction_count: u32,
        concentration: f64,
        is_wash_trading: bool,
        pattern_score: f64,
    ) -> f64 {
        let min_wallets = self.config.min_unique_wallets;
        let min_txs = self.config.min_transaction_count;
        let mut score = 0.0;

        if unique_wallets >= min_wallets {
            score += MAX_WALLET_POINTS.min(unique_wallets as f64 / min_wallets as f64 * 15.0);
        }

        if concentration <= self.config.max_wallet_concentration {
            score += CONCENTRATION_POINTS;
        } else {
            score += (CONCENTRATION_POINTS * (1.0 - concentration)).max(0.0);
        }

        if transaction_count >= min_txs {
            score += MAX_TRANSACTION_POINTS.min(transaction_count as f64 / min_txs as f64 * 10.0);
        }

        // The penalty only hits what has accumulated so far
        if is_wash_trading {
            score *= WASH_TRADING_MULTIPLIER;
        }

        score += pattern_score * PATTERN_POINTS;

        let clamped = score.clamp(0.0, 100.0);
        (clamped * 100.0).round() / 100.0
    }

    /// Whether an analysis meets every organic criterion
    pub fn is_organic(&self, analysis: &OrganicAnalysis) -> bool {
        analysis.organic_score >= ORGANIC_SCORE_THRESHOLD
            && analysis.unique_wallets >= self.config.min_unique_wallets
            && analysis.transaction_count >= self.config.min_transaction_count
            && analysis.wallet_concentration <= self.config.max_wallet_concentration
            && !analysis.is_wash_trading
    }
}

impl Default for OrganicAnalyzer {
    fn default() -> Self {
        Self::new(OrganicConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min_wallets: u32, min_txs: u32) -> OrganicConfig {
        OrganicConfig {
            min_unique_wallets: min_wallets,
            min_transaction_count: min_txs,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_batch_is_conservative() {
        let analyzer = OrganicAnalyzer::default();
        let analysis = analyzer.analyze("mint1", &[]);
        assert_eq!(analysis.organic_score, 0.0);
        assert_eq!(analysis.wallet_concentration, 1.0);
        assert!(analysis.is_wash_trading);
        assert_eq!(analysis.unique_wallets, 0);
        assert!(!analyzer.is_organic(&analysis));
    }

    #[test]
    fn test_three_trade_scenario() {
        let t0 = 1_700_000_000_000;
        let events = vec![
            TradeEvent::buy("walletA", 100.0, t0),
            TradeEvent::sell("walletB", 50.0, t0 + 1000),
            TradeEvent::sell("walletA", 90.0, t0 + 2000),
        ];
        let analyzer = OrganicAnalyzer::new(config(2, 2));
        let analysis = analyzer.analyze("mint1", &events);

        assert_eq!(analysis.unique_wallets, 2);
        assert_eq!(analysis.transaction_count, 3);
        assert!(!analysis.is_wash_trading);
        assert!(analysis.organic_score > 0.0);

        // walletA holds 190 of 240
        assert!((analysis.wallet_concentration - 190.0 / 240.0).abs() < 1e-9);
    }

    #[test]
    fn test_three_trade_scenario_exact_score() {
        let t0 = 0;
        let events = vec![
            TradeEvent::buy("walletA", 100.0, t0),
            TradeEvent::sell("walletB", 50.0, t0 + 1000),
            TradeEvent::sell("walletA", 90.0, t0 + 2000),
        ];
        let analyzer = OrganicAnalyzer::new(config(2, 2));
        let analysis = analyzer.analyze_at("mint1", &events, 0);

        // wallets: min(30, 2/2*15) = 15
        // concentration 0.7917 > 0.3: 25 * (1 - 0.7917) = 5.2083
        // txs: min(20, 3/2*10) = 15
        // pattern: only the buy ratio (1/3) holds -> 0.2 / 4 = 0.05 -> 1.25
        assert!((analysis.pattern_score - 0.05).abs() < 1e-9);
        assert_eq!(analysis.organic_score, 36.46);
    }

    #[test]
    fn test_round_trip_wash_trading() {
        let events: Vec<_> = (0..5)
            .map(|i| {
                if i % 2 == 0 {
                    TradeEvent::buy("washer", 10.0, i * 10_000)
                } else {
                    TradeEvent::sell("washer", 10.0, i * 10_000)
                }
            })
            .collect();
        let analysis = OrganicAnalyzer::default().analyze("mint1", &events);
        assert!(analysis.is_wash_trading);
        assert_eq!(analysis.wallet_concentration, 1.0);
    }

    #[test]
    fn test_six_buys_is_wash_trading() {
        let events: Vec<_> = (0..6).map(|i| TradeEvent::buy("bot", 1.0 + i as f64, i * 120_000)).collect();
        let analysis = OrganicAnalyzer::default().analyze("mint1", &events);
        assert!(analysis.is_wash_trading);
    }

    #[test]
    fn test_detection_disabled_never_flags() {
        let events: Vec<_> = (0..6).map(|i| TradeEvent::buy("bot", 1.0, i * 1000)).collect();
        let analyzer = OrganicAnalyzer::new(OrganicConfig {
            wash_trading_detection: false,
            ..Default::default()
        });
        let analysis = analyzer.analyze("mint1", &events);
        assert!(!analysis.is_wash_trading);
        assert!(analysis.wash_signals.is_empty());
    }

    #[test]
    fn test_pattern_analysis_disabled_is_neutral() {
        let events = vec![TradeEvent::buy("a", 1.0, 0), TradeEvent::sell("b", 3.0, 5000)];
        let analyzer = OrganicAnalyzer::new(OrganicConfig {
            pattern_analysis_enabled: false,
            ..Default::default()
        });
        assert_eq!(analyzer.analyze("mint1", &events).pattern_score, NEUTRAL_PATTERN_SCORE);
    }

    #[test]
    fn test_wash_penalty_applies_before_pattern_term() {
        // 1 wallet, 6 buys: one-sided -> wash
        let events: Vec<_> = (0..6).map(|i| TradeEvent::buy("bot", 10.0, i * 1000)).collect();
        let analyzer = OrganicAnalyzer::new(OrganicConfig {
            min_unique_wallets: 1,
            min_transaction_count: 1,
            pattern_analysis_enabled: false,
            ..Default::default()
        });
        let analysis = analyzer.analyze("mint1", &events);
        assert!(analysis.is_wash_trading);

        // wallets 15 + concentration 0 + txs 20 = 35 -> 10.5, plus 0.5 * 25
        let pre_penalty = 35.0;
        let expected = pre_penalty * 0.3 + NEUTRAL_PATTERN_SCORE * 25.0;
        assert!((analysis.organic_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_organic_market_scores_high() {
        let wallets = ["w0", "w1", "w2", "w3", "w4", "w5", "w6", "w7", "w8", "w9", "w10", "w11"];
        let amounts = [5.0, 12.0, 3.0, 20.0, 8.0, 15.0, 2.0, 9.0, 30.0, 4.0, 11.0, 6.0];
        let gaps = [0, 4_000, 1_000, 15_000, 2_000, 30_000, 500, 9_000, 3_000, 20_000, 7_000, 1_500];

        let mut ts = 0;
        let mut events = Vec::new();
        for (i, wallet) in wallets.iter().enumerate() {
            ts += gaps[i];
            let event = if i % 2 == 0 {
                TradeEvent::buy(*wallet, amounts[i], ts)
            } else {
                TradeEvent::sell(*wallet, amounts[i], ts)
            };
            events.push(event);
        }

        let analyzer = OrganicAnalyzer::default();
        let analysis = analyzer.analyze("mint1", &events);
        assert_eq!(analysis.unique_wallets, 12);
        assert!(!analysis.is_wash_trading);
        assert!(analysis.wallet_concentration <= 0.3);
        assert!(analysis.organic_score >= 50.0);
        assert!(analyzer.is_organic(&analysis));
    }

    #[test]
    fn test_scores_stay_in_bounds() {
        let batches: Vec<Vec<TradeEvent>> = vec![
            vec![TradeEvent::buy("a", 0.0, 0)],
            vec![TradeEvent::buy("a", 1e12, 0), TradeEvent::sell("b", 1e-9, 1)],
            (0..200).map(|i| TradeEvent::buy(format!("w{}", i % 3), i as f64, i)).collect(),
            (0..50).map(|i| TradeEvent::sell(format!("w{i}"), 1.0, i * 7_919 % 3_001)).collect(),
        ];

        let analyzer = OrganicAnalyzer::new(config(1, 1));
        for events in batches {
            let analysis = analyzer.analyze("mint1", &events);
            assert!((0.0..=100.0).contains(&analysis.organic_score));
            assert!((0.0..=1.0).contains(&analysis.wallet_concentration));
            assert!((0.0..=1.0).contains(&analysis.pattern_score));
        }
    }

    #[test]
    fn test_aggregate_wallets_preserves_first_seen_order() {
        let events = vec![
            TradeEvent::buy("b", 1.0, 0),
            TradeEvent::buy("a", 2.0, 1),
            TradeEvent::sell("b", 3.0, 2),
        ];
        let stats = aggregate_wallets(&events);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].wallet, "b");
        assert_eq!(stats[0].total_volume, 4.0);
        assert_eq!(stats[0].buy_count, 1);
        assert_eq!(stats[0].sell_count, 1);
        assert_eq!(stats[1].wallet, "a");
    }

    #[test]
    fn test_zero_volume_concentration() {
        let stats = aggregate_wallets(&[TradeEvent::buy("a", 0.0, 0), TradeEvent::buy("b", 0.0, 1)]);
        assert_eq!(wallet_concentration(&stats), 1.0);
    }
}
