//! Trading pattern naturalness
//!
//! Genuine markets show varied trade sizes, irregular timing, a mix of buys
//! and sells, and wallets of different sizes. Each check contributes a fixed
//! weight when it holds; the total is averaged over the number of checks.

use super::types::{TradeEvent, WalletStat};

/// Score returned when pattern analysis is switched off
pub const NEUTRAL_PATTERN_SCORE: f64 = 0.5;

const AMOUNT_VARIANCE_WEIGHT: f64 = 0.3;
const TIMING_VARIANCE_WEIGHT: f64 = 0.3;
const SIDE_BALANCE_WEIGHT: f64 = 0.2;
const WALLET_DIVERSITY_WEIGHT: f64 = 0.2;
const CHECK_COUNT: f64 = 4.0;

/// Compute the 0-1 naturalness score for a non-empty batch
pub fn pattern_score(events: &[TradeEvent], wallet_stats: &[WalletStat]) -> f64 {
    let mut score = 0.0;

    if has_natural_amount_variance(events) {
        score += AMOUNT_VARIANCE_WEIGHT;
    }
    if has_natural_timing(events) {
        score += TIMING_VARIANCE_WEIGHT;
    }
    if has_balanced_sides(events) {
        score += SIDE_BALANCE_WEIGHT;
    }
    if has_diverse_wallet_sizes(wallet_stats) {
        score += WALLET_DIVERSITY_WEIGHT;
    }

    score / CHECK_COUNT
}

/// Population mean and variance
fn mean_and_variance(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance))
}

/// Coefficient of variation of trade amounts strictly within (0.3, 2.0)
fn has_natural_amount_variance(events: &[TradeEvent]) -> bool {
    let amounts: Vec<f64> = events.iter().map(|e| e.amount).collect();
    match mean_and_variance(&amounts) {
        Some((mean, variance)) if mean > 0.0 => {
            let cv = variance.sqrt() / mean;
            cv > 0.3 && cv < 2.0
        }
        _ => false,
    }
}

/// Variance of inter-arrival gaps above half the mean gap
fn has_natural_timing(events: &[TradeEvent]) -> bool {
    if events.len() < 2 {
        return false;
    }

    let gaps: Vec<f64> = events
        .windows(2)
        .map(|pair| (pair[1].timestamp - pair[0].timestamp) as f64)
        .collect();

    match mean_and_variance(&gaps) {
        Some((mean, variance)) => variance > mean * 0.5,
        None => false,
    }
}

/// Buy ratio strictly within (0.3, 0.7)
fn has_balanced_sides(events: &[TradeEvent]) -> bool {
    if events.is_empty() {
        return false;
    }
    let buys = events.iter().filter(|e| e.side.is_buy()).count();
    let buy_ratio = buys as f64 / events.len() as f64;
    buy_ratio > 0.3 && buy_ratio < 0.7
}

/// Spread of average trade size across repeat wallets
fn has_diverse_wallet_sizes(wallet_stats: &[WalletStat]) -> bool {
    let averages: Vec<f64> = wallet_stats
        .iter()
        .filter(|stat| stat.transaction_count > 1)
        .map(WalletStat::average_size)
        .collect();

    if averages.len() < 2 {
        return false;
    }

    match mean_and_variance(&averages) {
        Some((mean, variance)) => variance > mean * 0.2,
        None => false,
    }
}
