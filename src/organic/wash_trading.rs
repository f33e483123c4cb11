//! Wash trading detection
//!
//! Three independent heuristics, any one of which flags the batch:
//! 1. Rapid round-trips: the same wallet flipping buy/sell in adjacent trades
//!    less than a minute apart, more than 3 times
//! 2. One-sided wallets: a wallet with more than 5 trades that never sells
//!    (or never buys)
//! 3. Abnormal density: more than 20 trades per unique wallet
//!
//! Only adjacent trades are compared for round-trips, so a round-trip
//! interleaved with a third party's trade is not counted.

use std::collections::HashMap;
use tracing::debug;

use super::types::{TradeEvent, WalletStat, WashTradingSignal};

/// Maximum gap between the two legs of a round-trip
pub const ROUND_TRIP_WINDOW_MS: i64 = 60_000;
/// Round-trips per wallet pair tolerated before flagging
pub const MAX_ROUND_TRIPS: u32 = 3;
/// Trades a wallet may make on one side only before flagging
pub const MAX_ONE_SIDED_TRADES: u32 = 5;
/// Trades per unique wallet tolerated before flagging
pub const MAX_TRADES_PER_WALLET: f64 = 20.0;

/// Run every heuristic and collect the signals that fired
pub fn detect(events: &[TradeEvent], wallet_stats: &[WalletStat]) -> Vec<WashTradingSignal> {
    let mut signals = check_rapid_round_trips(events);
    signals.extend(check_one_sided_wallets(wallet_stats));

    if let Some(signal) = check_density(events.len(), wallet_stats.len()) {
        signals.push(signal);
    }

    if !signals.is_empty() {
        debug!(count = signals.len(), signals = ?signals, "Wash trading signals fired");
    }

    signals
}

/// Count quick side flips between adjacent trades of the same wallet
fn check_rapid_round_trips(events: &[TradeEvent]) -> Vec<WashTradingSignal> {
    let mut round_trips: HashMap<(&str, &str), u32> = HashMap::new();

    for pair in events.windows(2) {
        let (first, second) = (&pair[0], &pair[1]);

        if first.wallet == second.wallet && first.side != second.side {
            let gap = second.timestamp - first.timestamp;
            if gap < ROUND_TRIP_WINDOW_MS {
                *round_trips
                    .entry((first.wallet.as_str(), second.wallet.as_str()))
                    .or_insert(0) += 1;
            }
        }
    }

    let mut flagged: Vec<_> = round_trips
        .into_iter()
        .filter(|(_, count)| *count > MAX_ROUND_TRIPS)
        .collect();
    flagged.sort_by(|a, b| a.0.cmp(&b.0));

    flagged
        .into_iter()
        .map(|((wallet, _), count)| WashTradingSignal::RapidRoundTrip {
            wallet: wallet.to_string(),
            round_trips: count,
        })
        .collect()
}

fn check_one_sided_wallets(wallet_stats: &[WalletStat]) -> Vec<WashTradingSignal> {
    wallet_stats
        .iter()
        .filter(|stat| stat.transaction_count > MAX_ONE_SIDED_TRADES && stat.is_one_sided())
        .map(|stat| WashTradingSignal::OneSidedWallet {
            wallet: stat.wallet.clone(),
            transaction_count: stat.transaction_count,
        })
        .collect()
}

fn check_density(transaction_count: usize, unique_wallets: usize) -> Option<WashTradingSignal> {
    if unique_wallets == 0 {
        return None;
    }

    let per_wallet = transaction_count as f64 / unique_wallets as f64;
    if per_wallet > MAX_TRADES_PER_WALLET {
        Some(WashTradingSignal::AbnormalDensity {
            transactions_per_wallet: per_wallet,
        })
    } else {
        None
    }
}
