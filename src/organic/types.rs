//! Types shared by the organic trading analyzer

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn is_buy(&self) -> bool {
        matches!(self, TradeSide::Buy)
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "buy"),
            TradeSide::Sell => write!(f, "sell"),
        }
    }
}

/// A single observed trade on a token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    /// Trader wallet address
    pub wallet: String,
    /// Token-denominated amount (non-negative)
    pub amount: f64,
    /// Milliseconds since epoch
    pub timestamp: i64,
    pub side: TradeSide,
    /// Quote price per token, when the source reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

impl TradeEvent {
    pub fn new(wallet: impl Into<String>, amount: f64, timestamp: i64, side: TradeSide) -> Self {
        Self {
            wallet: wallet.into(),
            amount,
            timestamp,
            side,
            price: None,
        }
    }

    pub fn buy(wallet: impl Into<String>, amount: f64, timestamp: i64) -> Self {
        Self::new(wallet, amount, timestamp, TradeSide::Buy)
    }

    pub fn sell(wallet: impl Into<String>, amount: f64, timestamp: i64) -> Self {
        Self::new(wallet, amount, timestamp, TradeSide::Sell)
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }
}

/// Per-wallet aggregate within one analysis batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalletStat {
    pub wallet: String,
    pub total_volume: f64,
    pub transaction_count: u32,
    pub buy_count: u32,
    pub sell_count: u32,
}

impl WalletStat {
    /// Average trade size for this wallet
    pub fn average_size(&self) -> f64 {
        if self.transaction_count == 0 {
            return 0.0;
        }
        self.total_volume / self.transaction_count as f64
    }

    /// Only buys or only sells
    pub fn is_one_sided(&self) -> bool {
        self.buy_count == 0 || self.sell_count == 0
    }
}

/// Reason a batch was flagged as wash trading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WashTradingSignal {
    /// A wallet flipped sides in consecutive trades too often within a minute
    RapidRoundTrip { wallet: String, round_trips: u32 },
    /// A busy wallet that only buys or only sells
    OneSidedWallet { wallet: String, transaction_count: u32 },
    /// Too many transactions per unique wallet
    AbnormalDensity { transactions_per_wallet: f64 },
}

/// Result of one organic analysis pass for one token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganicAnalysis {
    pub token_address: String,
    /// 0-100, two decimal places
    pub organic_score: f64,
    pub unique_wallets: u32,
    pub transaction_count: u32,
    /// Share of volume from the top wallet, 0-1
    pub wallet_concentration: f64,
    pub is_wash_trading: bool,
    /// Naturalness of the trading pattern, 0-1
    pub pattern_score: f64,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wash_signals: Vec<WashTradingSignal>,
}

impl OrganicAnalysis {
    /// Conservative result for a batch with no trades
    pub fn empty(token_address: &str, timestamp: i64) -> Self {
        Self {
            token_address: token_address.to_string(),
            organic_score: 0.0,
            unique_wallets: 0,
            transaction_count: 0,
            wallet_concentration: 1.0,
            is_wash_trading: true,
            pattern_score: 0.0,
            timestamp,
            wash_signals: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_event_deserialize() {
        let json = r#"{"wallet":"walletA","amount":12.5,"timestamp":1700000000000,"side":"sell"}"#;
        let event: TradeEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.wallet, "walletA");
        assert_eq!(event.side, TradeSide::Sell);
        assert!(event.price.is_none());
    }

    #[test]
    fn test_wallet_stat_helpers() {
        let stat = WalletStat {
            wallet: "w".to_string(),
            total_volume: 30.0,
            transaction_count: 3,
            buy_count: 3,
            sell_count: 0,
        };
        assert_eq!(stat.average_size(), 10.0);
        assert!(stat.is_one_sided());
        assert_eq!(WalletStat::default().average_size(), 0.0);
    }

    #[test]
    fn test_empty_analysis_is_conservative() {
        let analysis = OrganicAnalysis::empty("mint1", 42);
        assert_eq!(analysis.organic_score, 0.0);
        assert_eq!(analysis.wallet_concentration, 1.0);
        assert!(analysis.is_wash_trading);
        assert_eq!(analysis.unique_wallets, 0);
    }

    #[test]
    fn test_analysis_serializes_camel_case() {
        let analysis = OrganicAnalysis::empty("mint1", 42);
        let json = serde_json::to_string(&analysis).unwrap();
        assert!(json.contains("\"organicScore\""));
        assert!(json.contains("\"isWashTrading\":true"));
        assert!(!json.contains("washSignals"));
    }
}
