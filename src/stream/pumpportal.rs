//! PumpPortal WebSocket trade feed
//!
//! Subscribes to trades on every tracked token and records them into a
//! [`TradeBuffer`] the tracking engine reads on each tick.
//!
//! WebSocket endpoint: wss://pumpportal.fun/api/data
//! Documentation: https://pumpportal.fun/data-api/real-time

use async_trait::async_trait;
use dashmap::DashSet;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::source::{TradeBuffer, TradeSource};
use crate::error::{Error, Result};
use crate::organic::{TradeEvent, TradeSide};

/// PumpPortal WebSocket URL
pub const PUMPPORTAL_WS_URL: &str = "wss://pumpportal.fun/api/data";

/// Characters of an unrecognized message kept in logs
const LOG_PREVIEW_CHARS: usize = 100;

/// First `LOG_PREVIEW_CHARS` characters of a message, cut on a char boundary
fn preview(text: &str) -> &str {
    match text.char_indices().nth(LOG_PREVIEW_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Subscription request sent over the socket
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionMessage {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<String>>,
}

impl SubscriptionMessage {
    /// Subscribe to trades on specific tokens
    pub fn subscribe_token_trades(mints: Vec<String>) -> Self {
        Self {
            method: "subscribeTokenTrade".to_string(),
            keys: Some(mints),
        }
    }

    /// Unsubscribe from token trades
    pub fn unsubscribe_token_trades(mints: Vec<String>) -> Self {
        Self {
            method: "unsubscribeTokenTrade".to_string(),
            keys: Some(mints),
        }
    }
}

/// Trade message from PumpPortal
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeMessage {
    #[serde(default)]
    pub signature: String,
    pub mint: String,
    pub trader_public_key: String,
    pub tx_type: String,
    pub token_amount: f64,
    pub sol_amount: f64,
    #[serde(default)]
    pub market_cap_sol: f64,
}

impl TradeMessage {
    fn side(&self) -> Option<TradeSide> {
        match self.tx_type.as_str() {
            "buy" => Some(TradeSide::Buy),
            "sell" => Some(TradeSide::Sell),
            _ => None,
        }
    }

    /// Convert to a trade event stamped with the receive time.
    /// Returns None for non-trade messages such as token creation.
    pub fn into_trade_event(self, received_at: i64) -> Option<(String, TradeEvent)> {
        let side = self.side()?;
        let amount = self.token_amount.max(0.0);

        let mut event = TradeEvent::new(self.trader_public_key, amount, received_at, side);
        if amount > 0.0 && self.sol_amount > 0.0 {
            event = event.with_price(self.sol_amount / amount);
        }

        Some((self.mint, event))
    }
}

/// Configuration for the PumpPortal feed
#[derive(Debug, Clone, Deserialize)]
pub struct PumpPortalConfig {
    /// WebSocket URL (default: wss://pumpportal.fun/api/data)
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Reconnect delay in milliseconds
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Maximum reconnect attempts (0 = infinite)
    #[serde(default)]
    pub max_reconnect_attempts: u32,
    /// Ping interval in seconds
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    /// How long received trades are kept per token
    #[serde(default = "default_trade_retention_secs")]
    pub trade_retention_secs: u64,
}

fn default_ws_url() -> String {
    PUMPPORTAL_WS_URL.to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_trade_retention_secs() -> u64 {
    24 * 60 * 60
}

impl Default for PumpPortalConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_attempts: 0, // Infinite
            ping_interval_secs: default_ping_interval_secs(),
            trade_retention_secs: default_trade_retention_secs(),
        }
    }
}

/// Subscription change requested by the tracking engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedCommand {
    Subscribe(String),
    Unsubscribe(String),
}

/// PumpPortal trade feed backed by a [`TradeBuffer`]
pub struct PumpPortalFeed {
    config: PumpPortalConfig,
    buffer: Arc<TradeBuffer>,
    subscriptions: Arc<DashSet<String>>,
    /// Set while a socket is open; commands are only queued then
    connected: Arc<AtomicBool>,
    command_tx: mpsc::UnboundedSender<FeedCommand>,
    command_rx: Mutex<Option<mpsc::UnboundedReceiver<FeedCommand>>>,
    shutdown: CancellationToken,
}

impl PumpPortalFeed {
    pub fn new(config: PumpPortalConfig) -> Self {
        let retention_ms = (config.trade_retention_secs as i64).saturating_mul(1000);
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        Self {
            config,
            buffer: Arc::new(TradeBuffer::new(retention_ms)),
            subscriptions: Arc::new(DashSet::new()),
            connected: Arc::new(AtomicBool::new(false)),
            command_tx,
            command_rx: Mutex::new(Some(command_rx)),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn buffer(&self) -> &Arc<TradeBuffer> {
        &self.buffer
    }

    /// Tokens currently subscribed
    pub fn subscriptions(&self) -> Vec<String> {
        let mut tokens: Vec<String> = self.subscriptions.iter().map(|t| t.key().clone()).collect();
        tokens.sort();
        tokens
    }

    /// Start the WebSocket connection loop
    pub fn start(&self) -> Result<JoinHandle<()>> {
        let mut command_rx = self
            .command_rx
            .lock()
            .map_err(|_| Error::Internal("Feed command lock poisoned".to_string()))?
            .take()
            .ok_or_else(|| Error::Internal("PumpPortal feed already started".to_string()))?;

        info!("Starting PumpPortal WebSocket feed...");
        info!("URL: {}", self.config.ws_url);

        let config = self.config.clone();
        let buffer = self.buffer.clone();
        let subscriptions = self.subscriptions.clone();
        let connected = self.connected.clone();
        let shutdown = self.shutdown.clone();

        Ok(tokio::spawn(async move {
            let mut reconnect_attempts = 0u32;

            loop {
                if shutdown.is_cancelled() {
                    break;
                }

                let result = Self::connect_and_stream(
                    &config,
                    &buffer,
                    &subscriptions,
                    &connected,
                    &mut command_rx,
                    &shutdown,
                )
                .await;
                connected.store(false, Ordering::SeqCst);

                match result {
                    Ok(_) => {
                        reconnect_attempts = 0;
                    }
                    Err(e) => {
                        error!("PumpPortal WebSocket error: {}", e);
                        reconnect_attempts += 1;

                        if config.max_reconnect_attempts > 0
                            && reconnect_attempts >= config.max_reconnect_attempts
                        {
                            error!(
                                "Max reconnect attempts ({}) reached",
                                config.max_reconnect_attempts
                            );
                            break;
                        }
                    }
                }

                if shutdown.is_cancelled() {
                    break;
                }

                let delay = Duration::from_millis(config.reconnect_delay_ms);
                warn!("Reconnecting in {:?}...", delay);
                tokio::select! {
                    _ = sleep(delay) => {}
                    _ = shutdown.cancelled() => break,
                }
            }

            info!("PumpPortal feed shutting down");
        }))
    }

    /// Stop the feed
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    async fn connect_and_stream(
        config: &PumpPortalConfig,
        buffer: &TradeBuffer,
        subscriptions: &DashSet<String>,
        connected: &AtomicBool,
        command_rx: &mut mpsc::UnboundedReceiver<FeedCommand>,
        shutdown: &CancellationToken,
    ) -> Result<()> {
        info!("Connecting to PumpPortal WebSocket...");

        let url = url::Url::parse(&config.ws_url)
            .map_err(|e| Error::Config(format!("Invalid WebSocket URL: {}", e)))?;

        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::StreamConnection(format!("WebSocket connect failed: {}", e)))?;

        info!("Connected to PumpPortal WebSocket");

        let (mut write, mut read) = ws_stream.split();

        // Commands queued while disconnected are covered by the resubscribe below
        while command_rx.try_recv().is_ok() {}

        // Raised before the snapshot so a token tracked after it is sent as a command
        connected.store(true, Ordering::SeqCst);

        // Restore subscriptions after a reconnect
        let tokens: Vec<String> = subscriptions.iter().map(|t| t.key().clone()).collect();
        if !tokens.is_empty() {
            let count = tokens.len();
            let json = serde_json::to_string(&SubscriptionMessage::subscribe_token_trades(tokens))?;
            write
                .send(Message::Text(json))
                .await
                .map_err(|e| Error::StreamConnection(format!("Failed to subscribe: {}", e)))?;
            info!("Subscribed to trades on {} token(s)", count);
        }

        let ping_interval = Duration::from_secs(config.ping_interval_secs.max(1));
        let mut ping_timer = tokio::time::interval(ping_interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }

                _ = ping_timer.tick() => {
                    if let Err(e) = write.send(Message::Ping(vec![])).await {
                        return Err(Error::StreamConnection(format!("Failed to send ping: {}", e)));
                    }
                    debug!("Sent ping");
                }

                Some(command) = command_rx.recv() => {
                    let msg = match &command {
                        FeedCommand::Subscribe(token) => {
                            SubscriptionMessage::subscribe_token_trades(vec![token.clone()])
                        }
                        FeedCommand::Unsubscribe(token) => {
                            SubscriptionMessage::unsubscribe_token_trades(vec![token.clone()])
                        }
                    };
                    let json = serde_json::to_string(&msg)?;
                    write
                        .send(Message::Text(json))
                        .await
                        .map_err(|e| Error::StreamConnection(format!("Failed to send {}: {}", msg.method, e)))?;
                    debug!(command = ?command, "Sent subscription update");
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Err(e) = Self::handle_message(&text, buffer, subscriptions) {
                                warn!("Failed to handle message: {}", e);
                            }
                        }
                        Some(Ok(Message::Pong(_))) => {
                            debug!("Received pong");
                        }
                        Some(Ok(Message::Close(_))) => {
                            info!("WebSocket closed by server");
                            return Err(Error::StreamDisconnected);
                        }
                        Some(Err(e)) => {
                            return Err(Error::StreamConnection(format!("WebSocket error: {}", e)));
                        }
                        None => {
                            info!("WebSocket stream ended");
                            return Err(Error::StreamDisconnected);
                        }
                        _ => {}
                    }
                }
            }
        }

        Ok(())
    }

    /// Record a trade message into the buffer if it belongs to a subscribed token
    fn handle_message(text: &str, buffer: &TradeBuffer, subscriptions: &DashSet<String>) -> Result<()> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| Error::StreamDecode(e.to_string()))?;

        if value.get("txType").is_none() {
            // Subscription acknowledgements and notices
            debug!("Non-trade message: {}", preview(text));
            return Ok(());
        }

        let trade: TradeMessage =
            serde_json::from_value(value).map_err(|e| Error::StreamDecode(e.to_string()))?;

        let received_at = chrono::Utc::now().timestamp_millis();
        let Some((mint, event)) = trade.into_trade_event(received_at) else {
            return Ok(());
        };

        if !subscriptions.contains(&mint) {
            return Ok(());
        }

        debug!(
            token = %mint,
            side = %event.side,
            amount = event.amount,
            wallet = %event.wallet,
            "Trade"
        );
        buffer.record(&mint, event);
        Ok(())
    }
}

#[async_trait]
impl TradeSource for PumpPortalFeed {
    fn name(&self) -> &'static str {
        "pumpportal"
    }

    async fn recent_trades(&self, token: &str) -> Result<Vec<TradeEvent>> {
        Ok(self.buffer.snapshot(token))
    }

    async fn on_track(&self, token: &str) {
        // While disconnected the next connect resubscribes every token
        if self.subscriptions.insert(token.to_string()) && self.connected.load(Ordering::SeqCst) {
            let _ = self.command_tx.send(FeedCommand::Subscribe(token.to_string()));
        }
    }

    async fn on_untrack(&self, token: &str) {
        if self.subscriptions.remove(token).is_some() && self.connected.load(Ordering::SeqCst) {
            let _ = self.command_tx.send(FeedCommand::Unsubscribe(token.to_string()));
        }
        self.buffer.forget(token);
    }
}
