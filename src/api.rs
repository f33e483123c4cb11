//! Query and command surface over the tracking engine
//!
//! Every call returns an [`ApiResponse`] envelope so results can be handed
//! straight to a transport layer as JSON.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Error;
use crate::organic::OrganicAnalysis;
use crate::tracking::{
    BotStatus, TokenVolumeState, TrackingEngine, VolumeHistoryRecord, VolumeSpikeRecord,
};

/// Uniform response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            message: Some(message.into()),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message: None,
        }
    }
}

impl<T> From<Error> for ApiResponse<T> {
    fn from(e: Error) -> Self {
        if !e.is_input_error() {
            warn!("Request failed: {}", e);
        }
        match e {
            Error::TokenNotFound(_) => Self::error("Token not found"),
            Error::InvalidInput(reason) => Self::error(reason),
            other => Self::error(other.to_string()),
        }
    }
}

/// Token volume state together with its latest organic analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDetail {
    #[serde(flatten)]
    pub volume: TokenVolumeState,
    pub organic_analysis: Option<OrganicAnalysis>,
}

/// Call-through API over a [`TrackingEngine`]
#[derive(Clone)]
pub struct VolumeApi {
    engine: TrackingEngine,
}

impl VolumeApi {
    pub fn new(engine: TrackingEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &TrackingEngine {
        &self.engine
    }

    pub async fn status(&self) -> ApiResponse<BotStatus> {
        ApiResponse::ok(self.engine.status().await)
    }

    pub async fn tokens(&self) -> ApiResponse<Vec<TokenVolumeState>> {
        ApiResponse::ok(self.engine.volume_of(None).await)
    }

    pub async fn token(&self, address: &str) -> ApiResponse<TokenDetail> {
        let Some(volume) = self.engine.volume_of(Some(address)).await.into_iter().next() else {
            debug!(token = %address, "Token lookup missed");
            return Error::TokenNotFound(address.to_string()).into();
        };

        let organic_analysis = self.engine.organic_analysis_of(address).await;
        ApiResponse::ok(TokenDetail {
            volume,
            organic_analysis,
        })
    }

    pub async fn spikes(&self) -> ApiResponse<Vec<VolumeSpikeRecord>> {
        ApiResponse::ok(self.engine.spikes().await)
    }

    pub async fn organic(&self) -> ApiResponse<Vec<TokenVolumeState>> {
        ApiResponse::ok(self.engine.organic_tokens().await)
    }

    pub async fn history(&self, address: Option<&str>) -> ApiResponse<Vec<VolumeHistoryRecord>> {
        ApiResponse::ok(self.engine.history(address).await)
    }

    pub async fn track(&self, address: Option<&str>) -> ApiResponse<()> {
        match required_address(address) {
            Ok(address) => {
                self.engine.track(address).await;
                ApiResponse::message("Token added to tracking")
            }
            Err(e) => e.into(),
        }
    }

    pub async fn untrack(&self, address: Option<&str>) -> ApiResponse<()> {
        match required_address(address) {
            Ok(address) => {
                self.engine.untrack(address).await;
                ApiResponse::message("Token removed from tracking")
            }
            Err(e) => e.into(),
        }
    }

    pub fn start(&self) -> ApiResponse<()> {
        self.engine.start();
        ApiResponse::message("Volume bot started")
    }

    pub fn stop(&self) -> ApiResponse<()> {
        self.engine.stop();
        ApiResponse::message("Volume bot stopped")
    }
}

fn required_address(address: Option<&str>) -> Result<&str, Error> {
    address
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| Error::InvalidInput("Token address is required".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OrganicConfig, VolumeConfig};
    use crate::organic::TradeEvent;
    use crate::stream::TradeBuffer;
    use std::sync::Arc;

    fn api() -> (VolumeApi, Arc<TradeBuffer>) {
        let buffer = Arc::new(TradeBuffer::default());
        let engine = TrackingEngine::new(VolumeConfig::default(), OrganicConfig::default(), buffer.clone());
        (VolumeApi::new(engine), buffer)
    }

    #[tokio::test]
    async fn test_track_requires_address() {
        let (api, _) = api();

        for address in [None, Some(""), Some("   ")] {
            let response = api.track(address).await;
            assert!(!response.success);
            assert_eq!(response.error.as_deref(), Some("Token address is required"));

            let response = api.untrack(address).await;
            assert_eq!(response.error.as_deref(), Some("Token address is required"));
        }

        let response = api.track(Some("mint1")).await;
        assert!(response.success);
        assert_eq!(response.message.as_deref(), Some("Token added to tracking"));
        assert_eq!(api.status().await.data.unwrap().tracked_tokens, 1);
    }

    #[tokio::test]
    async fn test_token_lookup() {
        let (api, buffer) = api();
        let now = chrono::Utc::now().timestamp_millis();

        let missing = api.token("mint1").await;
        assert!(!missing.success);
        assert_eq!(missing.error.as_deref(), Some("Token not found"));

        api.track(Some("mint1")).await;
        buffer.record("mint1", TradeEvent::buy("a", 10.0, now).with_price(0.5));
        api.engine().tick_at(now).await;

        let found = api.token("mint1").await;
        assert!(found.success);
        let detail = found.data.unwrap();
        assert_eq!(detail.volume.volume_5m, 10.0);
        assert!(detail.organic_analysis.is_some());

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["address"], "mint1");
        assert!(json["organicAnalysis"]["organicScore"].is_number());
    }

    #[tokio::test]
    async fn test_start_stop_messages() {
        let (api, _) = api();
        assert_eq!(api.start().message.as_deref(), Some("Volume bot started"));
        assert!(api.status().await.data.unwrap().is_running);
        assert_eq!(api.stop().message.as_deref(), Some("Volume bot stopped"));
        api.engine().shutdown().await;
    }

    #[test]
    fn test_envelope_serialization() {
        let response: ApiResponse<()> = ApiResponse::message("Volume bot stopped");
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"success":true,"message":"Volume bot stopped"}"#);

        let response: ApiResponse<Vec<u32>> = ApiResponse::ok(vec![]);
        assert_eq!(serde_json::to_string(&response).unwrap(), r#"{"success":true,"data":[]}"#);
    }
}
