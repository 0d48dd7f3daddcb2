//! Moderation status client.
//!
//! One call asks the moderation endpoint once whether an uploaded asset has
//! been approved, rejected, or is still pending, and reads the answer into a
//! [`ModerationVerdict`]. There is no retry here: the poll loop owns pacing
//! and its deadline bounds how often this client is asked.
//!
//! # Wire Contract
//!
//! `POST {endpoint}` with the upload receipt's raw info record as the JSON
//! body. Response body: `{"status": "approved"|"rejected"|"pending",
//! "publicId"?, "poorQuality"?, "message"?}`.
//!
//! The HTTP status code is deliberately not consulted. A response whose
//! body carries no recognizable decision is `Pending` whatever the code;
//! only a transport-level failure becomes `NetworkError`.

use serde::Deserialize;
use thiserror::Error;
use url::Url;
use vitrine_types::{AssetId, ModerationVerdict, UploadReceipt};

use crate::http_client;

/// Reason used when the backend rejects without a message.
const REJECTED_FALLBACK_REASON: &str = "Image rejected by moderation.";

#[derive(Debug, Error)]
pub enum ModerationEndpointError {
    #[error("moderation endpoint is not a valid URL: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}

/// Client for one moderation status endpoint.
#[derive(Debug, Clone)]
pub struct ModerationClient {
    endpoint: Url,
    client: reqwest::Client,
}

impl ModerationClient {
    pub fn new(endpoint: &str) -> Result<Self, ModerationEndpointError> {
        Ok(Self::from_url(Url::parse(endpoint)?))
    }

    #[must_use]
    pub fn from_url(endpoint: Url) -> Self {
        Self {
            endpoint,
            client: http_client().clone(),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Ask the endpoint once for the asset's moderation status.
    ///
    /// Every outcome is data: transport failures come back as
    /// [`ModerationVerdict::NetworkError`], not `Err`, so the poll loop
    /// branches on one shape.
    pub async fn check(&self, receipt: &UploadReceipt) -> ModerationVerdict {
        let response = match self
            .client
            .post(self.endpoint.clone())
            .json(&receipt.info)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Moderation status request failed");
                return ModerationVerdict::NetworkError {
                    reason: e.to_string(),
                };
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read moderation response body");
                return ModerationVerdict::NetworkError {
                    reason: e.to_string(),
                };
            }
        };

        match serde_json::from_str::<StatusPayload>(&body) {
            Ok(payload) => verdict_from_payload(receipt, payload),
            Err(e) => {
                tracing::debug!(
                    %status,
                    error = %e,
                    "Unreadable moderation payload, treating as pending"
                );
                ModerationVerdict::Pending
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusPayload {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    public_id: Option<String>,
    #[serde(default)]
    poor_quality: Option<bool>,
    #[serde(default)]
    message: Option<String>,
}

fn verdict_from_payload(receipt: &UploadReceipt, payload: StatusPayload) -> ModerationVerdict {
    match payload.status.as_deref() {
        Some("approved") => {
            // The backend may echo a different id than the upload reported;
            // prefer its answer, fall back to the receipt's.
            let asset_id = payload
                .public_id
                .and_then(|id| AssetId::new(id).ok())
                .unwrap_or_else(|| receipt.asset_id.clone());
            ModerationVerdict::Approved {
                asset_id,
                poor_quality: payload.poor_quality.unwrap_or(false),
            }
        }
        Some("rejected") => ModerationVerdict::Rejected {
            reason: payload
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| REJECTED_FALLBACK_REASON.to_string()),
        },
        _ => ModerationVerdict::Pending,
    }
}
