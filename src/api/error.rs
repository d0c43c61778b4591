use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

/// The normalized error shape every API operation fails with.
///
/// All failures funnel through here regardless of which endpoint produced
/// them: transport errors (no response at all) normalize to status 500,
/// non-2xx responses keep their status and prefer the server-provided
/// `message` field over the generic fallback.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} (status {status})")]
pub struct ApiError {
    /// HTTP status code, or 500 when no response was received.
    pub status: u16,
    /// Human-readable description, preferring the server's message.
    pub message: String,
    /// When the failure was observed client-side.
    pub timestamp: DateTime<Utc>,
}

/// Structured error body the backend sends with non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

const GENERIC_MESSAGE: &str = "An unknown error occurred";

impl ApiError {
    /// Normalizes a non-2xx response from its status code and raw body.
    #[must_use]
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|body| body.message)
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| GENERIC_MESSAGE.to_string());

        Self {
            status,
            message,
            timestamp: Utc::now(),
        }
    }

    /// Normalizes a transport-level failure (no response received).
    #[must_use]
    pub fn from_transport(error: &reqwest::Error) -> Self {
        // No response means no status to report; 500 mirrors how the
        // backend's own unexpected failures surface.
        Self {
            status: error.status().map_or(500, |status| status.as_u16()),
            message: error.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Normalizes a body that claimed success but failed to decode.
    #[must_use]
    pub fn from_decode(error: &serde_json::Error) -> Self {
        Self {
            status: 500,
            message: format!("Failed to decode response: {error}"),
            timestamp: Utc::now(),
        }
    }

    /// Whether this failure is the backend saying the resource is absent.
    ///
    /// Pages render this case as a dedicated "not found" state rather than
    /// the generic error banner.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}
