//! Feed error types.

use eventfeed_core::{AppError, ConfigError, NetworkError, ReqwestErrorExt};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Upstream returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Upstream request failed: {0}")]
    UpstreamTransport(#[from] reqwest::Error),

    #[error("Upstream response could not be decoded: {0}")]
    UpstreamDecode(String),
}

impl From<ConfigError> for FeedError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<FeedError> for AppError {
    fn from(err: FeedError) -> Self {
        match err.network_error() {
            Some(network) => AppError::Network(network),
            None => AppError::Config(ConfigError::MissingSetting(err.to_string())),
        }
    }
}

/// JSON error body returned to feed consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl FeedError {
    /// Message safe to expose to feed consumers.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "Server configuration error: Missing credentials",
            Self::UpstreamStatus { .. } | Self::UpstreamTransport(_) | Self::UpstreamDecode(_) => {
                "Failed to fetch events"
            }
        }
    }

    pub fn error_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.user_message().to_string(),
        }
    }

    /// Whether the failure came from the upstream API rather than local setup.
    pub fn is_upstream(&self) -> bool {
        !matches!(self, Self::Configuration(_))
    }

    /// Upstream HTTP status, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UpstreamStatus { status, .. } => Some(*status),
            Self::UpstreamTransport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Network classification for operator diagnostics.
    pub fn network_error(&self) -> Option<NetworkError> {
        match self {
            Self::Configuration(_) => None,
            Self::UpstreamStatus { status, body } => Some(NetworkError::ServerError {
                status: *status,
                message: body.clone(),
            }),
            Self::UpstreamTransport(e) => Some(e.to_network_error()),
            Self::UpstreamDecode(msg) => Some(NetworkError::InvalidResponse(msg.clone())),
        }
    }
}
