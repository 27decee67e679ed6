//! Error types for configuration, fetching, delivery and whole publish cycles.
//!
//! Only [`ConfigError`] is fatal, and only at startup. Every other error aborts
//! the cycle it happened in and is logged by the caller; nothing is retried.

use thiserror::Error;

/// Startup configuration problems. Reported before any network activity.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration value: {0}")]
    Missing(&'static str),

    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Failures of the search API call.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("search API request timed out")]
    Timeout,

    #[error("search API transport failure: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("search API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("search API returned malformed JSON: {0}")]
    Malformed(String),

    #[error("search API response carried no content")]
    EmptyContent,
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout
        } else if error.is_decode() {
            FetchError::Malformed(error.to_string())
        } else {
            FetchError::Transport(error)
        }
    }
}

/// Failures of the messaging delivery call.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery transport failure: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("delivery API returned HTTP {status}")]
    Status { status: u16 },

    #[error("message rejected by platform: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for DeliveryError {
    fn from(error: reqwest::Error) -> Self {
        // reqwest includes the request URL in its Display output, and the
        // delivery URL embeds the bot token.
        DeliveryError::Transport(error.without_url())
    }
}

/// Why a single publish cycle ended without a delivered message.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}
