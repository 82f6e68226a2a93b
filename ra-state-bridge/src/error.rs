//! Error types for the bridge.
//!
//! One enum covers every failure a poll cycle can hit. The loop only needs to
//! know whether a failure is a transport hiccup (skip and retry soon) or an
//! invalid feed (handled per the configured policy); everything else stops the
//! bridge.

use thiserror::Error;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// Transport failure while fetching the feed.
    #[error("Feed request failed: {0}")]
    Fetch(#[from] reqwest::Error),

    /// Feed answered with something other than 200.
    #[error("Feed returned HTTP {status}")]
    HttpStatus { status: u16 },

    /// Feed body is not valid UTF-8.
    #[error("Feed is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// Feed body is not well-formed XML.
    #[error("Malformed feed: {0}")]
    Xml(#[from] roxmltree::Error),

    /// A field the standard record needs is absent from the feed.
    #[error("Missing feed field: {path}")]
    MissingField { path: String },

    /// A numeric field does not hold a finite float literal.
    #[error("Invalid number in {path}: {value:?}")]
    InvalidNumber { path: String, value: String },

    /// JSON serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The MQTT client refused a publish request.
    #[error("Failed to publish to {topic}: {message}")]
    Publish { topic: String, message: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub fn missing(path: impl Into<String>) -> Self {
        Self::MissingField { path: path.into() }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for failures that mean "no data this cycle", where the loop backs
    /// off briefly and tries again.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::HttpStatus { .. })
    }

    /// True when the feed was fetched but could not be turned into a record.
    pub fn is_invalid_feed(&self) -> bool {
        matches!(
            self,
            Self::Encoding(_) | Self::Xml(_) | Self::MissingField { .. } | Self::InvalidNumber { .. }
        )
    }
}

impl From<serde_yaml::Error> for BridgeError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}
