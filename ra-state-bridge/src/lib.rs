//! ra-state bridge
//!
//! Polls the ra-state XML status page of a radio telescope and republishes it
//! over MQTT:
//! - `<base>/status`: retained `online` / `offline`, backed by the last-will
//! - `<base>/<site>/json`: the whole feed, normalized
//! - `<base>/atnf_json`: the standard monitoring record
//!
//! Optionally announces Home Assistant discovery configs for the standard
//! record fields.

pub mod bridge;
pub mod broker;
pub mod config;
pub mod discovery;
pub mod error;
pub mod feed;
pub mod fetcher;
pub mod liveness;
pub mod record;

pub use bridge::{CycleOutcome, FeedBridge};
pub use broker::{MqttPublisher, Publish, Topics};
pub use config::{load_config, BridgeConfig, InvalidFeedPolicy};
pub use error::{BridgeError, Result};
pub use feed::{FeedEntry, RawFeedTree};
pub use fetcher::{FeedSource, HttpFetcher};
pub use liveness::Presence;
pub use record::StandardRecord;
