//! Bridge configuration.
//!
//! Values come from an optional YAML file (`RA_STATE_CONFIG`, default
//! `ra-state.yaml`) and are then overridden by environment variables, so the
//! bridge runs with no file at all:
//!
//! | variable | field | default |
//! |---|---|---|
//! | `RA_STATE_URL` | `feed.url` | URL of `feed.site` |
//! | `RA_STATE_SITE` | `feed.site` | `mt_pleasant_26` |
//! | `RA_STATE_TOPIC_BASE` | `topics.base` | `telescope` |
//! | `MQTT_HOST` / `MQTT_PORT` | `mqtt.host` / `mqtt.port` | `localhost` / `1883` |
//! | `MQTT_CLIENT_ID` | `mqtt.client_id` | `ra-state-bridge` |
//! | `MQTT_USERNAME` / `MQTT_PASSWORD` | `mqtt.username` / `mqtt.password` | none |
//! | `RA_STATE_POLL_SECS` | `poll.interval_secs` | `60` |
//! | `RA_STATE_RETRY_SECS` | `poll.retry_secs` | `10` |
//! | `RA_STATE_DISCOVERY` | `discovery.enabled` | `true` |

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tokio::fs;
use tracing::info;

use crate::error::{BridgeError, Result};

pub const CONFIG_ENV: &str = "RA_STATE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "ra-state.yaml";

/// Status pages published by the ra-state site.
pub const KNOWN_SITES: &[(&str, &str)] = &[
    (
        "mt_pleasant_26",
        "http://ra-state.phys.utas.edu.au/cgi-bin/mt_pleasant_26_xml.pl",
    ),
    (
        "ceduna_30",
        "http://ra-state.phys.utas.edu.au/cgi-bin/ceduna_30_xml.pl",
    ),
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    pub feed: FeedConf,
    pub mqtt: MqttConf,
    pub topics: TopicConf,
    pub poll: PollConf,
    pub discovery: DiscoveryConf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConf {
    /// Site name, also used in the raw topic.
    pub site: String,
    /// Explicit feed URL; falls back to the known URL of `site`.
    pub url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive_secs: u64,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConf {
    pub base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConf {
    /// Delay after a published cycle.
    pub interval_secs: u64,
    /// Delay after a failed fetch (or a skipped invalid feed).
    pub retry_secs: u64,
    pub on_invalid_feed: InvalidFeedPolicy,
}

/// What to do when the feed was fetched but cannot be mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InvalidFeedPolicy {
    /// Log, wait the retry delay, carry on.
    #[default]
    Skip,
    /// Stop the bridge with the error.
    Exit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConf {
    pub enabled: bool,
    /// Home Assistant discovery prefix.
    pub prefix: String,
    /// Node id used in discovery topics and unique ids; defaults to the site.
    pub node_id: Option<String>,
}

impl Default for FeedConf {
    fn default() -> Self {
        Self {
            site: "mt_pleasant_26".into(),
            url: None,
            timeout_secs: 30,
        }
    }
}

impl Default for MqttConf {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            client_id: "ra-state-bridge".into(),
            keep_alive_secs: 30,
            username: None,
            password: None,
        }
    }
}

impl Default for TopicConf {
    fn default() -> Self {
        Self { base: "telescope".into() }
    }
}

impl Default for PollConf {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            retry_secs: 10,
            on_invalid_feed: InvalidFeedPolicy::Skip,
        }
    }
}

impl Default for DiscoveryConf {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: "homeassistant".into(),
            node_id: None,
        }
    }
}

impl FeedConf {
    /// URL to poll: the explicit one, else the known page of the site.
    pub fn url(&self) -> Result<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }
        KNOWN_SITES
            .iter()
            .find(|(site, _)| *site == self.site)
            .map(|(_, url)| url.to_string())
            .ok_or_else(|| {
                BridgeError::config(format!("unknown site '{}' and no feed.url set", self.site))
            })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PollConf {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn retry(&self) -> Duration {
        Duration::from_secs(self.retry_secs)
    }
}

impl DiscoveryConf {
    pub fn node_id<'a>(&'a self, site: &'a str) -> &'a str {
        self.node_id.as_deref().unwrap_or(site)
    }
}

impl BridgeConfig {
    /// Parse a YAML document. An empty document yields the defaults.
    pub fn from_yaml(txt: &str) -> Result<Self> {
        if txt.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(txt)?)
    }

    /// Load from a file; a missing file yields the defaults.
    pub async fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let txt = fs::read_to_string(path).await?;
        Self::from_yaml(&txt)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production, a map in tests).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("RA_STATE_URL") {
            self.feed.url = Some(v);
        }
        if let Some(v) = lookup("RA_STATE_SITE") {
            self.feed.site = v;
        }
        if let Some(v) = lookup("RA_STATE_TOPIC_BASE") {
            self.topics.base = v;
        }
        if let Some(v) = lookup("MQTT_HOST") {
            self.mqtt.host = v;
        }
        if let Some(v) = lookup("MQTT_PORT") {
            self.mqtt.port = parse_var("MQTT_PORT", &v)?;
        }
        if let Some(v) = lookup("MQTT_CLIENT_ID") {
            self.mqtt.client_id = v;
        }
        if let Some(v) = lookup("MQTT_USERNAME") {
            self.mqtt.username = Some(v);
        }
        if let Some(v) = lookup("MQTT_PASSWORD") {
            self.mqtt.password = Some(v);
        }
        if let Some(v) = lookup("RA_STATE_POLL_SECS") {
            self.poll.interval_secs = parse_var("RA_STATE_POLL_SECS", &v)?;
        }
        if let Some(v) = lookup("RA_STATE_RETRY_SECS") {
            self.poll.retry_secs = parse_var("RA_STATE_RETRY_SECS", &v)?;
        }
        if let Some(v) = lookup("RA_STATE_DISCOVERY") {
            self.discovery.enabled = parse_var("RA_STATE_DISCOVERY", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.feed.url()?;
        for (name, segment) in [("feed.site", &self.feed.site), ("topics.base", &self.topics.base)] {
            if segment.trim().is_empty() {
                return Err(BridgeError::config(format!("{name} must not be empty")));
            }
            if segment.contains(&['#', '+'][..]) {
                return Err(BridgeError::config(format!(
                    "{name} must not contain MQTT wildcards: {segment}"
                )));
            }
        }
        if self.feed.site.contains('/') {
            return Err(BridgeError::config("feed.site must be a single topic level"));
        }
        if self.poll.interval_secs == 0 || self.poll.retry_secs == 0 {
            return Err(BridgeError::config("poll intervals must be at least one second"));
        }
        if self.mqtt.client_id.is_empty() {
            return Err(BridgeError::config("mqtt.client_id must not be empty"));
        }
        // rumqttc panics on keep-alives below one second
        if self.mqtt.keep_alive_secs == 0 {
            return Err(BridgeError::config("mqtt.keep_alive_secs must be at least one second"));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| BridgeError::config(format!("invalid value for {name}: {value:?}")))
}

/// Load the config file named by `RA_STATE_CONFIG`, apply environment
/// overrides and validate.
pub async fn load_config() -> Result<BridgeConfig> {
    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let mut cfg = BridgeConfig::load_from(&path).await?;
    cfg.apply_env(|key| std::env::var(key).ok())?;
    cfg.validate()?;
    Ok(cfg)
}
