//! Online/offline presence on the status topic.
//!
//! The broker holds a retained `offline` as the session's last-will, so an
//! unclean drop flips the status without the bridge's help. The bridge itself
//! publishes a retained `online` on every connection and a retained `offline`
//! before a clean shutdown, since a clean disconnect discards the will.

use rumqttc::{LastWill, QoS};
use tracing::info;

use crate::broker::{Publish, Topics};
use crate::error::Result;

pub const ONLINE: &str = "online";
pub const OFFLINE: &str = "offline";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Online,
    Offline,
}

impl Presence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Presence::Online => ONLINE,
            Presence::Offline => OFFLINE,
        }
    }
}

/// Last-will registered with the broker before connecting.
pub fn last_will(topics: &Topics) -> LastWill {
    LastWill::new(topics.status(), OFFLINE, QoS::AtLeastOnce, true)
}

/// Publish the retained presence marker.
pub async fn announce<P: Publish>(publisher: &P, topics: &Topics, presence: Presence) -> Result<()> {
    let topic = topics.status();
    publisher
        .publish(&topic, presence.as_str().as_bytes().to_vec(), true)
        .await?;
    info!(topic = %topic, status = presence.as_str(), "Presence announced");
    Ok(())
}
