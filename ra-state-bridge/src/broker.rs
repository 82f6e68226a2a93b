//! MQTT glue: topic layout, the publish seam and the client event loop.

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::MqttConf;
use crate::error::{BridgeError, Result};
use crate::liveness::{self, Presence};

/// Anything the bridge can publish through.
pub trait Publish {
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        retain: bool,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Topic names derived from the configured base and site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    base: String,
    site: String,
}

impl Topics {
    pub fn new(base: impl Into<String>, site: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            site: site.into(),
        }
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    /// Retained `online` / `offline`.
    pub fn status(&self) -> String {
        format!("{}/status", self.base)
    }

    /// Full normalized feed.
    pub fn raw(&self) -> String {
        format!("{}/{}/json", self.base, self.site)
    }

    /// Standard record.
    pub fn standard(&self) -> String {
        format!("{}/atnf_json", self.base)
    }
}

/// rumqttc client behind the [`Publish`] seam.
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
    qos: QoS,
}

impl MqttPublisher {
    /// Clean disconnect; the broker drops the last-will.
    pub async fn disconnect(&self) -> Result<()> {
        self.client
            .disconnect()
            .await
            .map_err(|e| BridgeError::Publish {
                topic: "<disconnect>".into(),
                message: e.to_string(),
            })
    }
}

impl Publish for MqttPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<()> {
        self.client
            .publish(topic, self.qos, retain, payload)
            .await
            .map_err(|e| BridgeError::Publish {
                topic: topic.to_string(),
                message: e.to_string(),
            })
    }
}

/// Client options, with the offline last-will registered before connecting.
pub fn mqtt_options(cfg: &MqttConf, topics: &Topics) -> MqttOptions {
    let mut opts = MqttOptions::new(&cfg.client_id, &cfg.host, cfg.port);
    opts.set_keep_alive(Duration::from_secs(cfg.keep_alive_secs));
    opts.set_clean_session(true);
    if let Some(username) = &cfg.username {
        opts.set_credentials(username, cfg.password.clone().unwrap_or_default());
    }
    opts.set_last_will(liveness::last_will(topics));
    opts
}

/// Build the client. Nothing goes over the wire until the event loop runs.
pub fn connect(cfg: &MqttConf, topics: &Topics) -> (MqttPublisher, EventLoop) {
    let (client, eventloop) = AsyncClient::new(mqtt_options(cfg, topics), 10);
    info!(host = %cfg.host, port = cfg.port, client_id = %cfg.client_id, "MQTT client configured");
    (
        MqttPublisher {
            client,
            qos: QoS::AtLeastOnce,
        },
        eventloop,
    )
}

/// Drive the client in the background. Every connection acknowledgement
/// (first connect and reconnects) announces the bridge online.
pub fn spawn_event_loop(
    mut eventloop: EventLoop,
    publisher: MqttPublisher,
    topics: Topics,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                    info!(code = ?ack.code, "Connected to MQTT broker");
                    // Publishing from this task would wait on the loop it drives.
                    let publisher = publisher.clone();
                    let topics = topics.clone();
                    tokio::spawn(async move {
                        if let Err(e) = liveness::announce(&publisher, &topics, Presence::Online).await {
                            error!("Failed to announce online: {}", e);
                        }
                    });
                }
                Ok(event) => {
                    debug!(?event, "MQTT event");
                }
                Err(e) => {
                    warn!("MQTT connection error: {}", e);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    })
}
