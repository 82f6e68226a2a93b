/*!
Mock MQTT client for developing the bridge without a broker

Records every publish together with its retain flag, keeps the retained
value per topic the way a broker would, and can play back the last-will
when a connection drop is simulated.
*/

use rumqttc::QoS;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use anyhow::Result;

#[derive(Debug, Clone)]
pub struct MockMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

impl MockMessage {
    /// Payload as UTF-8 text (lossy)
    pub fn payload_str(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

#[derive(Default)]
struct BrokerState {
    published: Vec<MockMessage>,
    retained: HashMap<String, Vec<u8>>,
    last_will: Option<MockMessage>,
    failing: bool,
}

/// Mock MQTT client mimicking rumqttc::AsyncClient's publish surface
#[derive(Clone, Default)]
pub struct MockMqttClient {
    state: Arc<Mutex<BrokerState>>,
}

impl MockMqttClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated publish (same shape as AsyncClient::publish)
    pub async fn publish<S, V>(&self, topic: S, qos: QoS, retain: bool, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let message = MockMessage {
            topic: topic.into(),
            payload: payload.into(),
            qos,
            retain,
        };

        let mut state = self.state.lock().unwrap();
        if state.failing {
            anyhow::bail!("request channel closed");
        }
        if retain {
            state.retained.insert(message.topic.clone(), message.payload.clone());
        }
        log::info!("[mock] published to {}: {} bytes (retain={})", message.topic, message.payload.len(), retain);
        state.published.push(message);
        Ok(())
    }

    /// Register the last-will the broker would hold for this session
    pub fn set_last_will<S, V>(&self, topic: S, payload: V, retain: bool)
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        self.state.lock().unwrap().last_will = Some(MockMessage {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtLeastOnce,
            retain,
        });
    }

    /// Drop the connection uncleanly: the broker publishes the last-will
    pub fn simulate_connection_loss(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(will) = state.last_will.clone() {
            if will.retain {
                state.retained.insert(will.topic.clone(), will.payload.clone());
            }
            log::info!("[mock] connection lost, last-will sent to {}", will.topic);
            state.published.push(will);
        }
    }

    /// Make every following publish fail
    pub fn fail_publishes(&self, failing: bool) {
        self.state.lock().unwrap().failing = failing;
    }

    /// All published messages, in order (for test assertions)
    pub fn get_published_messages(&self) -> Vec<MockMessage> {
        self.state.lock().unwrap().published.clone()
    }

    /// Messages published on a given topic
    pub fn find_messages_by_topic(&self, topic: &str) -> Vec<MockMessage> {
        self.state
            .lock()
            .unwrap()
            .published
            .iter()
            .filter(|msg| msg.topic == topic)
            .cloned()
            .collect()
    }

    /// Retained value a new subscriber would receive on `topic`
    pub fn retained(&self, topic: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .retained
            .get(topic)
            .map(|payload| String::from_utf8_lossy(payload).into_owned())
    }

    /// Parse the last message on a topic as JSON
    pub fn get_last_json_message<T>(&self, topic: &str) -> Result<Option<T>>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        let messages = self.find_messages_by_topic(topic);
        if let Some(last_msg) = messages.last() {
            let parsed: T = serde_json::from_slice(&last_msg.payload)?;
            Ok(Some(parsed))
        } else {
            Ok(None)
        }
    }

    /// Reset everything recorded
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.published.clear();
        state.retained.clear();
    }
}
