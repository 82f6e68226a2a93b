/*!
Test harness for the bridge

Wraps a MockMqttClient and offers assertions on what was published:
- JSON field lookups by dotted path
- publish ordering across topics
- retained values
*/

use crate::mqtt_stub::MockMqttClient;
use serde_json::Value;
use std::collections::HashMap;
use anyhow::Result;

pub struct TestHarness {
    pub mqtt_client: MockMqttClient,
}

impl TestHarness {
    pub fn new() -> Self {
        env_logger::try_init().ok(); // logging for tests

        Self {
            mqtt_client: MockMqttClient::new(),
        }
    }

    /// Assert the number of messages seen on a topic
    pub fn assert_message_count(&self, topic: &str, expected: usize) -> Result<()> {
        let actual = self.mqtt_client.find_messages_by_topic(topic).len();
        if actual != expected {
            anyhow::bail!(
                "Expectation failed for topic '{}': expected {} messages, got {}",
                topic, expected, actual
            );
        }
        Ok(())
    }

    /// Assert that the given topics received their first message in this order
    pub fn assert_published_in_order(&self, topics: &[&str]) -> Result<()> {
        let messages = self.mqtt_client.get_published_messages();
        let mut last_index = None;

        for topic in topics {
            let index = messages
                .iter()
                .position(|m| m.topic == *topic)
                .ok_or_else(|| anyhow::anyhow!("Nothing published on {}", topic))?;
            if let Some(previous) = last_index {
                if index < previous {
                    anyhow::bail!("{} was published out of order", topic);
                }
            }
            last_index = Some(index);
        }
        Ok(())
    }

    /// Assert the retained value of a topic
    pub fn assert_retained(&self, topic: &str, expected: &str) -> Result<()> {
        match self.mqtt_client.retained(topic) {
            Some(actual) if actual == expected => Ok(()),
            Some(actual) => anyhow::bail!(
                "Retained value mismatch on {}: expected {:?}, got {:?}",
                topic, expected, actual
            ),
            None => anyhow::bail!("No retained value on {}", topic),
        }
    }

    /// Assert a field exists in the latest message
    pub fn assert_field_exists(&self, topic: &str, field_path: &str) -> Result<()> {
        if let Some(msg) = self.mqtt_client.get_last_json_message::<Value>(topic)? {
            if get_nested_field(&msg, field_path).is_some() {
                return Ok(());
            }
        }

        anyhow::bail!("Field '{}' not found in latest message on {}", field_path, topic);
    }

    /// Assert a field is absent from the latest message
    pub fn assert_field_absent(&self, topic: &str, field_path: &str) -> Result<()> {
        let msg = self
            .mqtt_client
            .get_last_json_message::<Value>(topic)?
            .ok_or_else(|| anyhow::anyhow!("No message on {}", topic))?;
        if get_nested_field(&msg, field_path).is_some() {
            anyhow::bail!("Field '{}' unexpectedly present on {}", field_path, topic);
        }
        Ok(())
    }

    /// Assert a field holds a specific value
    pub fn assert_field_equals(&self, topic: &str, field_path: &str, expected: &Value) -> Result<()> {
        if let Some(msg) = self.mqtt_client.get_last_json_message::<Value>(topic)? {
            if let Some(actual) = get_nested_field(&msg, field_path) {
                if actual == expected {
                    return Ok(());
                } else {
                    anyhow::bail!("Field '{}' mismatch: expected {:?}, got {:?}",
                                 field_path, expected, actual);
                }
            }
        }

        anyhow::bail!("Field '{}' not found for comparison in {}", field_path, topic);
    }

    /// Message counts per topic
    pub fn get_stats(&self) -> TestStats {
        let messages = self.mqtt_client.get_published_messages();
        let mut topic_counts = HashMap::new();

        for msg in &messages {
            *topic_counts.entry(msg.topic.clone()).or_insert(0) += 1;
        }

        TestStats {
            total_messages: messages.len(),
            topic_counts,
        }
    }

    pub fn reset(&mut self) {
        self.mqtt_client.clear();
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn get_nested_field<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;

    for part in path.split('.') {
        match current {
            Value::Object(obj) => {
                current = obj.get(part)?;
            }
            _ => return None,
        }
    }

    Some(current)
}

#[derive(Debug)]
pub struct TestStats {
    pub total_messages: usize,
    pub topic_counts: HashMap<String, usize>,
}
