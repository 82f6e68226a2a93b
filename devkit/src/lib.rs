/*!
# ra-state DevKit - Stubs and helpers for bridge development

Library used by the bridge test suites:
- MQTT client stub recording publishes without a broker
- Feed fixtures shaped like the ra-state XML pages
- Test harness with assertions on published JSON
*/

pub mod mqtt_stub;
pub mod feed_fixtures;
pub mod test_utils;

pub use mqtt_stub::{MockMessage, MockMqttClient};
pub use feed_fixtures::FeedBuilder;
pub use test_utils::TestHarness;
