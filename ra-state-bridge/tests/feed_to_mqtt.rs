//! HTTP feed in, MQTT documents out, with only the broker mocked.

use ra_state_bridge::{
    liveness, BridgeError, CycleOutcome, FeedBridge, HttpFetcher, Presence, Publish, Result,
    Topics,
};
use ra_state_bridge::config::{InvalidFeedPolicy, PollConf};
use ra_state_devkit::{FeedBuilder, MockMqttClient, TestHarness};
use rumqttc::QoS;
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Publishes into the devkit mock.
#[derive(Clone)]
struct MockPublisher(MockMqttClient);

impl Publish for MockPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<()> {
        self.0
            .publish(topic, QoS::AtLeastOnce, retain, payload)
            .await
            .map_err(|e| BridgeError::Publish {
                topic: topic.to_string(),
                message: e.to_string(),
            })
    }
}

/// Serve the given (status line, body) pairs, one connection each.
async fn serve(responses: Vec<(&'static str, String)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        for (status, body) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: text/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        }
    });
    format!("http://{addr}/cgi-bin/mtpleasant_xml.pl")
}

fn poll() -> PollConf {
    PollConf {
        interval_secs: 60,
        retry_secs: 10,
        on_invalid_feed: InvalidFeedPolicy::Skip,
    }
}

#[tokio::test]
async fn test_outage_then_recovery() {
    let flagged = FeedBuilder::mt_pleasant()
        .flag("drives", "az_drive", "TRIPPED")
        .build();
    let url = serve(vec![
        ("503 Service Unavailable", String::new()),
        ("200 OK", "<status><telescope>".to_string()),
        ("200 OK", flagged),
    ])
    .await;

    let harness = TestHarness::new();
    let topics = Topics::new("telescope", "mt_pleasant_26");
    let fetcher = HttpFetcher::new(url, Duration::from_secs(5)).unwrap();
    let bridge = FeedBridge::new(
        fetcher,
        MockPublisher(harness.mqtt_client.clone()),
        topics.clone(),
        poll(),
    );

    let outcome = bridge.run_cycle().await.unwrap();
    assert!(matches!(outcome, CycleOutcome::NoData(BridgeError::HttpStatus { status: 503 })));

    let outcome = bridge.run_cycle().await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Invalid(BridgeError::Xml(_))));
    assert_eq!(harness.get_stats().total_messages, 0);

    let outcome = bridge.run_cycle().await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Published { warnings: 1 }));

    harness
        .assert_published_in_order(&["telescope/mt_pleasant_26/json", "telescope/atnf_json"])
        .unwrap();
    harness
        .assert_field_equals("telescope/mt_pleasant_26/json", "id", &Value::from("mp26"))
        .unwrap();
    harness
        .assert_field_equals("telescope/mt_pleasant_26/json", "drives.az_drive", &Value::from("TRIPPED"))
        .unwrap();
    harness
        .assert_field_equals("telescope/atnf_json", "stateError", &Value::from("warning"))
        .unwrap();
    harness
        .assert_field_equals("telescope/atnf_json", "errors", &serde_json::json!([
            {"system": "az_drive", "description": "TRIPPED"}
        ]))
        .unwrap();
    harness
        .assert_field_equals("telescope/atnf_json", "weather.windSpeedError", &Value::from("ok"))
        .unwrap();
}

#[tokio::test]
async fn test_presence_lifecycle() {
    let harness = TestHarness::new();
    let topics = Topics::new("telescope", "ceduna_30");
    let publisher = MockPublisher(harness.mqtt_client.clone());

    let will = liveness::last_will(&topics);
    harness
        .mqtt_client
        .set_last_will(will.topic.clone(), will.message.to_vec(), will.retain);

    liveness::announce(&publisher, &topics, Presence::Online).await.unwrap();
    harness.assert_retained("telescope/status", "online").unwrap();

    harness.mqtt_client.simulate_connection_loss();
    harness.assert_retained("telescope/status", "offline").unwrap();

    // Reconnect, then shut down cleanly.
    liveness::announce(&publisher, &topics, Presence::Online).await.unwrap();
    harness.assert_retained("telescope/status", "online").unwrap();
    liveness::announce(&publisher, &topics, Presence::Offline).await.unwrap();
    harness.assert_retained("telescope/status", "offline").unwrap();
}
