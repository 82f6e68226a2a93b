//! Home Assistant MQTT discovery.
//!
//! One retained config message per sensor at
//! `<prefix>/sensor/<node_id>/<object_id>/config`. Each sensor reads a field of
//! the standard (or raw) JSON through a `value_template`, and uses the status
//! topic for availability.

use serde::Serialize;
use tracing::info;

use crate::broker::{Publish, Topics};
use crate::config::DiscoveryConf;
use crate::error::Result;
use crate::liveness::{OFFLINE, ONLINE};

/// Which published document a sensor reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Standard,
    Raw,
}

#[derive(Debug, Clone, Copy)]
pub struct SensorSpec {
    pub object_id: &'static str,
    pub name: &'static str,
    pub source: Source,
    /// Dotted JSON path inside the source document.
    pub path: &'static str,
    pub unit: Option<&'static str>,
    pub device_class: Option<&'static str>,
    /// Value shown while the field is absent (optional fields only).
    pub fallback: Option<&'static str>,
}

const fn sensor(object_id: &'static str, name: &'static str, path: &'static str) -> SensorSpec {
    SensorSpec {
        object_id,
        name,
        source: Source::Standard,
        path,
        unit: None,
        device_class: None,
        fallback: None,
    }
}

const fn measurement(
    object_id: &'static str,
    name: &'static str,
    path: &'static str,
    unit: &'static str,
    device_class: Option<&'static str>,
) -> SensorSpec {
    SensorSpec {
        unit: Some(unit),
        device_class,
        ..sensor(object_id, name, path)
    }
}

pub const SENSORS: &[SensorSpec] = &[
    sensor("antenna_name", "Antenna", "antennaName"),
    sensor("info_time", "Info time", "infoTime"),
    sensor("right_ascension", "Right ascension (ICRF)", "rightAscensionICRF"),
    sensor("declination", "Declination (ICRF)", "declinationICRF"),
    measurement("azimuth", "Azimuth", "azimuth", "°", None),
    measurement("elevation", "Elevation", "elevation", "°", None),
    sensor("state", "State", "state"),
    SensorSpec {
        fallback: Some("ok"),
        ..sensor("state_error", "State error", "stateError")
    },
    measurement("wind_speed", "Wind speed", "weather.windSpeed", "km/h", Some("wind_speed")),
    measurement("temperature", "Temperature", "weather.temperature", "°C", Some("temperature")),
    measurement("pressure", "Air pressure", "weather.pressure", "hPa", Some("pressure")),
    measurement("humidity", "Humidity", "weather.humidity", "%", Some("humidity")),
    sensor("wind_speed_error", "Wind status", "weather.windSpeedError"),
    SensorSpec {
        fallback: Some("unknown"),
        ..sensor("receiver", "Receiver", "configuration.receiver")
    },
    SensorSpec {
        source: Source::Raw,
        ..sensor("wind_state", "Wind state", "weather.wind_state")
    },
];

#[derive(Debug, Clone, Serialize)]
pub struct SensorDiscovery {
    pub name: String,
    pub unique_id: String,
    pub state_topic: String,
    pub value_template: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_class: Option<String>,
    pub availability_topic: String,
    pub payload_available: String,
    pub payload_not_available: String,
    pub device: DeviceInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
}

pub fn config_topic(prefix: &str, node_id: &str, object_id: &str) -> String {
    format!("{prefix}/sensor/{node_id}/{object_id}/config")
}

pub fn unique_id(node_id: &str, object_id: &str) -> String {
    format!("ra_state_{node_id}_{object_id}")
}

pub fn value_template(spec: &SensorSpec) -> String {
    match spec.fallback {
        Some(fallback) => format!("{{{{ value_json.{} | default('{}') }}}}", spec.path, fallback),
        None => format!("{{{{ value_json.{} }}}}", spec.path),
    }
}

/// Discovery payload for one sensor.
pub fn sensor_discovery(spec: &SensorSpec, topics: &Topics, node_id: &str) -> SensorDiscovery {
    let state_topic = match spec.source {
        Source::Standard => topics.standard(),
        Source::Raw => topics.raw(),
    };
    SensorDiscovery {
        name: spec.name.to_string(),
        unique_id: unique_id(node_id, spec.object_id),
        state_topic,
        value_template: value_template(spec),
        unit_of_measurement: spec.unit.map(str::to_string),
        device_class: spec.device_class.map(str::to_string),
        state_class: spec.unit.map(|_| "measurement".to_string()),
        availability_topic: topics.status(),
        payload_available: ONLINE.to_string(),
        payload_not_available: OFFLINE.to_string(),
        device: DeviceInfo {
            identifiers: vec![format!("ra_state_{node_id}")],
            name: format!("Telescope {node_id}"),
            manufacturer: "University of Tasmania".to_string(),
            model: "ra-state feed".to_string(),
        },
    }
}

/// Publish every sensor config, retained. Returns how many were sent.
pub async fn publish_discovery<P: Publish>(
    publisher: &P,
    topics: &Topics,
    conf: &DiscoveryConf,
) -> Result<usize> {
    let node_id = conf.node_id(topics.site());
    for spec in SENSORS {
        let topic = config_topic(&conf.prefix, node_id, spec.object_id);
        let payload = serde_json::to_vec(&sensor_discovery(spec, topics, node_id))?;
        publisher.publish(&topic, payload, true).await?;
    }
    info!(count = SENSORS.len(), prefix = %conf.prefix, node_id = %node_id, "Discovery configs published");
    Ok(SENSORS.len())
}
