//! Standard (ATNF LBA monitoring) record.
//!
//! Field names and nesting are the external contract: dashboards and the
//! Home Assistant discovery templates read them by path, so they must not move.

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::feed::RawFeedTree;

/// `wind_state` value the site reports when the wind is within limits.
pub const WIND_OK: &str = "WIND_OK";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardRecord {
    pub antenna_name: String,
    pub info_time: String,
    #[serde(rename = "rightAscensionICRF")]
    pub right_ascension_icrf: String,
    #[serde(rename = "declinationICRF")]
    pub declination_icrf: String,
    pub azimuth: f64,
    pub elevation: f64,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_error: Option<StateError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<SystemError>>,
    pub weather: Weather,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<Configuration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weather {
    pub wind_speed: f64,
    pub temperature: f64,
    pub pressure: f64,
    pub humidity: f64,
    pub wind_speed_error: WindStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub receiver: String,
}

/// One flagged subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemError {
    pub system: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindStatus {
    Ok,
    Bad,
}

impl WindStatus {
    pub fn from_wind_state(state: &str) -> Self {
        if state == WIND_OK {
            Self::Ok
        } else {
            Self::Bad
        }
    }
}

/// Present only while the feed flags at least one subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateError {
    Warning,
}

impl StandardRecord {
    /// Project a normalized feed onto the standard schema.
    ///
    /// Any missing field or malformed number fails the whole record; nothing
    /// is defaulted.
    pub fn from_tree(tree: &RawFeedTree) -> Result<Self> {
        let (state_error, errors) = if tree.has_warnings() {
            let errors = tree
                .warnings()
                .iter()
                .map(|(system, description)| SystemError {
                    system: system.clone(),
                    description: description.clone(),
                })
                .collect();
            (Some(StateError::Warning), Some(errors))
        } else {
            (None, None)
        };

        let configuration = match tree.get("focus") {
            Some(_) => Some(Configuration {
                receiver: tree.field("focus", "receiver")?.to_string(),
            }),
            None => None,
        };

        Ok(Self {
            antenna_name: tree.text("telescope")?.to_string(),
            info_time: format!(
                "{} {}",
                tree.field("time", "ut_date")?,
                tree.field("time", "utc")?
            ),
            right_ascension_icrf: tree.field("coord", "ra2000")?.to_string(),
            declination_icrf: tree.field("coord", "dec2000")?.to_string(),
            azimuth: number(tree, "coord", "az")?,
            elevation: number(tree, "coord", "el")?,
            state: capitalize(tree.field("antenna", "antenna_state")?),
            state_error,
            errors,
            weather: Weather {
                wind_speed: number(tree, "weather", "wind_speed_long")?,
                temperature: number(tree, "weather", "temperature")?,
                pressure: number(tree, "weather", "air_pressure")?,
                humidity: number(tree, "weather", "humidity")?,
                wind_speed_error: WindStatus::from_wind_state(tree.field("weather", "wind_state")?),
            },
            configuration,
        })
    }
}

fn number(tree: &RawFeedTree, tag: &str, key: &str) -> Result<f64> {
    let raw = tree.field(tag, key)?;
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(BridgeError::InvalidNumber {
            path: format!("{tag}.{key}"),
            value: raw.to_string(),
        }),
    }
}

/// First character upper case, the rest lower case.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ra_state_devkit::FeedBuilder;

    const SCENARIO: &str = r#"<status>
        <telescope>Mt Pleasant 26m</telescope>
        <time ut_date="2024-02-01" utc="03:00:00"/>
        <coord ra2000="12:00:00" dec2000="-45:00:00" az="90.0" el="45.0"/>
        <antenna antenna_state="tracking"/>
        <weather wind_speed_long="10.0" temperature="15.0" air_pressure="1013.0" humidity="50.0" wind_state="WIND_OK"/>
        <focus receiver="X-band"/>
    </status>"#;

    fn tree(xml: &str) -> RawFeedTree {
        RawFeedTree::parse(xml.as_bytes()).unwrap()
    }

    #[test]
    fn test_end_to_end_scenario() {
        let record = StandardRecord::from_tree(&tree(SCENARIO)).unwrap();

        assert_eq!(record.antenna_name, "Mt Pleasant 26m");
        assert_eq!(record.info_time, "2024-02-01 03:00:00");
        assert_eq!(record.right_ascension_icrf, "12:00:00");
        assert_eq!(record.declination_icrf, "-45:00:00");
        assert_eq!(record.azimuth, 90.0);
        assert_eq!(record.elevation, 45.0);
        assert_eq!(record.state, "Tracking");
        assert_eq!(record.weather.wind_speed_error, WindStatus::Ok);
        assert_eq!(record.configuration.as_ref().unwrap().receiver, "X-band");

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("errors").is_none());
        assert!(json.get("stateError").is_none());
        assert_eq!(json["weather"]["windSpeedError"], "ok");
        assert_eq!(json["weather"]["pressure"], 1013.0);
        assert_eq!(json["rightAscensionICRF"], "12:00:00");
        assert_eq!(json["declinationICRF"], "-45:00:00");
    }

    #[test]
    fn test_id_keyed_feed() {
        let xml = FeedBuilder::mt_pleasant().build();
        let record = StandardRecord::from_tree(&tree(&xml)).unwrap();
        assert_eq!(record.antenna_name, "Mt Pleasant 26m");
        assert_eq!(record.state, "Tracking");
        assert!(record.errors.is_none());
    }

    #[test]
    fn test_mapping_is_idempotent() {
        let t = tree(&FeedBuilder::mt_pleasant().flag("drives", "az_drive", "TRIPPED").build());
        let first = StandardRecord::from_tree(&t).unwrap();
        let second = StandardRecord::from_tree(&t).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_warnings_produce_errors_list() {
        let xml = FeedBuilder::mt_pleasant()
            .flag("weather", "wind_state", "WIND_HIGH")
            .flag("drives", "el_drive", "limit reached")
            .build();
        let record = StandardRecord::from_tree(&tree(&xml)).unwrap();

        assert_eq!(record.state_error, Some(StateError::Warning));
        assert_eq!(
            record.errors.unwrap(),
            vec![
                SystemError {
                    system: "wind_state".into(),
                    description: "WIND_HIGH".into()
                },
                SystemError {
                    system: "el_drive".into(),
                    description: "limit reached".into()
                },
            ]
        );
        assert_eq!(record.weather.wind_speed_error, WindStatus::Bad);
    }

    #[test]
    fn test_serialized_warning_fields() {
        let xml = FeedBuilder::mt_pleasant()
            .flag("antenna", "antenna_state", "stowed")
            .build();
        let json = serde_json::to_value(StandardRecord::from_tree(&tree(&xml)).unwrap()).unwrap();
        assert_eq!(json["stateError"], "warning");
        assert_eq!(
            json["errors"],
            serde_json::json!([{"system": "antenna_state", "description": "stowed"}])
        );
        assert_eq!(json["state"], "Stowed");
    }

    #[test]
    fn test_wind_status() {
        assert_eq!(WindStatus::from_wind_state("WIND_OK"), WindStatus::Ok);
        for other in ["", "wind_ok", "WIND_OK ", "WIND_HIGH", "STOW"] {
            assert_eq!(WindStatus::from_wind_state(other), WindStatus::Bad, "{other:?}");
        }

        let xml = SCENARIO.replace("wind_state=\"WIND_OK\"", "wind_state=\"\"");
        let record = StandardRecord::from_tree(&tree(&xml)).unwrap();
        assert_eq!(record.weather.wind_speed_error, WindStatus::Bad);
    }

    #[test]
    fn test_invalid_number_fails_loudly() {
        let xml = SCENARIO.replace("az=\"90.0\"", "az=\"ninety\"");
        match StandardRecord::from_tree(&tree(&xml)) {
            Err(BridgeError::InvalidNumber { path, value }) => {
                assert_eq!(path, "coord.az");
                assert_eq!(value, "ninety");
            }
            other => panic!("unexpected: {other:?}"),
        }

        let xml = SCENARIO.replace("humidity=\"50.0\"", "humidity=\"\"");
        assert!(matches!(
            StandardRecord::from_tree(&tree(&xml)),
            Err(BridgeError::InvalidNumber { .. })
        ));

        let xml = SCENARIO.replace("temperature=\"15.0\"", "temperature=\"NaN\"");
        assert!(matches!(
            StandardRecord::from_tree(&tree(&xml)),
            Err(BridgeError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_missing_field_fails() {
        let xml = SCENARIO.replace("<telescope>Mt Pleasant 26m</telescope>", "");
        match StandardRecord::from_tree(&tree(&xml)) {
            Err(BridgeError::MissingField { path }) => assert_eq!(path, "telescope"),
            other => panic!("unexpected: {other:?}"),
        }

        let xml = SCENARIO.replace(" utc=\"03:00:00\"", "");
        match StandardRecord::from_tree(&tree(&xml)) {
            Err(BridgeError::MissingField { path }) => assert_eq!(path, "time.utc"),
            other => panic!("unexpected: {other:?}"),
        }

        let xml = SCENARIO.replace(" wind_state=\"WIND_OK\"", "");
        match StandardRecord::from_tree(&tree(&xml)) {
            Err(BridgeError::MissingField { path }) => assert_eq!(path, "weather.wind_state"),
            other => panic!("unexpected: {other:?}"),
        }

        let xml = FeedBuilder::ceduna().remove("weather", Some("wind_state")).build();
        match StandardRecord::from_tree(&tree(&xml)) {
            Err(BridgeError::MissingField { path }) => assert_eq!(path, "weather.wind_state"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_configuration_follows_focus_element() {
        let xml = SCENARIO.replace("<focus receiver=\"X-band\"/>", "");
        let record = StandardRecord::from_tree(&tree(&xml)).unwrap();
        assert!(record.configuration.is_none());
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("configuration").is_none());

        let xml = SCENARIO.replace("receiver=\"X-band\"", "feed=\"primary\"");
        assert!(matches!(
            StandardRecord::from_tree(&tree(&xml)),
            Err(BridgeError::MissingField { .. })
        ));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("tracking"), "Tracking");
        assert_eq!(capitalize("SLEWING"), "Slewing");
        assert_eq!(capitalize("on source"), "On source");
        assert_eq!(capitalize(""), "");
    }
}
