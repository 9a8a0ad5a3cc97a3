// Observation records submitted by the validation layer
//
// Records are plain serde types: they travel through the batch queue and the
// async job payload as JSON (see `transport`).

use serde::{Deserialize, Serialize};

mod radio;
pub mod transport;
mod wifi;

pub use radio::Radio;
pub use transport::TransportRecord;
pub use wifi::{channel_from_frequency, normalize_wifi};

/// One reported measurement: a position plus optional cell and Wi-Fi readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub accuracy: Option<i64>,
    #[serde(default)]
    pub altitude: Option<i64>,
    #[serde(default)]
    pub altitude_accuracy: Option<i64>,
    /// Radio type name of the cell reading (gsm, cdma, umts, lte)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell: Option<CellReading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi: Option<Vec<WifiReading>>,
}

impl Observation {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            accuracy: None,
            altitude: None,
            altitude_accuracy: None,
            radio: None,
            cell: None,
            wifi: None,
        }
    }

    /// Strip raw frequencies from the Wi-Fi readings, deriving channels where missing.
    pub fn normalize(&mut self) {
        if let Some(wifi) = self.wifi.as_mut() {
            normalize_wifi(wifi);
        }
    }

    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }
}

/// A validated submission body: `{"items": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub items: Vec<Observation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellReading {
    pub mcc: i32,
    pub mnc: i32,
    pub lac: i64,
    pub cid: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psc: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asu: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ta: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiReading {
    /// BSSID of the access point
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<i32>,
    /// Raw frequency in MHz; removed during normalization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<i32>,
}

impl WifiReading {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            signal: None,
            channel: None,
            frequency: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_fields_default_to_none() {
        let obs: Observation = serde_json::from_str(r#"{"lat": 51.5, "lon": -0.12}"#).unwrap();
        assert_eq!(obs, Observation::new(51.5, -0.12));
    }

    #[test]
    fn test_normalize_without_wifi_is_noop() {
        let mut obs = Observation::new(1.0, 2.0);
        obs.normalize();
        assert!(obs.wifi.is_none());
    }

    #[test]
    fn test_cell_and_wifi_are_independent() {
        let json = r#"{
            "lat": 10.0, "lon": 20.0, "radio": "umts",
            "cell": {"mcc": 262, "mnc": 1, "lac": 5, "cid": 1234}
        }"#;
        let obs: Observation = serde_json::from_str(json).unwrap();
        assert!(obs.wifi.is_none());
        assert_eq!(obs.cell.unwrap().cid, 1234);
        assert_eq!(obs.radio.as_deref(), Some("umts"));
    }
}
