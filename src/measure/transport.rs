//! Transport form of observation records.
//!
//! Records are queued and dispatched as JSON strings. `serde_json` writes
//! floats in their shortest round-trip form and, with `float_roundtrip`
//! enabled, parses them back to the same bits.

use serde::{Deserialize, Serialize};

use super::Observation;

/// A record as seen by the storage writer: still encoded, or already decoded.
///
/// Deserializes from either a JSON string (encoded record) or a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransportRecord {
    Encoded(String),
    Decoded(Observation),
}

impl TransportRecord {
    /// Produce the observation, decoding the JSON form if necessary.
    pub fn into_observation(self) -> serde_json::Result<Observation> {
        match self {
            TransportRecord::Encoded(text) => decode(&text),
            TransportRecord::Decoded(obs) => Ok(obs),
        }
    }
}

impl From<String> for TransportRecord {
    fn from(value: String) -> Self {
        TransportRecord::Encoded(value)
    }
}

impl From<Observation> for TransportRecord {
    fn from(value: Observation) -> Self {
        TransportRecord::Decoded(value)
    }
}

pub fn encode(observation: &Observation) -> serde_json::Result<String> {
    serde_json::to_string(observation)
}

pub fn decode(text: &str) -> serde_json::Result<Observation> {
    serde_json::from_str(text)
}

/// Scale a degree value to fixed-point micro-degrees.
///
/// Works on the shortest decimal representation of `value` and truncates toward
/// zero after six fractional digits, so `0.29` becomes `290000` rather than
/// whatever `0.29 * 1e6` rounds to in binary.
pub fn to_micro_degrees(value: f64) -> i64 {
    if !value.is_finite() {
        return 0;
    }

    let text = format!("{}", value);
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.as_str()),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));

    let whole: i64 = whole.parse().unwrap_or(0);
    let mut micro: i64 = 0;
    for (i, ch) in fraction.chars().chain(std::iter::repeat('0')).take(6).enumerate() {
        let digit = ch.to_digit(10).unwrap_or(0) as i64;
        micro += digit * 10_i64.pow(5 - i as u32);
    }

    let scaled = whole.saturating_mul(1_000_000).saturating_add(micro);
    if negative {
        -scaled
    } else {
        scaled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::WifiReading;

    #[test]
    fn test_encoded_record_decodes() {
        let mut obs = Observation::new(37.774929, -122.419416);
        obs.altitude = Some(12);
        obs.wifi = Some(vec![WifiReading::new("aa:bb:cc:dd:ee:ff")]);

        let text = encode(&obs).unwrap();
        let decoded = TransportRecord::Encoded(text).into_observation().unwrap();
        assert_eq!(decoded, obs);
    }

    #[test]
    fn test_untagged_payload_accepts_both_forms() {
        let json = r#"["{\"lat\":1.5,\"lon\":2.5}", {"lat": 3.5, "lon": 4.5}]"#;
        let records: Vec<TransportRecord> = serde_json::from_str(json).unwrap();
        assert!(matches!(records[0], TransportRecord::Encoded(_)));
        assert!(matches!(records[1], TransportRecord::Decoded(_)));
    }

    #[test]
    fn test_malformed_record_fails() {
        let result = TransportRecord::Encoded("{\"lat\": ".to_string()).into_observation();
        assert!(result.is_err());
    }

    #[test]
    fn test_micro_degrees_truncate_decimally() {
        assert_eq!(to_micro_degrees(0.29), 290_000);
        assert_eq!(to_micro_degrees(51.5), 51_500_000);
        assert_eq!(to_micro_degrees(-122.419416), -122_419_416);
        assert_eq!(to_micro_degrees(1.23456789), 1_234_567);
        assert_eq!(to_micro_degrees(-0.0000019), -1);
        assert_eq!(to_micro_degrees(180.0), 180_000_000);
    }

    #[test]
    fn test_coordinates_round_trip_bit_exact() {
        let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 11) as f64 / (1u64 << 53) as f64 * 360.0 - 180.0
        };

        for _ in 0..50_000 {
            let obs = Observation::new(next() / 2.0, next());
            let decoded = decode(&encode(&obs).unwrap()).unwrap();
            assert_eq!(decoded.lat.to_bits(), obs.lat.to_bits(), "lat {}", obs.lat);
            assert_eq!(decoded.lon.to_bits(), obs.lon.to_bits(), "lon {}", obs.lon);
        }
    }
}
