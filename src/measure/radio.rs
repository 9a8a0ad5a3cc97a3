use serde::{Deserialize, Serialize};

/// Cellular technology of a cell reading, persisted as its integer code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Radio {
    #[default]
    Gsm,
    Cdma,
    Umts,
    Lte,
}

impl Radio {
    /// Look up a radio type by name. Unrecognized names fall back to the default.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "gsm" => Radio::Gsm,
            "cdma" => Radio::Cdma,
            "umts" => Radio::Umts,
            "lte" => Radio::Lte,
            _ => Radio::default(),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Radio::Gsm => 0,
            Radio::Cdma => 1,
            Radio::Umts => 2,
            Radio::Lte => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Radio::Gsm => "gsm",
            Radio::Cdma => "cdma",
            Radio::Umts => "umts",
            Radio::Lte => "lte",
        }
    }
}

impl std::fmt::Display for Radio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radio_codes() {
        assert_eq!(Radio::from_name("gsm").code(), 0);
        assert_eq!(Radio::from_name("cdma").code(), 1);
        assert_eq!(Radio::from_name("UMTS").code(), 2);
        assert_eq!(Radio::from_name("lte").code(), 3);
    }

    #[test]
    fn test_unknown_radio_maps_to_default() {
        assert_eq!(Radio::from_name(""), Radio::Gsm);
        assert_eq!(Radio::from_name("wimax").code(), 0);
    }
}
