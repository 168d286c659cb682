// ── Status codes ──
//
// Single-letter codes the server publishes. Unknown codes are kept
// verbatim so newer server versions do not break the client.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::EnumString;

/// Per-ambulance status of a call, published on
/// `ambulance/{id}/call/{id}/status`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString)]
pub enum AmbulanceCallStatus {
    #[strum(serialize = "R")]
    Requested,
    #[strum(serialize = "O")]
    Ongoing,
    #[strum(serialize = "D")]
    Declined,
    #[strum(serialize = "S")]
    Suspended,
    /// Terminal: the ambulance is done with the call.
    #[strum(serialize = "C")]
    Completed,
    #[strum(default)]
    Unknown(String),
}

impl AmbulanceCallStatus {
    pub fn from_code(code: &str) -> Self {
        code.parse()
            .unwrap_or_else(|_| Self::Unknown(code.to_owned()))
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Requested => "R",
            Self::Ongoing => "O",
            Self::Declined => "D",
            Self::Suspended => "S",
            Self::Completed => "C",
            Self::Unknown(code) => code,
        }
    }

    /// No further status-triggered fetches happen after this code.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Requested => "Requested",
            Self::Ongoing => "Ongoing",
            Self::Declined => "Declined",
            Self::Suspended => "Suspended",
            Self::Completed => "Completed",
            Self::Unknown(code) => code,
        }
    }
}

impl fmt::Display for AmbulanceCallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for AmbulanceCallStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for AmbulanceCallStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(Self::from_code(&code))
    }
}

/// Human-readable label for an ambulance status code (`AV`, `PB`, ...).
///
/// Unrecognized codes are returned as-is.
pub fn ambulance_status_label(code: &str) -> &str {
    match code {
        "UK" => "Unknown",
        "AV" => "Available",
        "OS" => "Out of service",
        "PB" => "Patient bound",
        "AP" => "At patient",
        "HB" => "Hospital bound",
        "AH" => "At hospital",
        "BB" => "Base bound",
        "AB" => "At base",
        "WB" => "Waypoint bound",
        "AW" => "At waypoint",
        other => other,
    }
}

/// Human-readable label for a call status code.
pub fn call_status_label(code: &str) -> &str {
    match code {
        "P" => "Pending",
        "S" => "Started",
        "E" => "Ended",
        other => other,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_parse() {
        assert_eq!(AmbulanceCallStatus::from_code("R"), AmbulanceCallStatus::Requested);
        assert_eq!(AmbulanceCallStatus::from_code("D"), AmbulanceCallStatus::Declined);
        assert_eq!(AmbulanceCallStatus::from_code("C"), AmbulanceCallStatus::Completed);
    }

    #[test]
    fn only_completed_is_terminal() {
        for code in ["R", "O", "D", "S", "X"] {
            assert!(!AmbulanceCallStatus::from_code(code).is_terminal(), "{code}");
        }
        assert!(AmbulanceCallStatus::from_code("C").is_terminal());
    }

    #[test]
    fn unknown_code_is_preserved() {
        let status = AmbulanceCallStatus::from_code("Z");
        assert_eq!(status, AmbulanceCallStatus::Unknown("Z".into()));
        assert_eq!(status.code(), "Z");
        assert_eq!(serde_json::to_string(&status).unwrap(), r#""Z""#);
    }

    #[test]
    fn deserializes_from_json_string() {
        let status: AmbulanceCallStatus = serde_json::from_str(r#""O""#).unwrap();
        assert_eq!(status, AmbulanceCallStatus::Ongoing);
        assert_eq!(status.to_string(), "Ongoing");
    }

    #[test]
    fn status_labels() {
        assert_eq!(ambulance_status_label("AV"), "Available");
        assert_eq!(ambulance_status_label("??"), "??");
        assert_eq!(call_status_label("S"), "Started");
    }
}
