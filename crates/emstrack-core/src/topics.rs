// ── Topic and resource naming ──
//
// Broker topics and REST paths used by the client. Topics are
// slash-delimited; `+` is the single-level MQTT wildcard.

use std::fmt::Display;

use crate::model::EntityId;

/// A decoded inbound message, as handed to local callbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicMessage {
    pub topic: String,
    pub payload: serde_json::Value,
}

pub const AMBULANCES_PATH: &str = "ambulance/";
pub const HOSPITALS_PATH: &str = "hospital/";
pub const CALLS_PATH: &str = "call/";
pub const BASES_PATH: &str = "location/Base/";

/// REST path of a single call.
pub fn call_path(id: impl Display) -> String {
    format!("call/{id}/")
}

pub fn ambulance_data(id: impl Display) -> String {
    format!("ambulance/{id}/data")
}

/// Status updates of every call assigned to the ambulance.
pub fn ambulance_call_status(id: impl Display) -> String {
    format!("ambulance/{id}/call/+/status")
}

pub fn hospital_data(id: impl Display) -> String {
    format!("hospital/{id}/data")
}

pub fn call_data(id: impl Display) -> String {
    format!("call/{id}/data")
}

/// Split `ambulance/{ambulance}/call/{call}/status` into its two ids.
///
/// Returns `None` for any other topic shape.
pub fn parse_ambulance_call_status(topic: &str) -> Option<(EntityId, EntityId)> {
    let mut parts = topic.split('/');
    match (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) {
        (Some("ambulance"), Some(ambulance), Some("call"), Some(call), Some("status"), None)
            if !ambulance.is_empty() && !call.is_empty() =>
        {
            Some((EntityId::from(ambulance), EntityId::from(call)))
        }
        _ => None,
    }
}

/// MQTT filter matching: `+` matches one level, a trailing `#` matches
/// the remaining levels (including none).
pub fn matches(filter: &str, topic: &str) -> bool {
    let mut levels = topic.split('/');
    for part in filter.split('/') {
        match part {
            "#" => return true,
            "+" => {
                if levels.next().is_none() {
                    return false;
                }
            }
            literal => {
                if levels.next() != Some(literal) {
                    return false;
                }
            }
        }
    }
    levels.next().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders() {
        assert_eq!(ambulance_data(7), "ambulance/7/data");
        assert_eq!(ambulance_call_status(7), "ambulance/7/call/+/status");
        assert_eq!(hospital_data(&EntityId::Int(3)), "hospital/3/data");
        assert_eq!(call_data(EntityId::from("9")), "call/9/data");
        assert_eq!(call_path(9), "call/9/");
    }

    #[test]
    fn parses_status_topic() {
        let (ambulance, call) = parse_ambulance_call_status("ambulance/3/call/9/status").unwrap_or_else(
            || panic!("topic should parse"),
        );
        assert_eq!(ambulance, EntityId::Int(3));
        assert_eq!(call, EntityId::Int(9));
    }

    #[test]
    fn filter_matching() {
        assert!(matches("ambulance/7/data", "ambulance/7/data"));
        assert!(!matches("ambulance/7/data", "ambulance/8/data"));
        assert!(matches("ambulance/3/call/+/status", "ambulance/3/call/9/status"));
        assert!(!matches("ambulance/3/call/+/status", "ambulance/4/call/9/status"));
        assert!(!matches("ambulance/3/call/+/status", "ambulance/3/call/9/status/x"));
        assert!(matches("ambulance/#", "ambulance/3/call/9/status"));
        assert!(matches("ambulance/#", "ambulance"));
        assert!(!matches("ambulance/+", "ambulance"));
        assert!(!matches("hospital/1/data", "hospital/1"));
    }

    #[test]
    fn rejects_other_shapes() {
        for topic in [
            "ambulance/3/data",
            "ambulance/3/call/9/status/extra",
            "hospital/3/call/9/status",
            "ambulance//call/9/status",
            "ambulance/3/call//status",
            "",
        ] {
            assert!(parse_ambulance_call_status(topic).is_none(), "{topic}");
        }
    }
}
