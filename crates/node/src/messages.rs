use serde::Serialize;
use serde_json::Value;

use crate::error::ParseError;
use crate::gas::GasConcentrations;

// ---------------------------------------------------------------------------
// Topics
// ---------------------------------------------------------------------------

pub const TOPIC_LAMP_CMD: &str = "iot/lamp/cmd";
pub const TOPIC_FAN_CMD: &str = "iot/fan/cmd";
pub const TOPIC_LAMP_STATUS: &str = "iot/lamp/status";
pub const TOPIC_FAN_STATUS: &str = "iot/fan/status";
pub const TOPIC_MONITORING: &str = "iot/monitoring";

/// Topics the node subscribes to on every new session.
pub const COMMAND_TOPICS: [&str; 2] = [TOPIC_LAMP_CMD, TOPIC_FAN_CMD];

/// An actuator that accepts remote override commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Lamp,
    Fan,
}

impl Target {
    /// Map a command topic to its target; `None` for anything else.
    pub fn from_command_topic(topic: &str) -> Option<Self> {
        match topic {
            TOPIC_LAMP_CMD => Some(Self::Lamp),
            TOPIC_FAN_CMD => Some(Self::Fan),
            _ => None,
        }
    }

    pub fn status_topic(self) -> &'static str {
        match self {
            Self::Lamp => TOPIC_LAMP_STATUS,
            Self::Fan => TOPIC_FAN_STATUS,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Lamp => "lamp",
            Self::Fan => "fan",
        }
    }
}

// ---------------------------------------------------------------------------
// Payload types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub fn from_bool(on: bool) -> Self {
        if on {
            Self::On
        } else {
            Self::Off
        }
    }

    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

/// Per-cycle actuator status as reported in telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActuatorStatus {
    On,
    Off,
    Manual,
    Error,
}

impl From<Switch> for ActuatorStatus {
    fn from(s: Switch) -> Self {
        match s {
            Switch::On => Self::On,
            Switch::Off => Self::Off,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    pub status: Switch,
}

/// One record per sensing interval on `iot/monitoring`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Telemetry {
    /// °C, one decimal; `null` on sensor failure.
    pub suhu: Option<f64>,
    /// % RH, one decimal; `null` on sensor failure.
    pub kelembapan: Option<f64>,
    pub gas: GasConcentrations,
    pub ldr: u16,
    pub lamp: ActuatorStatus,
    pub fan: ActuatorStatus,
    pub buzzer: Switch,
}

/// A message the control loop wants published.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Status(Target, Switch),
    Telemetry(Telemetry),
}

impl Outbound {
    pub fn topic(&self) -> &'static str {
        match self {
            Self::Status(target, _) => target.status_topic(),
            Self::Telemetry(_) => TOPIC_MONITORING,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::Status(_, status) => serde_json::to_vec(&StatusMessage { status: *status }),
            Self::Telemetry(t) => serde_json::to_vec(t),
        }
    }
}

// ---------------------------------------------------------------------------
// Command decoding
// ---------------------------------------------------------------------------

/// Parse a `{"status": ...}` command.  `"ON"` switches on; any other value
/// (including non-strings) switches off.
pub fn parse_command(payload: &[u8]) -> Result<Switch, ParseError> {
    let value: Value =
        serde_json::from_slice(payload).map_err(|e| ParseError::Malformed(e.to_string()))?;
    let obj = value.as_object().ok_or(ParseError::NotAnObject)?;
    let status = obj.get("status").ok_or(ParseError::MissingField("status"))?;
    Ok(Switch::from_bool(status.as_str() == Some("ON")))
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // -- Target -------------------------------------------------------------

    #[test]
    fn target_from_command_topics() {
        assert_eq!(Target::from_command_topic("iot/lamp/cmd"), Some(Target::Lamp));
        assert_eq!(Target::from_command_topic("iot/fan/cmd"), Some(Target::Fan));
    }

    #[test]
    fn target_rejects_other_topics() {
        assert_eq!(Target::from_command_topic("iot/lamp/status"), None);
        assert_eq!(Target::from_command_topic("iot/buzzer/cmd"), None);
        assert_eq!(Target::from_command_topic(""), None);
    }

    #[test]
    fn status_topics() {
        assert_eq!(Target::Lamp.status_topic(), "iot/lamp/status");
        assert_eq!(Target::Fan.status_topic(), "iot/fan/status");
    }

    // -- parse_command ------------------------------------------------------

    #[test]
    fn parse_on() {
        assert_eq!(parse_command(br#"{"status":"ON"}"#), Ok(Switch::On));
    }

    #[test]
    fn parse_off() {
        assert_eq!(parse_command(br#"{"status":"OFF"}"#), Ok(Switch::Off));
    }

    #[test]
    fn unknown_status_value_means_off() {
        assert_eq!(parse_command(br#"{"status":"on"}"#), Ok(Switch::Off));
        assert_eq!(parse_command(br#"{"status":"TOGGLE"}"#), Ok(Switch::Off));
        assert_eq!(parse_command(br#"{"status":1}"#), Ok(Switch::Off));
        assert_eq!(parse_command(br#"{"status":null}"#), Ok(Switch::Off));
    }

    #[test]
    fn extra_fields_ignored() {
        assert_eq!(
            parse_command(br#"{"status":"ON","from":"dashboard"}"#),
            Ok(Switch::On)
        );
    }

    #[test]
    fn missing_status_rejected() {
        assert_eq!(
            parse_command(br#"{"state":"ON"}"#),
            Err(ParseError::MissingField("status"))
        );
    }

    #[test]
    fn non_object_rejected() {
        assert_eq!(parse_command(br#"["ON"]"#), Err(ParseError::NotAnObject));
        assert_eq!(parse_command(br#""ON""#), Err(ParseError::NotAnObject));
    }

    #[test]
    fn invalid_json_rejected() {
        assert!(matches!(parse_command(b"ON"), Err(ParseError::Malformed(_))));
        assert!(matches!(parse_command(b""), Err(ParseError::Malformed(_))));
        assert!(matches!(
            parse_command(&[0xff, 0xfe, 0x7b]),
            Err(ParseError::Malformed(_))
        ));
    }

    // -- Encoding -----------------------------------------------------------

    #[test]
    fn status_message_encodes() {
        let out = Outbound::Status(Target::Fan, Switch::On);
        assert_eq!(out.topic(), "iot/fan/status");
        assert_eq!(out.encode().unwrap(), br#"{"status":"ON"}"#.to_vec());
    }

    #[test]
    fn telemetry_has_expected_fields() {
        let t = Telemetry {
            suhu: Some(27.0),
            kelembapan: None,
            gas: GasConcentrations::from_raw(0),
            ldr: 1834,
            lamp: ActuatorStatus::Manual,
            fan: ActuatorStatus::Error,
            buzzer: Switch::Off,
        };
        let out = Outbound::Telemetry(t);
        assert_eq!(out.topic(), "iot/monitoring");

        let json: Value = serde_json::from_slice(&out.encode().unwrap()).unwrap();
        assert_eq!(json["suhu"], 27.0);
        assert!(json["kelembapan"].is_null());
        assert_eq!(json["ldr"], 1834);
        assert_eq!(json["lamp"], "MANUAL");
        assert_eq!(json["fan"], "ERROR");
        assert_eq!(json["buzzer"], "OFF");
        assert!(json["gas"].is_object());
        assert_eq!(json.as_object().unwrap().len(), 7);
    }

    #[test]
    fn actuator_status_from_switch() {
        assert_eq!(ActuatorStatus::from(Switch::On), ActuatorStatus::On);
        assert_eq!(ActuatorStatus::from(Switch::Off), ActuatorStatus::Off);
    }
}
