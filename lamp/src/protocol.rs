//! Govee LAN API messages.
//!
//! Every datagram is a JSON object `{"msg": {"cmd": ..., "data": {...}}}`.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{LampError, LampResult};
use crate::{device_brightness, DeviceStatus, LampState, Rgb};

pub fn scan_request() -> Vec<u8> {
    encode(json!({"msg": {"cmd": "scan", "data": {"account_topic": "reserve"}}}))
}

pub fn color_request(color: Rgb) -> Vec<u8> {
    encode(json!({
        "msg": {
            "cmd": "colorwc",
            "data": {
                "color": {"r": color.r, "g": color.g, "b": color.b},
                "colorTemInKelvin": 0
            }
        }
    }))
}

pub fn brightness_request(brightness: u8) -> Vec<u8> {
    encode(json!({"msg": {"cmd": "brightness", "data": {"value": device_brightness(brightness)}}}))
}

pub fn turn_request(on: bool) -> Vec<u8> {
    encode(json!({"msg": {"cmd": "turn", "data": {"value": u8::from(on)}}}))
}

pub fn status_request() -> Vec<u8> {
    encode(json!({"msg": {"cmd": "devStatus", "data": {}}}))
}

fn encode(value: Value) -> Vec<u8> {
    value.to_string().into_bytes()
}

#[derive(Debug, Deserialize)]
struct Envelope {
    msg: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    cmd: String,
    #[serde(default)]
    data: Value,
}

/// A device announcing itself in reply to a scan.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScanReply {
    pub ip: String,
    /// Device id, the MAC with two extra leading bytes.
    pub device: String,
    #[serde(default)]
    pub sku: Option<String>,
}

impl ScanReply {
    pub fn matches_mac(&self, mac: &str) -> bool {
        let wanted = normalize_mac(mac);
        !wanted.is_empty() && normalize_mac(&self.device).ends_with(&wanted)
    }
}

/// Uppercase hex digits only.
pub fn normalize_mac(mac: &str) -> String {
    mac.chars()
        .filter(char::is_ascii_hexdigit)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusData {
    #[serde(default)]
    on_off: Option<u8>,
    #[serde(default)]
    brightness: Option<u8>,
    #[serde(default)]
    color: Option<ColorField>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ColorField {
    Rgb(Rgb),
    Packed(u32),
}

impl ColorField {
    fn rgb(&self) -> Rgb {
        match self {
            Self::Rgb(rgb) => *rgb,
            Self::Packed(value) => Rgb::from_packed(*value),
        }
    }
}

fn parse_envelope(bytes: &[u8], expected: &str) -> LampResult<Value> {
    let envelope: Envelope = serde_json::from_slice(bytes)
        .map_err(|e| LampError::Protocol(format!("{}: {}", e, String::from_utf8_lossy(bytes))))?;
    if envelope.msg.cmd != expected {
        return Err(LampError::Protocol(format!(
            "expected '{}' reply, got '{}'",
            expected, envelope.msg.cmd
        )));
    }
    Ok(envelope.msg.data)
}

pub fn parse_scan_reply(bytes: &[u8]) -> LampResult<ScanReply> {
    let data = parse_envelope(bytes, "scan")?;
    serde_json::from_value(data).map_err(|e| LampError::Protocol(e.to_string()))
}

/// `None` when the reply carries no color or no brightness. A missing
/// `onOff` counts as on.
pub fn parse_status_reply(bytes: &[u8]) -> LampResult<Option<DeviceStatus>> {
    let data = parse_envelope(bytes, "devStatus")?;
    let status: StatusData =
        serde_json::from_value(data).map_err(|e| LampError::Protocol(e.to_string()))?;
    Ok(match (status.color, status.brightness) {
        (Some(color), Some(brightness)) => Some(DeviceStatus {
            state: LampState::new(color.rgb(), brightness),
            on: status.on_off != Some(0),
        }),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_request_nests_color() {
        let bytes = color_request(Rgb::new(1, 2, 3));
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["msg"]["cmd"], "colorwc");
        assert_eq!(value["msg"]["data"]["color"]["g"], 2);
        assert_eq!(value["msg"]["data"]["colorTemInKelvin"], 0);
    }

    #[test]
    fn test_brightness_request_clamped() {
        let value: Value = serde_json::from_slice(&brightness_request(180)).unwrap();
        assert_eq!(value["msg"]["data"]["value"], 100);
        let value: Value = serde_json::from_slice(&brightness_request(0)).unwrap();
        assert_eq!(value["msg"]["data"]["value"], 1);
    }

    #[test]
    fn test_turn_request_values() {
        let on: Value = serde_json::from_slice(&turn_request(true)).unwrap();
        let off: Value = serde_json::from_slice(&turn_request(false)).unwrap();
        assert_eq!(on["msg"]["cmd"], "turn");
        assert_eq!(on["msg"]["data"]["value"], 1);
        assert_eq!(off["msg"]["data"]["value"], 0);
    }

    #[test]
    fn test_parse_scan_reply_and_match_mac() {
        let reply = br#"{"msg":{"cmd":"scan","data":{"ip":"192.168.1.23","device":"1F:80:5C:E7:53:34:20:4C","sku":"H6022","bleVersionHard":"3.01.01"}}}"#;
        let scan = parse_scan_reply(reply).unwrap();
        assert_eq!(scan.ip, "192.168.1.23");
        assert!(scan.matches_mac("5c:e7:53:34:20:4c"));
        assert!(!scan.matches_mac("AA:BB:CC:DD:EE:FF"));
        assert!(!scan.matches_mac(""));
    }

    #[test]
    fn test_parse_status_reply() {
        let reply = br#"{"msg":{"cmd":"devStatus","data":{"onOff":1,"brightness":42,"color":{"r":255,"g":200,"b":100},"colorTemInKelvin":0}}}"#;
        let status = parse_status_reply(reply).unwrap();
        assert_eq!(
            status,
            Some(DeviceStatus::lit(LampState::new(Rgb::new(255, 200, 100), 42)))
        );
    }

    #[test]
    fn test_parse_status_reply_switched_off() {
        let reply = br#"{"msg":{"cmd":"devStatus","data":{"onOff":0,"brightness":42,"color":{"r":255,"g":200,"b":100}}}}"#;
        let status = parse_status_reply(reply).unwrap().unwrap();
        assert!(!status.on);
        assert_eq!(status.state, LampState::new(Rgb::new(255, 200, 100), 42));
    }

    #[test]
    fn test_parse_status_reply_packed_color() {
        let reply = br#"{"msg":{"cmd":"devStatus","data":{"brightness":10,"color":16711680}}}"#;
        let status = parse_status_reply(reply).unwrap().unwrap();
        assert_eq!(status.state, LampState::new(Rgb::new(255, 0, 0), 10));
        assert!(status.on);
    }

    #[test]
    fn test_wrong_reply_rejected() {
        let reply = br#"{"msg":{"cmd":"scan","data":{}}}"#;
        assert!(parse_status_reply(reply).is_err());
        assert!(parse_status_reply(b"garbage").is_err());
    }

    #[test]
    fn test_partial_status_is_none() {
        let reply = br#"{"msg":{"cmd":"devStatus","data":{"onOff":1}}}"#;
        assert_eq!(parse_status_reply(reply).unwrap(), None);
    }
}
