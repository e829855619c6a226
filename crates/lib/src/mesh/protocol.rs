//! Mesh device wire protocol: newline-delimited JSON frames over TCP.
//!
//! The companion device answers every command with exactly one event frame.
//! `error` doubles as the end-of-enumeration signal for `get_channel`.

use serde::{Deserialize, Serialize};

/// Command frame: `{ "cmd": "get_msg" }`, `{ "cmd": "get_channel", "channel_idx": 0 }`, ...
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum DeviceCommand {
    GetChannel { channel_idx: u8 },
    GetMsg,
    SendChanMsg { channel_idx: u8, text: String },
}

/// Event frame: `{ "event": "channel_msg", ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeviceEvent {
    ChannelInfo(ChannelInfo),
    ChannelMsg(MessagePayload),
    NoMoreMsgs,
    MsgSent(SendAck),
    Error {
        #[serde(default)]
        reason: String,
    },
}

/// Channel metadata returned by `get_channel`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub channel_idx: u8,
    pub channel_name: String,
}

/// Payload of a received channel message. `channel_idx` and `text` are optional on
/// the wire; frames missing either are dropped by the listener, not treated as errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    #[serde(default)]
    pub channel_idx: Option<u8>,
    #[serde(default)]
    pub text: Option<String>,
    /// Sender clock at transmit time, Unix seconds.
    #[serde(default)]
    pub sender_timestamp: f64,
    /// Relay hops travelled.
    #[serde(default)]
    pub path_len: u32,
    /// Receive SNR in dB. Not reported by all firmware.
    #[serde(default)]
    pub snr: Option<f32>,
}

/// Acknowledgment for `send_chan_msg`. The radio link is unreliable unless the
/// caller observes this frame before issuing the next send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendAck {
    #[serde(default)]
    pub expected_ack: Option<String>,
    #[serde(default)]
    pub suggested_timeout_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_frames_have_documented_shape() {
        let cmd = DeviceCommand::GetChannel { channel_idx: 2 };
        assert_eq!(
            serde_json::to_string(&cmd).expect("serialize"),
            r#"{"cmd":"get_channel","channel_idx":2}"#
        );
        let cmd = DeviceCommand::GetMsg;
        assert_eq!(
            serde_json::to_string(&cmd).expect("serialize"),
            r#"{"cmd":"get_msg"}"#
        );
    }

    #[test]
    fn channel_msg_tolerates_missing_fields() {
        let event: DeviceEvent =
            serde_json::from_str(r#"{"event":"channel_msg","text":"hi"}"#).expect("parse");
        match event {
            DeviceEvent::ChannelMsg(p) => {
                assert_eq!(p.text.as_deref(), Some("hi"));
                assert_eq!(p.channel_idx, None);
                assert_eq!(p.snr, None);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn error_event_parses_without_reason() {
        let event: DeviceEvent = serde_json::from_str(r#"{"event":"error"}"#).expect("parse");
        assert!(matches!(event, DeviceEvent::Error { .. }));
    }
}
