//! Inbound mesh message, normalized for relay and command handling.

/// A received channel message after user/body splitting.
///
/// Mesh clients conventionally send `"<user>: <text>"`; when a `:` is present the
/// left part (trimmed) becomes `user` and the right part (left-trimmed) the `body`.
/// Otherwise the whole raw text is the body and no user is set.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub channel_index: u8,
    pub raw_text: String,
    /// Sender clock at transmit time, Unix seconds.
    pub sender_timestamp: f64,
    /// Relay hops travelled before reaching this node.
    pub hop_count: u32,
    /// Receive SNR in dB when the radio reports it.
    pub snr: Option<f32>,
    pub user: Option<String>,
    pub body: String,
}

impl InboundMessage {
    pub fn new(
        channel_index: u8,
        raw_text: String,
        sender_timestamp: f64,
        hop_count: u32,
        snr: Option<f32>,
    ) -> Self {
        let (user, body) = split_user(&raw_text);
        Self {
            channel_index,
            raw_text,
            sender_timestamp,
            hop_count,
            snr,
            user,
            body,
        }
    }
}

fn split_user(text: &str) -> (Option<String>, String) {
    match text.split_once(':') {
        Some((user, body)) => (Some(user.trim().to_string()), body.trim_start().to_string()),
        None => (None, text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_user_on_first_colon() {
        let m = InboundMessage::new(0, "alice: hello: world".to_string(), 0.0, 0, None);
        assert_eq!(m.user.as_deref(), Some("alice"));
        assert_eq!(m.body, "hello: world");
        assert_eq!(m.raw_text, "alice: hello: world");
    }

    #[test]
    fn no_colon_means_no_user() {
        let m = InboundMessage::new(3, "just text".to_string(), 0.0, 0, None);
        assert_eq!(m.user, None);
        assert_eq!(m.body, "just text");
    }

    #[test]
    fn trims_user_and_left_trims_body() {
        let m = InboundMessage::new(0, "  bob  :   hi".to_string(), 0.0, 0, None);
        assert_eq!(m.user.as_deref(), Some("bob"));
        assert_eq!(m.body, "hi");
    }
}
