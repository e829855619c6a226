//! In-band bot commands arriving from the mesh.
//!
//! A message addresses the bot when it arrives on the bot channel, or when its
//! body starts with the configured mention token (case-insensitive). In the
//! mention case the command text is everything after the first `]`; a missing
//! `]` means the message is not a command at all.

use crate::mesh::WellKnown;
use crate::message::InboundMessage;
use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

pub const MAGIC8_REPLIES: [&str; 20] = [
    "It is certain.",
    "It is decidedly so.",
    "Without a doubt.",
    "Yes definitely.",
    "You may rely on it.",
    "As I see it, yes.",
    "Most likely.",
    "Outlook good.",
    "Yes.",
    "Signs point to yes.",
    "Reply hazy, try again.",
    "Ask again later.",
    "Better not tell you now.",
    "Cannot predict now.",
    "Concentrate and ask again.",
    "Don't count on it.",
    "My reply is no.",
    "My sources say no.",
    "Outlook not so good.",
    "Very doubtful.",
];

/// Recognized command keywords. Unknown keywords are silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BotCommand {
    Test,
    Magic8,
}

impl BotCommand {
    fn from_keyword(word: &str) -> Option<Self> {
        if word.eq_ignore_ascii_case("test") {
            Some(Self::Test)
        } else if word.eq_ignore_ascii_case("magic8") {
            Some(Self::Magic8)
        } else {
            None
        }
    }
}

/// Reply text to send back on the originating mesh channel (and conditionally
/// mirror to chat).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    pub text: String,
}

/// Recognizes and executes bot commands embedded in mesh messages.
pub struct CommandDispatcher {
    mention: String,
}

impl CommandDispatcher {
    /// `mention` is the token that addresses the bot from any channel, e.g. "@[msg bot".
    pub fn new(mention: &str) -> Self {
        Self {
            mention: mention.to_lowercase(),
        }
    }

    /// Returns the reply for a recognized command, or `None` when the message does
    /// not address the bot or the keyword is unknown.
    pub fn maybe_handle(
        &self,
        message: &InboundMessage,
        well_known: &WellKnown,
        now: SystemTime,
    ) -> Option<CommandReply> {
        let text = self.command_text(message, well_known)?.trim_start();
        let keyword = text.split_whitespace().next().unwrap_or("");
        match BotCommand::from_keyword(keyword)? {
            BotCommand::Test => Some(test_reply(message, text, now)),
            BotCommand::Magic8 => Some(magic8_reply(message)),
        }
    }

    fn command_text<'a>(
        &self,
        message: &'a InboundMessage,
        well_known: &WellKnown,
    ) -> Option<&'a str> {
        if message.channel_index == well_known.bot {
            return Some(&message.body);
        }
        if message.body.to_lowercase().starts_with(&self.mention) {
            if let Some(pos) = message.body.find(']') {
                return Some(&message.body[pos + 1..]);
            }
        }
        None
    }
}

/// Diagnostic echo: `ack [<user>]<text>|SNR:<snr>|hops:<hops>|<elapsed>ms`.
fn test_reply(message: &InboundMessage, text: &str, now: SystemTime) -> CommandReply {
    let now_secs = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    let elapsed_ms = ((now_secs - message.sender_timestamp) * 1000.0).round() as i64;
    let snr = message
        .snr
        .map(|v| v.to_string())
        .unwrap_or_else(|| "n/a".to_string());
    CommandReply {
        text: format!(
            "ack [{}]{}|SNR:{}|hops:{}|{}ms",
            message.user.as_deref().unwrap_or(""),
            text,
            snr,
            message.hop_count,
            elapsed_ms
        ),
    }
}

fn magic8_reply(message: &InboundMessage) -> CommandReply {
    let pick = rand::thread_rng().gen_range(0..MAGIC8_REPLIES.len());
    CommandReply {
        text: format!(
            "[{}]{}",
            message.user.as_deref().unwrap_or(""),
            MAGIC8_REPLIES[pick]
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn well_known() -> WellKnown {
        WellKnown {
            public: 0,
            test: 1,
            bot: 2,
        }
    }

    fn message(channel_index: u8, raw: &str) -> InboundMessage {
        InboundMessage::new(channel_index, raw.to_string(), 0.0, 0, None)
    }

    fn dispatcher() -> CommandDispatcher {
        CommandDispatcher::new("@[msg bot")
    }

    #[test]
    fn bot_channel_message_is_always_a_command() {
        let reply = dispatcher().maybe_handle(
            &message(2, "magic8 will it rain"),
            &well_known(),
            SystemTime::now(),
        );
        assert!(reply.is_some());
    }

    #[test]
    fn mention_with_delimiter_is_recognized_case_insensitively() {
        let reply = dispatcher().maybe_handle(
            &message(0, "@[Msg Bot] magic8"),
            &well_known(),
            SystemTime::now(),
        );
        assert!(reply.is_some());
    }

    #[test]
    fn mention_without_delimiter_is_not_a_command() {
        let reply = dispatcher().maybe_handle(
            &message(0, "@[msg bot magic8"),
            &well_known(),
            SystemTime::now(),
        );
        assert_eq!(reply, None);
    }

    #[test]
    fn unknown_keyword_is_ignored() {
        let reply =
            dispatcher().maybe_handle(&message(2, "weather"), &well_known(), SystemTime::now());
        assert_eq!(reply, None);
    }

    #[test]
    fn plain_chatter_off_bot_channel_is_ignored() {
        let reply = dispatcher().maybe_handle(
            &message(0, "alice: test this radio"),
            &well_known(),
            SystemTime::now(),
        );
        assert_eq!(reply, None);
    }

    #[test]
    fn test_command_reports_hops_and_elapsed() {
        let now = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let sent = 1_700_000_000.0 - 2.345;
        let msg = InboundMessage::new(2, "carol: test ping".to_string(), sent, 3, None);
        let reply = dispatcher()
            .maybe_handle(&msg, &well_known(), now)
            .expect("reply");
        assert!(reply.text.starts_with("ack [carol]test ping|"), "{}", reply.text);
        assert!(reply.text.contains("|hops:3|"), "{}", reply.text);
        assert!(reply.text.contains("|SNR:n/a|"), "{}", reply.text);
        assert!(reply.text.ends_with("|2345ms"), "{}", reply.text);
    }

    #[test]
    fn test_command_renders_snr_when_present() {
        let now = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let msg = InboundMessage::new(2, "test".to_string(), 1_700_000_000.0, 1, Some(-7.5));
        let reply = dispatcher()
            .maybe_handle(&msg, &well_known(), now)
            .expect("reply");
        assert!(reply.text.contains("|SNR:-7.5|"), "{}", reply.text);
    }

    #[test]
    fn magic8_reply_is_a_canned_phrase_with_user_prefix() {
        let reply = dispatcher()
            .maybe_handle(
                &message(0, "dave: @[msg bot] magic8 should I?"),
                &well_known(),
                SystemTime::now(),
            )
            .expect("reply");
        let phrase = reply.text.strip_prefix("[dave]").expect("user prefix");
        assert!(MAGIC8_REPLIES.contains(&phrase), "{}", reply.text);
    }

    #[test]
    fn magic8_is_roughly_uniform() {
        let d = dispatcher();
        let msg = message(2, "magic8");
        let mut counts: HashMap<String, u32> = HashMap::new();
        for _ in 0..4000 {
            let reply = d
                .maybe_handle(&msg, &well_known(), SystemTime::now())
                .expect("reply");
            *counts.entry(reply.text).or_default() += 1;
        }
        assert_eq!(counts.len(), MAGIC8_REPLIES.len());
        // expected 200 per phrase; a wide band still catches a broken RNG
        for (text, n) in counts {
            assert!((100..=320).contains(&n), "{}: {}", text, n);
        }
    }
}
