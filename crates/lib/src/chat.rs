//! Chat-side command surface: poll the watched chat channel and turn
//! `$pub`/`$test`/`help` into mesh sends or usage replies.
//!
//! Thin boundary shim. The bridge never touches the mesh session itself; it
//! queues sends for the listener loop, which stays the single session owner.

use crate::mesh::OutboundSend;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

const HELP_TEXT: [&str; 2] = [
    "$pub <msg>: send a msg in Public",
    "$test <msg>: send a msg in #test",
];

/// A message fetched from the chat REST API (subset of fields).
#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    #[serde(default)]
    pub content: String,
    pub author: ChatAuthor,
}

#[derive(Debug, Deserialize)]
pub struct ChatAuthor {
    pub username: String,
}

/// What a chat message asks the bridge to do.
#[derive(Debug, PartialEq, Eq)]
pub enum ChatAction {
    MeshSend(OutboundSend),
    Help,
    None,
}

/// Map a chat message to an action. Both `$pub` and `$test` target the public
/// channel; the author is prefixed so mesh users see who wrote it.
pub fn parse_chat_command(author: &str, content: &str) -> ChatAction {
    if let Some(rest) = content.strip_prefix("$pub") {
        ChatAction::MeshSend(OutboundSend {
            text: format!("[{}]{}", author, rest.trim_start()),
        })
    } else if let Some(rest) = content.strip_prefix("$test") {
        ChatAction::MeshSend(OutboundSend {
            text: format!("[{}]{}", author, rest.trim_start()),
        })
    } else if content == "help" {
        ChatAction::Help
    } else {
        ChatAction::None
    }
}

/// Polls the watched chat channel and executes the command surface.
pub struct ChatBridge {
    client: reqwest::Client,
    api_base: String,
    token: String,
    channel_id: u64,
    outbound: mpsc::Sender<OutboundSend>,
    running: AtomicBool,
}

impl ChatBridge {
    pub fn new(
        api_base: impl Into<String>,
        token: impl Into<String>,
        channel_id: u64,
        outbound: mpsc::Sender<OutboundSend>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            token: token.into(),
            channel_id,
            outbound,
            running: AtomicBool::new(false),
        }
    }

    fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Start the poll loop. Returns a handle to await on shutdown.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        log::info!("chat bridge: starting message poll loop");
        tokio::spawn(async move {
            run_poll_loop(self).await;
        })
    }

    /// Fetch messages newer than `after`. The first call (no watermark) fetches
    /// only the newest message to seed the watermark.
    async fn fetch_after(&self, after: Option<u64>) -> Result<Vec<ChatMessage>, String> {
        let url = match after {
            Some(id) => format!(
                "{}/channels/{}/messages?after={}&limit=50",
                self.api_base, self.channel_id, id
            ),
            None => format!("{}/channels/{}/messages?limit=1", self.api_base, self.channel_id),
        };
        let res = self
            .client
            .get(&url)
            .header("Authorization", format!("Bot {}", self.token))
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("message fetch failed: {} {}", status, body));
        }
        res.json().await.map_err(|e| e.to_string())
    }

    /// Post a reply into the watched channel (used for `help`).
    async fn post_chat(&self, content: &str) -> Result<(), String> {
        let url = format!("{}/channels/{}/messages", self.api_base, self.channel_id);
        let body = serde_json::json!({ "content": content });
        let res = self
            .client
            .post(&url)
            .header("Authorization", format!("Bot {}", self.token))
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("reply failed: {} {}", status, body));
        }
        Ok(())
    }

    async fn handle(&self, message: &ChatMessage) {
        match parse_chat_command(&message.author.username, &message.content) {
            ChatAction::MeshSend(send) => {
                if self.outbound.send(send).await.is_err() {
                    log::warn!("chat bridge: outbound queue closed");
                }
            }
            ChatAction::Help => {
                for line in HELP_TEXT {
                    if let Err(e) = self.post_chat(line).await {
                        log::warn!("chat bridge: help reply failed: {}", e);
                    }
                }
            }
            ChatAction::None => {}
        }
    }
}

async fn run_poll_loop(bridge: Arc<ChatBridge>) {
    let mut last_id: Option<u64> = None;
    while bridge.running() {
        match bridge.fetch_after(last_id).await {
            Ok(mut messages) => {
                // newest first on the wire; process oldest first
                messages.sort_by_key(|m| m.id.parse::<u64>().unwrap_or(0));
                let seeded = last_id.is_some();
                for message in &messages {
                    if seeded {
                        bridge.handle(message).await;
                    }
                    if let Ok(id) = message.id.parse::<u64>() {
                        if Some(id) > last_id {
                            last_id = Some(id);
                        }
                    }
                }
            }
            Err(e) => log::debug!("chat poll error: {}", e),
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    log::info!("chat bridge: poll loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pub_prefix_maps_to_public_send_with_author() {
        assert_eq!(
            parse_chat_command("tester", "$pub hello"),
            ChatAction::MeshSend(OutboundSend {
                text: "[tester]hello".to_string()
            })
        );
    }

    #[test]
    fn test_prefix_also_targets_public() {
        assert_eq!(
            parse_chat_command("tester", "$test   status check"),
            ChatAction::MeshSend(OutboundSend {
                text: "[tester]status check".to_string()
            })
        );
    }

    #[test]
    fn help_and_chatter() {
        assert_eq!(parse_chat_command("tester", "help"), ChatAction::Help);
        assert_eq!(parse_chat_command("tester", "hello there"), ChatAction::None);
        assert_eq!(parse_chat_command("tester", "HELP"), ChatAction::None);
    }

    #[tokio::test]
    async fn handled_command_lands_on_the_outbound_queue() {
        let (tx, mut rx) = mpsc::channel(8);
        let bridge = ChatBridge::new("http://unused.invalid", "token", 1, tx);
        let message = ChatMessage {
            id: "100".to_string(),
            content: "$pub hello".to_string(),
            author: ChatAuthor {
                username: "tester".to_string(),
            },
        };
        bridge.handle(&message).await;
        assert_eq!(
            rx.try_recv().expect("queued send"),
            OutboundSend {
                text: "[tester]hello".to_string()
            }
        );
        assert!(rx.try_recv().is_err());
    }
}
