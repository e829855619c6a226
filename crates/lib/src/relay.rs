//! Chat-side delivery: webhook sink and the mesh→chat relay policy.
//!
//! Delivery is at-most-once and best-effort: failures are logged by the sink and
//! never reach the listener loop.

use crate::mesh::WellKnown;
use crate::message::InboundMessage;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Destination for chat notifications.
#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn post(&self, content: &str);
}

/// Webhook sink: JSON POST of `{"content": ...}` to a configured endpoint.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: String) -> Self {
        // Some proxies return 403 without an explicit user agent.
        let client = reqwest::Client::builder()
            .user_agent(concat!("meshbot/", env!("CARGO_PKG_VERSION")))
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("webhook client options rejected ({}), using defaults", e);
                reqwest::Client::new()
            });
        Self { client, url }
    }
}

#[async_trait]
impl ChatSink for WebhookSink {
    async fn post(&self, content: &str) {
        let body = serde_json::json!({ "content": content });
        match self.client.post(&self.url).json(&body).send().await {
            Ok(res) if !res.status().is_success() => {
                log::warn!("webhook HTTP {}", res.status());
            }
            Ok(_) => {}
            Err(e) => log::warn!("webhook delivery failed: {}", e),
        }
    }
}

/// Mirrors mesh traffic to chat for the allow-listed well-known channels.
pub struct RelayForwarder {
    sink: Option<Arc<dyn ChatSink>>,
}

impl RelayForwarder {
    /// `sink: None` disables chat delivery entirely (debug mode or no webhook configured).
    pub fn new(sink: Option<Arc<dyn ChatSink>>) -> Self {
        Self { sink }
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Mirror a message to chat when its channel is allow-listed. Spawned in the
    /// background; never blocks the caller and the outcome is only logged.
    pub fn forward(&self, message: &InboundMessage, channel_name: &str, well_known: &WellKnown) {
        let idx = message.channel_index;
        if idx != well_known.public && idx != well_known.test && idx != well_known.bot {
            return;
        }
        let content = match &message.user {
            Some(user) => format!("[{}] {}: {}", channel_name, user, message.body),
            None => format!("[{}] {}", channel_name, message.raw_text),
        };
        self.spawn_post(content);
    }

    /// Post arbitrary content (e.g. a command reply mirror) without blocking.
    pub fn spawn_post(&self, content: String) {
        let sink = match &self.sink {
            Some(sink) => Arc::clone(sink),
            None => return,
        };
        tokio::spawn(async move {
            sink.post(&content).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::task::yield_now;

    #[derive(Default)]
    struct RecordingSink {
        posts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatSink for RecordingSink {
        async fn post(&self, content: &str) {
            self.posts.lock().expect("lock").push(content.to_string());
        }
    }

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

    async fn drain() {
        for _ in 0..10 {
            yield_now().await;
        }
    }

    #[tokio::test]
    async fn forwards_allow_listed_channel_with_user() {
        let sink = Arc::new(RecordingSink::default());
        let forwarder = RelayForwarder::new(Some(sink.clone()));
        forwarder.forward(&message(0, "alice: hi mesh"), "Public", &well_known());
        drain().await;
        assert_eq!(
            *sink.posts.lock().expect("lock"),
            vec!["[Public] alice: hi mesh".to_string()]
        );
    }

    #[tokio::test]
    async fn forwards_raw_text_when_no_user() {
        let sink = Arc::new(RecordingSink::default());
        let forwarder = RelayForwarder::new(Some(sink.clone()));
        forwarder.forward(&message(1, "beacon online"), "#test", &well_known());
        drain().await;
        assert_eq!(
            *sink.posts.lock().expect("lock"),
            vec!["[#test] beacon online".to_string()]
        );
    }

    #[tokio::test]
    async fn non_allow_listed_channel_is_not_forwarded() {
        let sink = Arc::new(RecordingSink::default());
        let forwarder = RelayForwarder::new(Some(sink.clone()));
        forwarder.forward(&message(5, "alice: private stuff"), "#ops", &well_known());
        drain().await;
        assert!(sink.posts.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn no_sink_means_no_delivery() {
        let forwarder = RelayForwarder::new(None);
        // must not panic or spawn anything
        forwarder.forward(&message(0, "alice: hi"), "Public", &well_known());
        forwarder.spawn_post("direct".to_string());
        assert!(!forwarder.has_sink());
    }
}
