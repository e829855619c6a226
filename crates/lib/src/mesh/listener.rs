//! Mesh listener: connection lifecycle and the poll/dispatch loop.
//!
//! One task owns the session for a connection epoch. A protocol error during
//! polling abandons the session and registry wholesale; the next epoch starts
//! with a fresh connect and re-discovery. All mesh sends (command replies and
//! chat-originated sends) go through this loop, so nothing else ever writes to
//! the session.

use crate::commands::CommandDispatcher;
use crate::mesh::protocol::MessagePayload;
use crate::mesh::registry::{ChannelRegistry, WellKnown, WellKnownNames};
use crate::mesh::session::{MeshConnector, MeshError, MeshSession, Poll};
use crate::message::InboundMessage;
use crate::relay::RelayForwarder;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;

const POLL_IDLE: Duration = Duration::from_millis(500);
const RECONNECT_MIN: Duration = Duration::from_secs(1);
const RECONNECT_MAX: Duration = Duration::from_secs(60);

/// A mesh send requested by the chat side. Sends are resolved to the public
/// channel index at send time, after discovery has bound it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundSend {
    pub text: String,
}

/// Stops the listener loop from another task.
#[derive(Clone)]
pub struct ListenerHandle {
    running: Arc<AtomicBool>,
}

impl ListenerHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Session plus the channel table discovered for it. Replaced as a unit on
/// reconnect; never mutated in place.
struct SessionContext {
    session: Box<dyn MeshSession>,
    registry: ChannelRegistry,
}

/// Owns the mesh connection lifecycle: connect, discover, poll, dispatch, reconnect.
pub struct MeshListener {
    connector: Arc<dyn MeshConnector>,
    dispatcher: CommandDispatcher,
    forwarder: RelayForwarder,
    names: WellKnownNames,
    no_mirror_name: String,
    outbound: mpsc::Receiver<OutboundSend>,
    running: Arc<AtomicBool>,
}

impl MeshListener {
    pub fn new(
        connector: Arc<dyn MeshConnector>,
        dispatcher: CommandDispatcher,
        forwarder: RelayForwarder,
        names: WellKnownNames,
        no_mirror_name: String,
        outbound: mpsc::Receiver<OutboundSend>,
    ) -> Self {
        Self {
            connector,
            dispatcher,
            forwarder,
            names,
            no_mirror_name,
            outbound,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn handle(&self) -> ListenerHandle {
        ListenerHandle {
            running: Arc::clone(&self.running),
        }
    }

    fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run until stopped via [`ListenerHandle::stop`]. Connection failures retry
    /// with capped exponential backoff; session errors reconnect immediately.
    pub async fn run(mut self) {
        let mut backoff = RECONNECT_MIN;
        while self.running() {
            let mut ctx = match self.open_session().await {
                Ok(ctx) => {
                    backoff = RECONNECT_MIN;
                    ctx
                }
                Err(e) => {
                    log::warn!("mesh connect failed: {}; retrying in {:?}", e, backoff);
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(RECONNECT_MAX);
                    continue;
                }
            };
            if let Err(e) = self.listen(&mut ctx).await {
                log::warn!("mesh session error: {}; reconnecting", e);
            }
        }
        log::info!("mesh listener stopped");
    }

    async fn open_session(&self) -> Result<SessionContext, MeshError> {
        let mut session = self.connector.connect().await?;
        let registry =
            ChannelRegistry::discover(session.as_mut(), &self.names, WellKnown::default()).await?;
        Ok(SessionContext { session, registry })
    }

    async fn listen(&mut self, ctx: &mut SessionContext) -> Result<(), MeshError> {
        while self.running() {
            self.drain_outbound(ctx).await?;
            match ctx.session.get_msg().await? {
                Poll::Empty => tokio::time::sleep(POLL_IDLE).await,
                Poll::Message(payload) => self.handle_message(ctx, payload).await?,
            }
        }
        Ok(())
    }

    /// Perform chat-originated sends. The queue is drained here so this loop stays
    /// the only writer to the session.
    async fn drain_outbound(&mut self, ctx: &mut SessionContext) -> Result<(), MeshError> {
        while let Ok(send) = self.outbound.try_recv() {
            let idx = ctx.registry.well_known().public;
            let ack = ctx.session.send_chan_msg(idx, &send.text).await?;
            log::debug!("chat-originated send acked: {:?}", ack);
        }
        Ok(())
    }

    async fn handle_message(
        &mut self,
        ctx: &mut SessionContext,
        payload: MessagePayload,
    ) -> Result<(), MeshError> {
        let (channel_index, text) = match (payload.channel_idx, payload.text.as_deref()) {
            (Some(idx), Some(text)) if !text.is_empty() => (idx, text.to_string()),
            _ => {
                log::info!("dropping payload without channel or text: {:?}", payload);
                return Ok(());
            }
        };
        let message = InboundMessage::new(
            channel_index,
            text,
            payload.sender_timestamp,
            payload.path_len,
            payload.snr,
        );
        let channel_name = match ctx.registry.name_of(channel_index) {
            Some(name) => name.to_string(),
            None => format!("ch{}", channel_index),
        };
        println!("{}", render_console(&self.names, &channel_name, &message));

        let well_known = ctx.registry.well_known();
        self.forwarder.forward(&message, &channel_name, &well_known);

        if let Some(reply) = self
            .dispatcher
            .maybe_handle(&message, &well_known, SystemTime::now())
        {
            // the mesh send is awaited; the chat mirror is not
            let ack = ctx.session.send_chan_msg(channel_index, &reply.text).await?;
            log::debug!("command reply acked: {:?}", ack);
            if channel_name != self.no_mirror_name && self.forwarder.has_sink() {
                self.forwarder
                    .spawn_post(format!("[{}] {}", channel_name, reply.text));
            }
        }
        Ok(())
    }
}

/// Console line for a relayed message. The public and test channels get their
/// conventional background colors; the parsed user is highlighted.
fn render_console(names: &WellKnownNames, channel_name: &str, message: &InboundMessage) -> String {
    let label = if channel_name == names.public {
        format!("\x1b[37;44m{}\x1b[0m", channel_name)
    } else if channel_name == names.test {
        format!("\x1b[37;41m{}\x1b[0m", channel_name)
    } else {
        channel_name.to_string()
    };
    match &message.user {
        Some(user) => format!("{} \x1b[37;44m{}\x1b[0m {}", label, user, message.body),
        None => format!("{} {}", label, message.raw_text),
    }
}
