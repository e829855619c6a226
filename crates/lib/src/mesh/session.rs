//! Mesh connection and session: typed operations over the line-framed wire protocol.
//!
//! The listener owns exactly one session at a time and replaces it wholesale on
//! error; nothing here is shared across tasks.

use crate::mesh::protocol::{ChannelInfo, DeviceCommand, DeviceEvent, MessagePayload, SendAck};
use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("mesh transport: {0}")]
    Io(#[from] std::io::Error),
    #[error("mesh device: {0}")]
    Device(String),
    #[error("unexpected frame: {0}")]
    Protocol(String),
    #[error("connection closed by device")]
    Closed,
}

/// One poll result: a channel message, or nothing waiting on the device.
#[derive(Debug)]
pub enum Poll {
    Message(MessagePayload),
    Empty,
}

/// Typed operations against a connected mesh device.
#[async_trait]
pub trait MeshSession: Send {
    /// Channel metadata at `idx`. `Ok(None)` means no channel there: the end of
    /// enumeration, not a failure.
    async fn get_channel(&mut self, idx: u8) -> Result<Option<ChannelInfo>, MeshError>;

    /// Next queued message, or [`Poll::Empty`] when the device has none.
    async fn get_msg(&mut self) -> Result<Poll, MeshError>;

    /// Send `text` on channel `idx`. The returned ack must be observed before the
    /// next send; the radio link drops messages otherwise.
    async fn send_chan_msg(&mut self, idx: u8, text: &str) -> Result<SendAck, MeshError>;
}

/// Opens fresh sessions; the listener reconnects by asking for a new one and
/// discarding the old.
#[async_trait]
pub trait MeshConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn MeshSession>, MeshError>;
}

/// Session over a TCP companion connection.
pub struct TcpMeshSession {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    line: String,
}

impl TcpMeshSession {
    async fn round_trip(&mut self, cmd: &DeviceCommand) -> Result<DeviceEvent, MeshError> {
        let mut frame =
            serde_json::to_string(cmd).map_err(|e| MeshError::Protocol(e.to_string()))?;
        frame.push('\n');
        self.writer.write_all(frame.as_bytes()).await?;
        self.line.clear();
        let n = self.reader.read_line(&mut self.line).await?;
        if n == 0 {
            return Err(MeshError::Closed);
        }
        let line = self.line.trim_end();
        serde_json::from_str(line).map_err(|e| MeshError::Protocol(format!("{}: {}", e, line)))
    }
}

#[async_trait]
impl MeshSession for TcpMeshSession {
    async fn get_channel(&mut self, idx: u8) -> Result<Option<ChannelInfo>, MeshError> {
        match self
            .round_trip(&DeviceCommand::GetChannel { channel_idx: idx })
            .await?
        {
            DeviceEvent::ChannelInfo(info) => Ok(Some(info)),
            DeviceEvent::Error { .. } => Ok(None),
            other => Err(MeshError::Protocol(format!(
                "unexpected reply to get_channel: {:?}",
                other
            ))),
        }
    }

    async fn get_msg(&mut self) -> Result<Poll, MeshError> {
        match self.round_trip(&DeviceCommand::GetMsg).await? {
            DeviceEvent::ChannelMsg(payload) => Ok(Poll::Message(payload)),
            DeviceEvent::NoMoreMsgs => Ok(Poll::Empty),
            DeviceEvent::Error { reason } => Err(MeshError::Device(reason)),
            other => Err(MeshError::Protocol(format!(
                "unexpected reply to get_msg: {:?}",
                other
            ))),
        }
    }

    async fn send_chan_msg(&mut self, idx: u8, text: &str) -> Result<SendAck, MeshError> {
        match self
            .round_trip(&DeviceCommand::SendChanMsg {
                channel_idx: idx,
                text: text.to_string(),
            })
            .await?
        {
            DeviceEvent::MsgSent(ack) => Ok(ack),
            DeviceEvent::Error { reason } => Err(MeshError::Device(reason)),
            other => Err(MeshError::Protocol(format!(
                "unexpected reply to send_chan_msg: {:?}",
                other
            ))),
        }
    }
}

/// Connects to a companion device over TCP.
pub struct TcpMeshConnector {
    host: String,
    port: u16,
}

impl TcpMeshConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

#[async_trait]
impl MeshConnector for TcpMeshConnector {
    async fn connect(&self) -> Result<Box<dyn MeshSession>, MeshError> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        let (read, write) = stream.into_split();
        Ok(Box::new(TcpMeshSession {
            reader: BufReader::new(read),
            writer: write,
            line: String::new(),
        }))
    }
}
