//! Mesh device side: wire protocol, session, channel discovery, and the
//! listener loop that drives the bridge.

mod listener;
mod protocol;
mod registry;
mod session;

pub use listener::{ListenerHandle, MeshListener, OutboundSend};
pub use protocol::{ChannelInfo, DeviceCommand, DeviceEvent, MessagePayload, SendAck};
pub use registry::{Channel, ChannelRegistry, WellKnown, WellKnownNames};
pub use session::{MeshConnector, MeshError, MeshSession, Poll, TcpMeshConnector};
