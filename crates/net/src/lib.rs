//! Connection-oriented game networking over UDP.
//!
//! A [`ReliableChannel`] carries at most one reliable payload in flight plus
//! best-effort data in every datagram. [`Client`] and [`Server`] drive the
//! connect handshake and the in-game exchange on non-blocking sockets, one
//! tick at a time.

pub mod address;
pub mod buffer;
pub mod channel;
pub mod client;
pub mod config;
pub mod connection;
pub mod console;
pub mod error;
pub mod events;
pub mod protocol;
pub mod server;
pub mod simulator;
pub mod socket;
pub mod stats;

pub use address::PeerAddress;
pub use buffer::WireBuffer;
pub use channel::{ReliableChannel, sequence_newer};
pub use client::Client;
pub use config::{ClientConfig, MAX_PACKETS_PER_TICK, ServerConfig};
pub use connection::{ClientConnection, ConnectionManager};
pub use console::{CommandOutcome, ConsoleCommand};
pub use error::{ChannelError, ClientError, ConsoleError, ProtocolError, ServerError, SocketError};
pub use events::{ClientEvent, ConnectionState, DisconnectReason, ServerEvent};
pub use protocol::{
    ClientGameMessage, ClientRequest, DEFAULT_PORT, MAX_DATAGRAM_SIZE, MAX_RELIABLE_PAYLOAD,
    ServerGameMessage, ServerReply,
};
pub use server::Server;
pub use simulator::{PacketLossSimulation, SimulatedNetwork, SimulatedSocket};
pub use socket::{DatagramSocket, PlatformSockets, PlatformUdpSocket, SocketFactory};
pub use stats::NetworkStats;
