use std::fmt;

use crate::address::PeerAddress;

/// Connection state of a client, as reported to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    InGame,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::InGame => "ingame",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    StateChanged { state: ConnectionState },
    /// Text meant for the user's console.
    Message(String),
    RconReply(String),
    /// Payload of an in-band datagram accepted by the channel.
    Payload { sequence: u32, bytes: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    ClientConnected {
        client_id: u32,
        addr: PeerAddress,
        player_name: String,
        model_name: String,
    },
    ClientDisconnected {
        client_id: u32,
        reason: DisconnectReason,
    },
    ConnectionDenied {
        addr: PeerAddress,
        reason: String,
    },
    Payload {
        client_id: u32,
        sequence: u32,
        bytes: Vec<u8>,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Graceful,
    Timeout,
    Kicked,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::Graceful => "disconnected",
            DisconnectReason::Timeout => "timed out",
            DisconnectReason::Kicked => "kicked",
        }
    }
}
