use std::io;

use crate::address::PeerAddress;

#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("unable to resolve host name \"{0}\"")]
    Resolve(String),
    #[error("could not bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("could not connect to {addr}: {source}")]
    Connect {
        addr: PeerAddress,
        #[source]
        source: io::Error,
    },
    #[error("send to {addr} failed (error {code:?}): {source}")]
    Send {
        addr: PeerAddress,
        code: Option<i32>,
        #[source]
        source: io::Error,
    },
    #[error("message to {addr} truncated (wanted {wanted}, sent {sent})")]
    MessageLength {
        addr: PeerAddress,
        wanted: usize,
        sent: usize,
    },
    #[error("receive failed (error {code:?}): {source}")]
    Receive {
        code: Option<i32>,
        #[source]
        source: io::Error,
    },
}

/// `EMSGSIZE` on Linux and `WSAEMSGSIZE` on Windows.
const MESSAGE_TOO_LARGE_CODES: [i32; 2] = [90, 10040];

impl SocketError {
    pub fn receive(source: io::Error) -> Self {
        Self::Receive {
            code: source.raw_os_error(),
            source,
        }
    }

    pub fn send(addr: PeerAddress, source: io::Error) -> Self {
        Self::Send {
            addr,
            code: source.raw_os_error(),
            source,
        }
    }

    /// OS error code, when one is known.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Send { code, .. } | Self::Receive { code, .. } => *code,
            Self::Bind { source, .. } | Self::Connect { source, .. } => source.raw_os_error(),
            Self::Resolve(_) | Self::MessageLength { .. } => None,
        }
    }

    /// Errors a UDP socket reports for conditions that do not affect later
    /// datagrams: an ICMP port-unreachable surfacing as a reset, an oversized
    /// datagram, an interrupted call.
    pub fn is_transient(&self) -> bool {
        let source = match self {
            Self::Send { source, .. } | Self::Receive { source, .. } => source,
            Self::MessageLength { .. } => return true,
            _ => return false,
        };

        matches!(
            source.kind(),
            io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionRefused
                | io::ErrorKind::Interrupted
                | io::ErrorKind::TimedOut
        ) || source
            .raw_os_error()
            .is_some_and(|code| MESSAGE_TOO_LARGE_CODES.contains(&code))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("reliable fragment of {len} bytes exceeds the {max} byte limit")]
    FragmentTooLarge { len: usize, max: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),
    #[error("truncated {0} message")]
    Truncated(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Unable to resolve server name \"{0}\".")]
    Resolve(String),
    #[error("The client is already connecting...")]
    AlreadyConnecting,
    #[error("The client is already connected.")]
    AlreadyConnected,
    #[error("The client is not connected.")]
    NotConnected,
    #[error("Could not obtain a client socket.")]
    NoSocket(#[source] SocketError),
    #[error("Couldn't send connection request.")]
    RequestFailed(#[source] SocketError),
    #[error(transparent)]
    Socket(#[from] SocketError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("unknown client {0}")]
    UnknownClient(u32),
    #[error(transparent)]
    Socket(#[from] SocketError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsoleError {
    #[error("unknown command \"{0}\"")]
    UnknownCommand(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}
