use crate::buffer::WireBuffer;
use crate::error::ProtocolError;

/// Largest datagram the transport ever sends, header included. Chosen to stay
/// below the IPv6 minimum MTU.
pub const MAX_DATAGRAM_SIZE: usize = 1400;
pub const HEADER_SIZE: usize = 8;
pub const MAX_RELIABLE_PAYLOAD: usize = MAX_DATAGRAM_SIZE - HEADER_SIZE;

/// First word of every connection-less datagram.
pub const OUT_OF_BAND_SENTINEL: u32 = 0xFFFF_FFFF;

pub const DEFAULT_PORT: u16 = 30000;

/// Remote console output is cut to this many bytes before it is sent back.
pub const RCON_REPLY_LIMIT: usize = 1024 - 16;

/// Consumes the sentinel and returns true for a connection-less datagram.
/// Any other datagram is rewound so the channel can read its header.
pub fn strip_out_of_band(buf: &mut WireBuffer) -> bool {
    buf.rewind();
    if buf.read_u32() == OUT_OF_BAND_SENTINEL && !buf.overflowed() {
        return true;
    }
    buf.rewind();
    false
}

/// Reads the packet id and message type that follow the sentinel.
pub fn read_out_of_band_header(buf: &mut WireBuffer) -> Result<(u32, u8), ProtocolError> {
    let packet_id = buf.read_u32();
    let kind = buf.read_u8();
    if buf.overflowed() {
        return Err(ProtocolError::Truncated("connection-less header"));
    }
    Ok((packet_id, kind))
}

fn begin_out_of_band(packet_id: u32, kind: u8) -> WireBuffer {
    let mut out = WireBuffer::new();
    out.write_u32(OUT_OF_BAND_SENTINEL);
    out.write_u32(packet_id);
    out.write_u8(kind);
    out
}

fn read_field(buf: &mut WireBuffer, what: &'static str) -> Result<String, ProtocolError> {
    buf.read_string().ok_or(ProtocolError::Truncated(what))
}

/// Connection-less requests a client sends to a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    NoOperation,
    Ping,
    Connect {
        player_name: String,
        model_name: String,
    },
    Info,
    RemoteConsoleCommand {
        password: String,
        command: String,
    },
}

impl ClientRequest {
    pub const NO_OPERATION: u8 = 0;
    pub const PING: u8 = 1;
    pub const CONNECT: u8 = 2;
    pub const INFO: u8 = 3;
    pub const REMOTE_CONSOLE_COMMAND: u8 = 4;

    pub fn kind(&self) -> u8 {
        match self {
            Self::NoOperation => Self::NO_OPERATION,
            Self::Ping => Self::PING,
            Self::Connect { .. } => Self::CONNECT,
            Self::Info => Self::INFO,
            Self::RemoteConsoleCommand { .. } => Self::REMOTE_CONSOLE_COMMAND,
        }
    }

    pub fn encode(&self, packet_id: u32) -> WireBuffer {
        let mut out = begin_out_of_band(packet_id, self.kind());
        match self {
            Self::Connect {
                player_name,
                model_name,
            } => {
                out.write_string(player_name);
                out.write_string(model_name);
            }
            Self::RemoteConsoleCommand { password, command } => {
                out.write_string(password);
                out.write_string(command);
            }
            Self::NoOperation | Self::Ping | Self::Info => {}
        }
        out
    }

    /// Reads the body of a request of type `kind`.
    pub fn read(kind: u8, buf: &mut WireBuffer) -> Result<Self, ProtocolError> {
        match kind {
            Self::NO_OPERATION => Ok(Self::NoOperation),
            Self::PING => Ok(Self::Ping),
            Self::CONNECT => Ok(Self::Connect {
                player_name: read_field(buf, "connect")?,
                model_name: read_field(buf, "connect")?,
            }),
            Self::INFO => Ok(Self::Info),
            Self::REMOTE_CONSOLE_COMMAND => Ok(Self::RemoteConsoleCommand {
                password: read_field(buf, "remote console")?,
                command: read_field(buf, "remote console")?,
            }),
            other => Err(ProtocolError::UnknownMessageType(other)),
        }
    }
}

/// Connection-less replies a server sends back, echoing the request's packet id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerReply {
    Ack { game_name: Option<String> },
    Nack { reason: String },
    RccReply { output: String },
}

impl ServerReply {
    const ACK: u8 = 0;
    const NACK: u8 = 1;
    const RCC_REPLY: u8 = 2;

    pub fn kind(&self) -> u8 {
        match self {
            Self::Ack { .. } => Self::ACK,
            Self::Nack { .. } => Self::NACK,
            Self::RccReply { .. } => Self::RCC_REPLY,
        }
    }

    pub fn encode(&self, packet_id: u32) -> WireBuffer {
        let mut out = begin_out_of_band(packet_id, self.kind());
        match self {
            Self::Ack { game_name } => {
                if let Some(name) = game_name {
                    out.write_string(name);
                }
            }
            Self::Nack { reason } => out.write_string(reason),
            Self::RccReply { output } => out.write_string(output),
        }
        out
    }

    pub fn read(kind: u8, buf: &mut WireBuffer) -> Result<Self, ProtocolError> {
        match kind {
            Self::ACK => {
                let game_name = if buf.is_exhausted() {
                    None
                } else {
                    Some(read_field(buf, "ack")?)
                };
                Ok(Self::Ack { game_name })
            }
            Self::NACK => Ok(Self::Nack {
                reason: read_field(buf, "nack")?,
            }),
            Self::RCC_REPLY => Ok(Self::RccReply {
                output: read_field(buf, "remote console reply")?,
            }),
            other => Err(ProtocolError::UnknownMessageType(other)),
        }
    }
}

/// In-game messages from client to server, carried inside channel payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientGameMessage {
    Disconnect,
    SayToAll(String),
}

impl ClientGameMessage {
    const DISCONNECT: u8 = 0;
    const SAY_TO_ALL: u8 = 1;

    pub fn write(&self, out: &mut WireBuffer) {
        match self {
            Self::Disconnect => out.write_u8(Self::DISCONNECT),
            Self::SayToAll(text) => {
                out.write_u8(Self::SAY_TO_ALL);
                out.write_string(text);
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = WireBuffer::new();
        self.write(&mut out);
        out.into_bytes()
    }

    /// Parses every message in the rest of the payload.
    pub fn read_all(buf: &mut WireBuffer) -> Result<Vec<Self>, ProtocolError> {
        let mut messages = Vec::new();
        while !buf.is_exhausted() {
            let message = match buf.read_u8() {
                Self::DISCONNECT => Self::Disconnect,
                Self::SAY_TO_ALL => Self::SayToAll(read_field(buf, "say")?),
                other => return Err(ProtocolError::UnknownMessageType(other)),
            };
            messages.push(message);
        }
        Ok(messages)
    }
}

/// In-game messages from server to client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerGameMessage {
    Chat(String),
    DropClient { client_id: u32, reason: String },
}

impl ServerGameMessage {
    const CHAT: u8 = 0;
    const DROP_CLIENT: u8 = 1;

    pub fn write(&self, out: &mut WireBuffer) {
        match self {
            Self::Chat(text) => {
                out.write_u8(Self::CHAT);
                out.write_string(text);
            }
            Self::DropClient { client_id, reason } => {
                out.write_u8(Self::DROP_CLIENT);
                out.write_u32(*client_id);
                out.write_string(reason);
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = WireBuffer::new();
        self.write(&mut out);
        out.into_bytes()
    }

    pub fn read_all(buf: &mut WireBuffer) -> Result<Vec<Self>, ProtocolError> {
        let mut messages = Vec::new();
        while !buf.is_exhausted() {
            let message = match buf.read_u8() {
                Self::CHAT => Self::Chat(read_field(buf, "chat")?),
                Self::DROP_CLIENT => {
                    let client_id = buf.read_u32();
                    let reason = read_field(buf, "drop client")?;
                    Self::DropClient { client_id, reason }
                }
                other => return Err(ProtocolError::UnknownMessageType(other)),
            };
            messages.push(message);
        }
        Ok(messages)
    }
}
