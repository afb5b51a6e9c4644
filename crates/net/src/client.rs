use std::collections::VecDeque;

use log::{debug, error, info, warn};

use crate::address::PeerAddress;
use crate::buffer::WireBuffer;
use crate::channel::ReliableChannel;
use crate::config::ClientConfig;
use crate::error::{ClientError, SocketError};
use crate::events::{ClientEvent, ConnectionState};
use crate::protocol::{
    read_out_of_band_header, strip_out_of_band, ClientGameMessage, ClientRequest, ServerReply,
};
use crate::socket::{DatagramSocket, SocketFactory};
use crate::stats::NetworkStats;

/// Countdowns within a millisecond of zero count as expired, so that summing
/// frame times like `0.1` still ends exactly at the configured timeout.
const TIMER_SLACK: f32 = 1e-3;

/// Data that only exists while the client is in a game.
#[derive(Debug, Default)]
struct GameSession {
    channel: ReliableChannel,
    reliable: Vec<Vec<u8>>,
    unreliable: Vec<u8>,
}

#[derive(Debug)]
enum ClientState {
    Idle,
    Connecting { packet_id: u32, time_left: f32 },
    InGame(GameSession),
}

/// Client side of a connection, driven by [`Client::tick`].
///
/// The socket is owned here and not by the states: it is created by
/// [`Client::connect`], carried from connecting into the game, and released
/// exactly once whenever the client falls back to idle.
pub struct Client<F: SocketFactory> {
    factory: F,
    config: ClientConfig,
    socket: Option<F::Socket>,
    server: PeerAddress,
    state: ClientState,
    next_packet_id: u32,
    events: VecDeque<ClientEvent>,
    stats: NetworkStats,
}

impl<F: SocketFactory> Client<F> {
    pub fn new(factory: F, config: ClientConfig) -> Self {
        Self {
            factory,
            config,
            socket: None,
            server: PeerAddress::NULL,
            state: ClientState::Idle,
            next_packet_id: 1,
            events: VecDeque::new(),
            stats: NetworkStats::default(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        match self.state {
            ClientState::Idle => ConnectionState::Idle,
            ClientState::Connecting { .. } => ConnectionState::Connecting,
            ClientState::InGame(_) => ConnectionState::InGame,
        }
    }

    /// Server address, or [`PeerAddress::NULL`] while idle.
    pub fn server_address(&self) -> PeerAddress {
        self.server
    }

    pub fn local_address(&self) -> Option<PeerAddress> {
        self.socket.as_ref().map(DatagramSocket::local_addr)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ClientConfig {
        &mut self.config
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    /// Seconds until the pending connection attempt gives up.
    pub fn connect_time_left(&self) -> Option<f32> {
        match self.state {
            ClientState::Connecting { time_left, .. } => Some(time_left),
            _ => None,
        }
    }

    pub fn channel(&self) -> Option<&ReliableChannel> {
        match &self.state {
            ClientState::InGame(session) => Some(&session.channel),
            _ => None,
        }
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = ClientEvent> + '_ {
        self.events.drain(..)
    }

    pub fn connect(&mut self, host: &str, port: u16) -> Result<(), ClientError> {
        match self.state {
            ClientState::Connecting { .. } => return Err(ClientError::AlreadyConnecting),
            ClientState::InGame(_) => return Err(ClientError::AlreadyConnected),
            ClientState::Idle => {}
        }

        let server = self
            .factory
            .resolve(host, port)
            .map_err(|_| ClientError::Resolve(host.to_string()))?;

        let mut socket = self
            .factory
            .bind_udp(self.config.client_port)
            .map_err(ClientError::NoSocket)?;

        let packet_id = self.allocate_packet_id();
        let request = ClientRequest::Connect {
            player_name: self.config.player_name.clone(),
            model_name: self.config.model_name.clone(),
        }
        .encode(packet_id);

        socket
            .send_buffer(&request, server)
            .map_err(ClientError::RequestFailed)?;
        self.stats.record_sent(request.len());

        self.socket = Some(socket);
        self.server = server;
        let timeout = self.config.connect_timeout_secs;
        self.set_state(ClientState::Connecting {
            packet_id,
            time_left: timeout,
        });
        self.message(format!(
            "Connecting to {} (timeout {:.1} seconds)...",
            server, timeout
        ));
        Ok(())
    }

    /// Returns to idle. Does nothing when already idle.
    pub fn disconnect(&mut self) {
        if !matches!(self.state, ClientState::Idle) {
            self.enter_idle(None);
        }
    }

    /// Sends a remote console command to the server.
    ///
    /// While idle there is no server and no socket, so a short-lived socket
    /// sends the command to the configured default server. Its reply is not
    /// awaited.
    pub fn rcon(&mut self, command: &str) -> Result<(), ClientError> {
        let packet_id = self.allocate_packet_id();
        let request = ClientRequest::RemoteConsoleCommand {
            password: self.config.rcon_password.clone(),
            command: command.to_string(),
        }
        .encode(packet_id);

        let sent = match self.socket.as_mut() {
            Some(socket) => socket.send_buffer(&request, self.server)?,
            None => {
                let host = self.config.default_server_host.clone();
                let server = self
                    .factory
                    .resolve(&host, self.config.default_server_port)
                    .map_err(|_| ClientError::Resolve(host))?;
                let mut socket = self.factory.bind_udp(0).map_err(ClientError::NoSocket)?;
                socket.send_buffer(&request, server)?
            }
        };
        self.stats.record_sent(sent);
        Ok(())
    }

    /// Queues a reliable fragment for the next datagram.
    pub fn queue_reliable(&mut self, fragment: Vec<u8>) -> Result<(), ClientError> {
        let ClientState::InGame(session) = &mut self.state else {
            return Err(ClientError::NotConnected);
        };
        if let Err(e) = ReliableChannel::check_fragment(&fragment) {
            error!("{}", e);
            return Err(e.into());
        }
        session.reliable.push(fragment);
        Ok(())
    }

    /// Unreliable bytes for the next datagram. They are cleared after every
    /// tick whether or not they fit.
    pub fn unreliable_mut(&mut self) -> Option<&mut Vec<u8>> {
        match &mut self.state {
            ClientState::InGame(session) => Some(&mut session.unreliable),
            _ => None,
        }
    }

    /// Sends a chat line to everyone on the server.
    pub fn say(&mut self, text: &str) -> Result<(), ClientError> {
        self.queue_reliable(ClientGameMessage::SayToAll(text.to_string()).to_bytes())
    }

    /// Advances the client by `frame_time` seconds.
    pub fn tick(&mut self, frame_time: f32) {
        match self.state {
            ClientState::Idle => {}
            ClientState::Connecting { .. } => self.tick_connecting(frame_time),
            ClientState::InGame(_) => self.tick_in_game(),
        }
    }

    fn tick_connecting(&mut self, frame_time: f32) {
        for _ in 0..self.config.max_packets_per_tick {
            let (mut buf, sender) = match self.receive() {
                Ok(Some(datagram)) => datagram,
                Ok(None) => break,
                Err(e) if e.is_transient() => {
                    warn!("Connecting: receive failed ({}), packet ignored", e);
                    continue;
                }
                Err(e) => {
                    self.enter_idle(Some(format!("Network error: {}", e)));
                    return;
                }
            };

            if !strip_out_of_band(&mut buf) {
                warn!("Ignoring in-game message from {} while connecting", sender);
                continue;
            }

            self.handle_connect_reply(&mut buf, sender);
            if !matches!(self.state, ClientState::Connecting { .. }) {
                return;
            }
        }

        let expired = match &mut self.state {
            ClientState::Connecting { time_left, .. } => {
                *time_left -= frame_time;
                *time_left <= TIMER_SLACK
            }
            _ => false,
        };
        if expired {
            self.enter_idle(Some(
                "No server response. Please try again later.".to_string(),
            ));
        }
    }

    fn handle_connect_reply(&mut self, buf: &mut WireBuffer, sender: PeerAddress) {
        let ClientState::Connecting { packet_id, .. } = self.state else {
            return;
        };

        if sender != self.server {
            warn!(
                "Ignoring connection-less packet from {} (expected {})",
                sender, self.server
            );
            return;
        }

        let (reply_id, kind) = match read_out_of_band_header(buf) {
            Ok(header) => header,
            Err(e) => {
                warn!("Ignoring malformed reply from {}: {}", sender, e);
                return;
            }
        };
        if reply_id != packet_id {
            warn!(
                "Ignoring reply to packet {} while waiting for {}",
                reply_id, packet_id
            );
            return;
        }

        match ServerReply::read(kind, buf) {
            Ok(ServerReply::Ack { game_name }) => {
                let wanted = &self.config.game_name;
                if let Some(name) = game_name.filter(|n| !wanted.is_empty() && n != wanted) {
                    warn!(
                        "Client is running game '{}', server is running game '{}', connection ignored",
                        wanted, name
                    );
                    return;
                }
                info!("Connection to {} acknowledged", self.server);
                self.set_state(ClientState::InGame(GameSession::default()));
            }
            Ok(ServerReply::Nack { reason }) => {
                self.enter_idle(Some(format!("Connection denied. Reason: {}", reason)));
            }
            Ok(other) => warn!("Received unexpected {:?} while connecting", other),
            Err(e) => warn!("Ignoring malformed reply from {}: {}", sender, e),
        }
    }

    fn tick_in_game(&mut self) {
        for _ in 0..self.config.max_packets_per_tick {
            let (mut buf, sender) = match self.receive() {
                Ok(Some(datagram)) => datagram,
                Ok(None) => break,
                Err(e) if e.is_transient() => {
                    warn!("Receive failed ({}), packet ignored", e);
                    continue;
                }
                Err(e) => {
                    self.enter_idle(Some(format!("Lost connection to server: {}", e)));
                    return;
                }
            };

            if strip_out_of_band(&mut buf) {
                self.handle_in_game_out_of_band(&mut buf, sender);
                continue;
            }

            if sender != self.server {
                debug!("Ignoring in-game packet from stranger {}", sender);
                continue;
            }

            let ClientState::InGame(session) = &mut self.state else {
                return;
            };
            let events = &mut self.events;
            let accepted = session.channel.process_incoming(&mut buf, |payload, sequence| {
                events.push_back(ClientEvent::Payload {
                    sequence,
                    bytes: payload.read_remaining(),
                });
            });
            if accepted.is_none() {
                self.stats.packets_discarded += 1;
            }
        }

        self.send_in_game();
    }

    fn handle_in_game_out_of_band(&mut self, buf: &mut WireBuffer, sender: PeerAddress) {
        let kind = match read_out_of_band_header(buf) {
            Ok((_, kind)) => kind,
            Err(e) => {
                warn!("Ignoring malformed packet from {}: {}", sender, e);
                return;
            }
        };
        match ServerReply::read(kind, buf) {
            Ok(ServerReply::RccReply { output }) => {
                self.events.push_back(ClientEvent::RconReply(output));
            }
            Ok(other) => debug!("Ignoring {:?} from {} while in game", other, sender),
            Err(e) => warn!("Ignoring malformed packet from {}: {}", sender, e),
        }
    }

    fn send_in_game(&mut self) {
        let ClientState::InGame(session) = &mut self.state else {
            return;
        };
        let reliable = std::mem::take(&mut session.reliable);
        let unreliable = std::mem::take(&mut session.unreliable);

        let datagram = match session.channel.prepare_outgoing(reliable, &unreliable) {
            Ok(datagram) => datagram,
            Err(e) => {
                error!("{}", e);
                return;
            }
        };

        let Some(socket) = self.socket.as_mut() else {
            return;
        };
        match socket.send_buffer(&datagram, self.server) {
            Ok(sent) => self.stats.record_sent(sent),
            Err(e) => {
                self.stats.send_errors += 1;
                warn!("Sending to {} failed: {}", self.server, e);
            }
        }
    }

    fn receive(&mut self) -> Result<Option<(WireBuffer, PeerAddress)>, SocketError> {
        let Some(socket) = self.socket.as_mut() else {
            return Ok(None);
        };
        match socket.recv_from() {
            Ok(Some((buf, sender))) => {
                self.stats.record_received(buf.len());
                Ok(Some((buf, sender)))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                self.stats.receive_errors += 1;
                Err(e)
            }
        }
    }

    fn enter_idle(&mut self, message: Option<String>) {
        let previous = std::mem::replace(&mut self.state, ClientState::Idle);

        if let (ClientState::InGame(mut session), Some(socket)) = (previous, self.socket.as_mut())
        {
            // No acknowledgement follows, so failures do not matter.
            let farewell = ClientGameMessage::Disconnect.to_bytes();
            if let Ok(datagram) = session.channel.prepare_outgoing(Vec::new(), &farewell) {
                if let Err(e) = socket.send_buffer(&datagram, self.server) {
                    debug!("Disconnect message to {} not sent: {}", self.server, e);
                }
            }
        }

        self.socket = None;
        self.server = PeerAddress::NULL;
        if let Some(message) = message {
            self.message(message);
        }
        self.announce_state();
    }

    fn set_state(&mut self, state: ClientState) {
        self.state = state;
        self.announce_state();
    }

    fn announce_state(&mut self) {
        let state = self.state();
        info!("Client state is now {}", state);
        self.events.push_back(ClientEvent::StateChanged { state });
    }

    fn message(&mut self, text: String) {
        info!("{}", text);
        self.events.push_back(ClientEvent::Message(text));
    }

    fn allocate_packet_id(&mut self) -> u32 {
        let id = self.next_packet_id;
        self.next_packet_id = self.next_packet_id.wrapping_add(1);
        id
    }
}

impl<F: SocketFactory> Drop for Client<F> {
    fn drop(&mut self) {
        if matches!(self.state, ClientState::InGame(_)) {
            self.enter_idle(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::protocol::ServerGameMessage;
    use crate::simulator::SimulatedNetwork;

    const SERVER_PORT: u16 = 30000;

    fn setup() -> (SimulatedNetwork, Client<SimulatedNetwork>, crate::SimulatedSocket) {
        let net = SimulatedNetwork::new(42);
        let server = net.bind_udp(SERVER_PORT).unwrap();
        let client = Client::new(net.clone(), ClientConfig::default());
        (net, client, server)
    }

    /// Reads the pending connect request and returns its packet id.
    fn read_connect(server: &mut crate::SimulatedSocket) -> (u32, PeerAddress) {
        let (mut buf, from) = server.recv_from().unwrap().expect("no connect request");
        assert!(strip_out_of_band(&mut buf));
        let (packet_id, kind) = read_out_of_band_header(&mut buf).unwrap();
        assert!(matches!(
            ClientRequest::read(kind, &mut buf).unwrap(),
            ClientRequest::Connect { .. }
        ));
        (packet_id, from)
    }

    fn states(client: &mut Client<SimulatedNetwork>) -> Vec<ConnectionState> {
        client
            .drain_events()
            .filter_map(|e| match e {
                ClientEvent::StateChanged { state } => Some(state),
                _ => None,
            })
            .collect()
    }

    fn join(
        client: &mut Client<SimulatedNetwork>,
        server: &mut crate::SimulatedSocket,
    ) -> PeerAddress {
        client.connect("localhost", SERVER_PORT).unwrap();
        let (packet_id, from) = read_connect(server);
        let ack = ServerReply::Ack {
            game_name: Some("DeathMatch".into()),
        };
        server.send_buffer(&ack.encode(packet_id), from).unwrap();
        client.tick(0.01);
        assert_eq!(client.state(), ConnectionState::InGame);
        from
    }

    #[test]
    fn test_connect_ack_enters_game() {
        let (_net, mut client, mut server) = setup();
        client.connect("localhost", SERVER_PORT).unwrap();
        assert_eq!(client.state(), ConnectionState::Connecting);
        assert_eq!(client.server_address(), PeerAddress::localhost(SERVER_PORT));

        let (packet_id, from) = read_connect(&mut server);
        server
            .send_buffer(&ServerReply::Ack { game_name: None }.encode(packet_id), from)
            .unwrap();
        client.tick(0.01);

        assert_eq!(client.state(), ConnectionState::InGame);
        assert_eq!(
            states(&mut client),
            vec![ConnectionState::Connecting, ConnectionState::InGame]
        );
    }

    #[test]
    fn test_connect_while_busy() {
        let (_net, mut client, mut server) = setup();
        client.connect("localhost", SERVER_PORT).unwrap();
        assert!(matches!(
            client.connect("localhost", SERVER_PORT),
            Err(ClientError::AlreadyConnecting)
        ));

        let (packet_id, from) = read_connect(&mut server);
        server
            .send_buffer(&ServerReply::Ack { game_name: None }.encode(packet_id), from)
            .unwrap();
        client.tick(0.01);
        assert!(matches!(
            client.connect("localhost", SERVER_PORT),
            Err(ClientError::AlreadyConnected)
        ));
    }

    #[test]
    fn test_unresolvable_host_stays_idle() {
        let (net, mut client, _server) = setup();
        let err = client.connect("nowhere.invalid", SERVER_PORT).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unable to resolve server name \"nowhere.invalid\"."
        );
        assert_eq!(client.state(), ConnectionState::Idle);
        assert_eq!(net.opened_sockets(), 1);
    }

    #[test]
    fn test_bind_failure_stays_idle() {
        let (net, mut client, _server) = setup();
        client.config_mut().client_port = SERVER_PORT;
        let err = client.connect("localhost", SERVER_PORT).unwrap_err();
        assert!(matches!(err, ClientError::NoSocket(_)));
        assert_eq!(client.state(), ConnectionState::Idle);
        assert_eq!(net.open_sockets(), 1);
    }

    #[test]
    fn test_timeout_at_sixty_hertz() {
        let (_net, mut client, _server) = setup();
        client.connect("localhost", SERVER_PORT).unwrap();

        for _ in 0..479 {
            client.tick(1.0 / 60.0);
        }
        assert_eq!(client.state(), ConnectionState::Connecting);
        client.tick(1.0 / 60.0);
        assert_eq!(client.state(), ConnectionState::Idle);
    }

    #[test]
    fn test_timeout_returns_to_idle() {
        let (net, mut client, _server) = setup();
        client.connect("localhost", SERVER_PORT).unwrap();

        for _ in 0..79 {
            client.tick(0.1);
        }
        assert_eq!(client.state(), ConnectionState::Connecting);
        client.tick(0.1);

        assert_eq!(client.state(), ConnectionState::Idle);
        assert!(client.server_address().is_null());
        assert_eq!(net.closed_sockets(), 1);
        assert!(client.drain_events().any(|e| e
            == ClientEvent::Message("No server response. Please try again later.".into())));
    }

    #[test]
    fn test_nack_returns_to_idle() {
        let (_net, mut client, mut server) = setup();
        client.connect("localhost", SERVER_PORT).unwrap();
        let (packet_id, from) = read_connect(&mut server);
        let nack = ServerReply::Nack {
            reason: "Server is full.".into(),
        };
        server.send_buffer(&nack.encode(packet_id), from).unwrap();
        client.tick(0.01);

        assert_eq!(client.state(), ConnectionState::Idle);
        assert!(client.drain_events().any(|e| e
            == ClientEvent::Message("Connection denied. Reason: Server is full.".into())));
    }

    #[test]
    fn test_wrong_packet_id_ignored() {
        let (_net, mut client, mut server) = setup();
        client.connect("localhost", SERVER_PORT).unwrap();
        let (packet_id, from) = read_connect(&mut server);
        let ack = ServerReply::Ack { game_name: None };
        server
            .send_buffer(&ack.encode(packet_id.wrapping_add(5)), from)
            .unwrap();
        client.tick(0.01);
        assert_eq!(client.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_reply_from_stranger_ignored() {
        let (net, mut client, mut server) = setup();
        let mut stranger = net.bind_udp(0).unwrap();
        client.connect("localhost", SERVER_PORT).unwrap();
        let (packet_id, from) = read_connect(&mut server);

        let ack = ServerReply::Ack { game_name: None };
        stranger.send_buffer(&ack.encode(packet_id), from).unwrap();
        client.tick(0.01);
        assert_eq!(client.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_other_game_ignored() {
        let (_net, mut client, mut server) = setup();
        client.config_mut().game_name = "Capture".into();
        client.connect("localhost", SERVER_PORT).unwrap();
        let (packet_id, from) = read_connect(&mut server);
        let ack = ServerReply::Ack {
            game_name: Some("DeathMatch".into()),
        };
        server.send_buffer(&ack.encode(packet_id), from).unwrap();
        client.tick(0.01);
        assert_eq!(client.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_in_band_ignored_while_connecting() {
        let (_net, mut client, mut server) = setup();
        client.connect("localhost", SERVER_PORT).unwrap();
        let (_, from) = read_connect(&mut server);
        let mut channel = ReliableChannel::new();
        let datagram = channel.prepare_outgoing(Vec::new(), b"x").unwrap();
        server.send_buffer(&datagram, from).unwrap();
        client.tick(0.01);
        assert_eq!(client.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_fatal_receive_error_while_connecting() {
        let (net, mut client, _server) = setup();
        client.connect("localhost", SERVER_PORT).unwrap();
        let port = client.local_address().unwrap().port();
        net.inject_receive_error(port, io::ErrorKind::NotConnected);
        client.tick(0.01);
        assert_eq!(client.state(), ConnectionState::Idle);
        assert_eq!(net.closed_sockets(), 1);
    }

    #[test]
    fn test_transient_receive_error_is_ignored() {
        let (net, mut client, mut server) = setup();
        join(&mut client, &mut server);
        let port = client.local_address().unwrap().port();
        net.inject_receive_error(port, io::ErrorKind::ConnectionReset);
        client.tick(0.01);
        assert_eq!(client.state(), ConnectionState::InGame);
        assert_eq!(client.stats().receive_errors, 1);
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let (net, mut client, mut server) = setup();
        join(&mut client, &mut server);
        client.disconnect();
        client.disconnect();
        assert_eq!(client.state(), ConnectionState::Idle);
        assert_eq!(net.opened_sockets(), 2);
        assert_eq!(net.closed_sockets(), 1);

        let mut last = None;
        while let Some((buf, _)) = server.recv_from().unwrap() {
            last = Some(buf);
        }
        let mut farewell = last.unwrap();
        let mut channel = ReliableChannel::new();
        let mut messages = Vec::new();
        channel.process_incoming(&mut farewell, |payload, _| {
            messages = ClientGameMessage::read_all(payload).unwrap();
        });
        assert_eq!(messages, vec![ClientGameMessage::Disconnect]);
    }

    #[test]
    fn test_payload_delivered() {
        let (_net, mut client, mut server) = setup();
        let client_addr = join(&mut client, &mut server);
        client.drain_events().for_each(drop);

        let mut channel = ReliableChannel::new();
        let chat = ServerGameMessage::Chat("hello".into()).to_bytes();
        let datagram = channel.prepare_outgoing(vec![chat.clone()], &[]).unwrap();
        server.send_buffer(&datagram, client_addr).unwrap();
        client.tick(0.01);

        let payloads: Vec<_> = client
            .drain_events()
            .filter_map(|e| match e {
                ClientEvent::Payload { bytes, sequence } => Some((bytes, sequence)),
                _ => None,
            })
            .collect();
        assert_eq!(payloads, vec![(chat, 1)]);
    }

    #[test]
    fn test_rcon_reply_in_game() {
        let (_net, mut client, mut server) = setup();
        let client_addr = join(&mut client, &mut server);
        client.rcon("status").unwrap();
        while server.recv_from().unwrap().is_some() {}

        let reply = ServerReply::RccReply {
            output: "ok\n".into(),
        };
        server.send_buffer(&reply.encode(9), client_addr).unwrap();
        client.tick(0.01);
        assert!(client
            .drain_events()
            .any(|e| e == ClientEvent::RconReply("ok\n".into())));
    }

    #[test]
    fn test_rcon_while_idle_uses_default_server() {
        let (net, mut client, mut server) = setup();
        client.config_mut().rcon_password = "secret".into();
        client.config_mut().default_server_port = SERVER_PORT;
        client.rcon("kick all").unwrap();

        let (mut buf, _) = server.recv_from().unwrap().unwrap();
        assert!(strip_out_of_band(&mut buf));
        let (_, kind) = read_out_of_band_header(&mut buf).unwrap();
        assert_eq!(
            ClientRequest::read(kind, &mut buf).unwrap(),
            ClientRequest::RemoteConsoleCommand {
                password: "secret".into(),
                command: "kick all".into(),
            }
        );
        assert_eq!(net.open_sockets(), 1);
        assert_eq!(client.state(), ConnectionState::Idle);
    }

    #[test]
    fn test_oversized_fragment_rejected() {
        let (_net, mut client, mut server) = setup();
        join(&mut client, &mut server);
        let err = client.queue_reliable(vec![0; 2000]).unwrap_err();
        assert!(matches!(err, ClientError::Channel(_)));
        assert!(client.channel().unwrap().is_settled());
    }

    #[test]
    fn test_queue_reliable_needs_game() {
        let (_net, mut client, _server) = setup();
        assert!(matches!(
            client.queue_reliable(b"x".to_vec()),
            Err(ClientError::NotConnected)
        ));
        assert!(client.unreliable_mut().is_none());
    }
}
