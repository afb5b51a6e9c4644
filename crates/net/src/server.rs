use std::collections::VecDeque;

use log::{debug, info, warn};

use crate::address::PeerAddress;
use crate::buffer::WireBuffer;
use crate::channel::ReliableChannel;
use crate::config::ServerConfig;
use crate::connection::{AdmitError, ClientConnection, ConnectionManager};
use crate::error::ServerError;
use crate::events::{DisconnectReason, ServerEvent};
use crate::protocol::{
    read_out_of_band_header, strip_out_of_band, ClientRequest, ServerGameMessage, ServerReply,
    RCON_REPLY_LIMIT,
};
use crate::socket::{DatagramSocket, SocketFactory};
use crate::stats::NetworkStats;

type RconHandler = Box<dyn FnMut(&str) -> String>;

/// Server side of the transport, driven by [`Server::tick`].
pub struct Server<F: SocketFactory> {
    socket: F::Socket,
    config: ServerConfig,
    connections: ConnectionManager,
    rcon_handler: Option<RconHandler>,
    pending_events: VecDeque<ServerEvent>,
    stats: NetworkStats,
    send_timer: f32,
}

impl<F: SocketFactory> Server<F> {
    pub fn bind(factory: &F, config: ServerConfig) -> Result<Self, ServerError> {
        let socket = factory.bind_udp(config.port)?;
        info!("Server listening on port {}", socket.local_addr().port());

        Ok(Self {
            socket,
            connections: ConnectionManager::new(config.max_clients),
            config,
            rcon_handler: None,
            pending_events: VecDeque::new(),
            stats: NetworkStats::default(),
            send_timer: 0.0,
        })
    }

    pub fn local_addr(&self) -> PeerAddress {
        self.socket.local_addr()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn client(&self, client_id: u32) -> Option<&ClientConnection> {
        self.connections.get(client_id)
    }

    pub fn clients(&self) -> impl Iterator<Item = &ClientConnection> {
        self.connections.iter()
    }

    pub fn client_count(&self) -> usize {
        self.connections.len()
    }

    /// Installs the interpreter for remote console commands. Its return value
    /// is sent back to the requesting peer.
    pub fn set_rcon_handler(&mut self, handler: impl FnMut(&str) -> String + 'static) {
        self.rcon_handler = Some(Box::new(handler));
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = ServerEvent> + '_ {
        self.pending_events.drain(..)
    }

    pub fn queue_reliable(&mut self, client_id: u32, fragment: Vec<u8>) -> Result<(), ServerError> {
        ReliableChannel::check_fragment(&fragment)?;
        let conn = self
            .connections
            .get_mut(client_id)
            .ok_or(ServerError::UnknownClient(client_id))?;
        conn.reliable.push(fragment);
        Ok(())
    }

    /// Queues `fragment` for every client.
    pub fn broadcast_reliable(&mut self, fragment: &[u8]) -> Result<(), ServerError> {
        ReliableChannel::check_fragment(fragment)?;
        for conn in self.connections.iter_mut() {
            conn.reliable.push(fragment.to_vec());
        }
        Ok(())
    }

    pub fn unreliable_mut(&mut self, client_id: u32) -> Option<&mut Vec<u8>> {
        self.connections
            .get_mut(client_id)
            .map(|conn| &mut conn.unreliable)
    }

    /// Removes a client and tells the others that it left.
    pub fn disconnect_client(
        &mut self,
        client_id: u32,
        reason: DisconnectReason,
    ) -> Result<(), ServerError> {
        let conn = self
            .connections
            .remove(client_id)
            .ok_or(ServerError::UnknownClient(client_id))?;
        self.on_client_removed(conn, reason);
        Ok(())
    }

    /// Advances the server by `frame_time` seconds.
    pub fn tick(&mut self, frame_time: f32) {
        self.receive_packets();

        let timeout = self.config.client_timeout_secs;
        for conn in self.connections.cleanup_timed_out(frame_time, timeout) {
            self.on_client_removed(conn, DisconnectReason::Timeout);
        }

        self.send_timer += frame_time;
        if self.send_timer >= self.config.send_interval_secs {
            self.send_timer = 0.0;
            self.send_to_clients();
        }
    }

    fn receive_packets(&mut self) {
        for _ in 0..self.config.max_packets_per_tick {
            let (mut buf, sender) = match self.socket.recv_from() {
                Ok(Some(datagram)) => datagram,
                Ok(None) => break,
                Err(e) if e.is_transient() => {
                    self.stats.receive_errors += 1;
                    warn!("Receive failed ({}), packet ignored", e);
                    continue;
                }
                Err(e) => {
                    self.stats.receive_errors += 1;
                    self.report_error(format!("Receive failed: {}", e));
                    break;
                }
            };
            self.stats.record_received(buf.len());

            if strip_out_of_band(&mut buf) {
                self.process_connection_less(&mut buf, sender);
            } else {
                self.process_in_game(&mut buf, sender);
            }
        }
    }

    fn process_in_game(&mut self, buf: &mut WireBuffer, sender: PeerAddress) {
        let Some(conn) = self.connections.get_by_addr_mut(&sender) else {
            debug!("Ignoring in-game packet from unknown peer {}", sender);
            return;
        };

        let client_id = conn.client_id;
        let events = &mut self.pending_events;
        let accepted = conn.channel.process_incoming(buf, |payload, sequence| {
            events.push_back(ServerEvent::Payload {
                client_id,
                sequence,
                bytes: payload.read_remaining(),
            });
        });

        match accepted {
            Some(_) => conn.touch(),
            None => self.stats.packets_discarded += 1,
        }
    }

    fn process_connection_less(&mut self, buf: &mut WireBuffer, sender: PeerAddress) {
        let (packet_id, kind) = match read_out_of_band_header(buf) {
            Ok(header) => header,
            Err(e) => {
                warn!("Ignoring malformed packet from {}: {}", sender, e);
                return;
            }
        };

        let request = match ClientRequest::read(kind, buf) {
            Ok(request) => request,
            // Names are checked after the admission rules.
            Err(_) if kind == ClientRequest::CONNECT => {
                self.handle_connect(packet_id, sender, None);
                return;
            }
            Err(e) => {
                warn!("Unknown or malformed request from {}: {}", sender, e);
                return;
            }
        };

        match request {
            ClientRequest::NoOperation => debug!("Packet from {} evaluated to NOP", sender),
            ClientRequest::Ping => {
                debug!("Acknowledging ping from {}", sender);
                self.reply(packet_id, sender, ServerReply::Ack { game_name: None });
            }
            ClientRequest::Connect {
                player_name,
                model_name,
            } => self.handle_connect(packet_id, sender, Some((player_name, model_name))),
            ClientRequest::Info => {
                info!("Information request from {}", sender);
                let reason = "Information is not yet available!".to_string();
                self.reply(packet_id, sender, ServerReply::Nack { reason });
            }
            ClientRequest::RemoteConsoleCommand { password, command } => {
                let output = self.run_remote_command(&password, &command, sender);
                self.reply(packet_id, sender, ServerReply::RccReply { output });
            }
        }
    }

    fn handle_connect(
        &mut self,
        packet_id: u32,
        sender: PeerAddress,
        names: Option<(String, String)>,
    ) {
        info!("Connection request from {}", sender);

        let denied = if self.connections.is_listed(&sender) {
            Some("Already listed. Wait for timeout and try again.")
        } else if self.connections.is_full() {
            Some("Server is full.")
        } else if names.is_none() {
            Some("Bad player or model name.")
        } else {
            None
        };
        if let Some(reason) = denied {
            self.deny(packet_id, sender, reason);
            return;
        }

        let Some((player_name, model_name)) = names else {
            return;
        };
        let client_id = match self
            .connections
            .admit(sender, player_name.clone(), model_name.clone())
        {
            Ok(id) => id,
            Err(AdmitError::AlreadyListed) => {
                return self.deny(packet_id, sender, "Already listed. Wait for timeout and try again.");
            }
            Err(AdmitError::Full) => return self.deny(packet_id, sender, "Server is full."),
        };

        let game_name = Some(self.config.game_name.clone());
        self.reply(packet_id, sender, ServerReply::Ack { game_name });
        info!("{} joined", player_name);
        self.pending_events.push_back(ServerEvent::ClientConnected {
            client_id,
            addr: sender,
            player_name,
            model_name,
        });
    }

    fn deny(&mut self, packet_id: u32, sender: PeerAddress, reason: &str) {
        info!("Denying connection from {}: {}", sender, reason);
        let reason = reason.to_string();
        self.reply(
            packet_id,
            sender,
            ServerReply::Nack {
                reason: reason.clone(),
            },
        );
        self.pending_events.push_back(ServerEvent::ConnectionDenied {
            addr: sender,
            reason,
        });
    }

    fn run_remote_command(&mut self, password: &str, command: &str, sender: PeerAddress) -> String {
        info!("Remote console command from {}: {}", sender, command);

        if self.config.rcon_password.is_empty() {
            return "Server rcon password not set.\n".to_string();
        }
        if password != self.config.rcon_password {
            warn!("Invalid remote console password from {}", sender);
            return "Invalid password.\n".to_string();
        }

        let output = match self.rcon_handler.as_mut() {
            Some(handler) => handler(command),
            None => String::new(),
        };
        truncate_console_output(output)
    }

    fn reply(&mut self, packet_id: u32, dest: PeerAddress, reply: ServerReply) {
        let datagram = reply.encode(packet_id);
        match self.socket.send_buffer(&datagram, dest) {
            Ok(sent) => self.stats.record_sent(sent),
            Err(e) => {
                self.stats.send_errors += 1;
                warn!("Answer to {} failed: {}", dest, e);
            }
        }
    }

    fn send_to_clients(&mut self) {
        for conn in self.connections.iter_mut() {
            let reliable = std::mem::take(&mut conn.reliable);
            let unreliable = std::mem::take(&mut conn.unreliable);

            let datagram = match conn.channel.prepare_outgoing(reliable, &unreliable) {
                Ok(datagram) => datagram,
                Err(e) => {
                    log::error!("Client {}: {}", conn.client_id, e);
                    continue;
                }
            };
            match self.socket.send_buffer(&datagram, conn.addr) {
                Ok(sent) => self.stats.record_sent(sent),
                Err(e) => {
                    self.stats.send_errors += 1;
                    warn!("Sending to client {} failed: {}", conn.client_id, e);
                }
            }
        }
    }

    fn on_client_removed(&mut self, conn: ClientConnection, reason: DisconnectReason) {
        info!("{} {}", conn.player_name, reason.as_str());

        let notice = ServerGameMessage::DropClient {
            client_id: conn.client_id,
            reason: reason.as_str().to_string(),
        }
        .to_bytes();
        for other in self.connections.iter_mut() {
            other.reliable.push(notice.clone());
        }

        self.pending_events.push_back(ServerEvent::ClientDisconnected {
            client_id: conn.client_id,
            reason,
        });
    }

    fn report_error(&mut self, message: String) {
        log::error!("{}", message);
        self.pending_events.push_back(ServerEvent::Error { message });
    }
}

/// Cuts console output that would not fit into a reply datagram.
fn truncate_console_output(mut output: String) -> String {
    if output.len() <= RCON_REPLY_LIMIT {
        return output;
    }
    let mut end = RCON_REPLY_LIMIT - 4;
    while !output.is_char_boundary(end) {
        end -= 1;
    }
    output.truncate(end);
    output.push_str("...\n");
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::{SimulatedNetwork, SimulatedSocket};

    const PORT: u16 = 30000;

    fn setup(config: ServerConfig) -> (SimulatedNetwork, Server<SimulatedNetwork>, SimulatedSocket) {
        let net = SimulatedNetwork::new(3);
        let server = Server::bind(&net, ServerConfig { port: PORT, ..config }).unwrap();
        let peer = net.bind_udp(0).unwrap();
        (net, server, peer)
    }

    fn request(peer: &mut SimulatedSocket, packet_id: u32, req: ClientRequest) {
        peer.send_buffer(&req.encode(packet_id), PeerAddress::localhost(PORT))
            .unwrap();
    }

    fn answer(peer: &mut SimulatedSocket) -> (u32, ServerReply) {
        let (mut buf, _) = peer.recv_from().unwrap().expect("no answer");
        assert!(strip_out_of_band(&mut buf));
        let (packet_id, kind) = read_out_of_band_header(&mut buf).unwrap();
        (packet_id, ServerReply::read(kind, &mut buf).unwrap())
    }

    fn connect_request() -> ClientRequest {
        ClientRequest::Connect {
            player_name: "Player".into(),
            model_name: "James".into(),
        }
    }

    #[test]
    fn test_ping_is_acknowledged() {
        let (_net, mut server, mut peer) = setup(ServerConfig::default());
        request(&mut peer, 11, ClientRequest::Ping);
        server.tick(0.01);
        assert_eq!(answer(&mut peer), (11, ServerReply::Ack { game_name: None }));
    }

    #[test]
    fn test_connect_acknowledged_with_game_name() {
        let (_net, mut server, mut peer) = setup(ServerConfig::default());
        request(&mut peer, 1, connect_request());
        server.tick(0.01);

        assert_eq!(
            answer(&mut peer),
            (
                1,
                ServerReply::Ack {
                    game_name: Some("DeathMatch".into())
                }
            )
        );
        assert_eq!(server.client_count(), 1);
        let events: Vec<_> = server.drain_events().collect();
        assert!(matches!(
            events.as_slice(),
            [ServerEvent::ClientConnected { client_id: 1, .. }]
        ));
    }

    #[test]
    fn test_second_connect_already_listed() {
        let (_net, mut server, mut peer) = setup(ServerConfig::default());
        request(&mut peer, 1, connect_request());
        request(&mut peer, 2, connect_request());
        server.tick(0.01);

        answer(&mut peer);
        assert_eq!(
            answer(&mut peer),
            (
                2,
                ServerReply::Nack {
                    reason: "Already listed. Wait for timeout and try again.".into()
                }
            )
        );
    }

    #[test]
    fn test_server_full() {
        let config = ServerConfig {
            max_clients: 1,
            ..Default::default()
        };
        let (net, mut server, mut peer) = setup(config);
        let mut other = net.bind_udp(0).unwrap();
        request(&mut peer, 1, connect_request());
        server.tick(0.01);
        request(&mut other, 1, connect_request());
        server.tick(0.01);

        assert_eq!(
            answer(&mut other).1,
            ServerReply::Nack {
                reason: "Server is full.".into()
            }
        );
    }

    #[test]
    fn test_bad_names() {
        let (_net, mut server, mut peer) = setup(ServerConfig::default());
        let mut datagram = WireBuffer::new();
        datagram.write_u32(crate::protocol::OUT_OF_BAND_SENTINEL);
        datagram.write_u32(4);
        datagram.write_u8(ClientRequest::CONNECT);
        datagram.write_bytes(b"Play");
        peer.send_buffer(&datagram, PeerAddress::localhost(PORT)).unwrap();
        server.tick(0.01);

        assert_eq!(
            answer(&mut peer),
            (
                4,
                ServerReply::Nack {
                    reason: "Bad player or model name.".into()
                }
            )
        );
        assert_eq!(server.client_count(), 0);
    }

    #[test]
    fn test_info_not_available() {
        let (_net, mut server, mut peer) = setup(ServerConfig::default());
        request(&mut peer, 5, ClientRequest::Info);
        server.tick(0.01);
        assert_eq!(
            answer(&mut peer).1,
            ServerReply::Nack {
                reason: "Information is not yet available!".into()
            }
        );
    }

    #[test]
    fn test_rcon_password_rules() {
        let rcon = |password: &str| ClientRequest::RemoteConsoleCommand {
            password: password.into(),
            command: "status".into(),
        };

        let (_net, mut server, mut peer) = setup(ServerConfig::default());
        request(&mut peer, 1, rcon(""));
        server.tick(0.01);
        assert_eq!(
            answer(&mut peer).1,
            ServerReply::RccReply {
                output: "Server rcon password not set.\n".into()
            }
        );

        let config = ServerConfig {
            rcon_password: "secret".into(),
            ..Default::default()
        };
        let (_net, mut server, mut peer) = setup(config);
        server.set_rcon_handler(|cmd| format!("ran {}\n", cmd));

        request(&mut peer, 2, rcon("guess"));
        server.tick(0.01);
        assert_eq!(
            answer(&mut peer).1,
            ServerReply::RccReply {
                output: "Invalid password.\n".into()
            }
        );

        request(&mut peer, 3, rcon("secret"));
        server.tick(0.01);
        assert_eq!(
            answer(&mut peer).1,
            ServerReply::RccReply {
                output: "ran status\n".into()
            }
        );
    }

    #[test]
    fn test_long_console_output_truncated() {
        let output = truncate_console_output("x".repeat(2000));
        assert_eq!(output.len(), RCON_REPLY_LIMIT);
        assert!(output.ends_with("...\n"));
        assert_eq!(truncate_console_output("short".into()), "short");
    }

    #[test]
    fn test_unknown_in_game_sender_ignored() {
        let (_net, mut server, mut peer) = setup(ServerConfig::default());
        let mut channel = ReliableChannel::new();
        let datagram = channel.prepare_outgoing(vec![b"x".to_vec()], &[]).unwrap();
        peer.send_buffer(&datagram, PeerAddress::localhost(PORT)).unwrap();
        server.tick(0.01);
        assert_eq!(server.drain_events().count(), 0);
    }

    #[test]
    fn test_payload_and_reply() {
        let (_net, mut server, mut peer) = setup(ServerConfig::default());
        request(&mut peer, 1, connect_request());
        server.tick(0.01);
        answer(&mut peer);
        server.drain_events().for_each(drop);

        let mut channel = ReliableChannel::new();
        let datagram = channel.prepare_outgoing(vec![b"hello".to_vec()], &[]).unwrap();
        peer.send_buffer(&datagram, PeerAddress::localhost(PORT)).unwrap();
        server.queue_reliable(1, b"welcome".to_vec()).unwrap();
        server.tick(0.05);

        let events: Vec<_> = server.drain_events().collect();
        assert_eq!(
            events,
            vec![ServerEvent::Payload {
                client_id: 1,
                sequence: 1,
                bytes: b"hello".to_vec()
            }]
        );

        let (mut reply, _) = peer.recv_from().unwrap().expect("no in-game datagram");
        let mut received = Vec::new();
        channel.process_incoming(&mut reply, |payload, _| {
            received = payload.read_remaining();
        });
        assert_eq!(received, b"welcome");
        assert!(channel.is_settled());
    }

    #[test]
    fn test_silent_client_times_out() {
        let config = ServerConfig {
            client_timeout_secs: 1.0,
            ..Default::default()
        };
        let (_net, mut server, mut peer) = setup(config);
        request(&mut peer, 1, connect_request());
        server.tick(0.01);
        server.drain_events().for_each(drop);

        for _ in 0..11 {
            server.tick(0.1);
        }
        assert_eq!(server.client_count(), 0);
        assert!(server.drain_events().any(|e| e
            == ServerEvent::ClientDisconnected {
                client_id: 1,
                reason: DisconnectReason::Timeout
            }));
    }

    #[test]
    fn test_disconnect_unknown_client() {
        let (_net, mut server, _peer) = setup(ServerConfig::default());
        assert!(matches!(
            server.disconnect_client(9, DisconnectReason::Kicked),
            Err(ServerError::UnknownClient(9))
        ));
    }
}
