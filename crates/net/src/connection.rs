use std::collections::HashMap;

use crate::address::PeerAddress;
use crate::channel::ReliableChannel;

/// A client the server has accepted.
#[derive(Debug)]
pub struct ClientConnection {
    pub client_id: u32,
    pub addr: PeerAddress,
    pub player_name: String,
    pub model_name: String,
    pub(crate) channel: ReliableChannel,
    pub(crate) reliable: Vec<Vec<u8>>,
    pub(crate) unreliable: Vec<u8>,
    silent_for: f32,
}

impl ClientConnection {
    pub fn new(client_id: u32, addr: PeerAddress, player_name: String, model_name: String) -> Self {
        Self {
            client_id,
            addr,
            player_name,
            model_name,
            channel: ReliableChannel::new(),
            reliable: Vec::new(),
            unreliable: Vec::new(),
            silent_for: 0.0,
        }
    }

    pub fn channel(&self) -> &ReliableChannel {
        &self.channel
    }

    /// Seconds since the last datagram from this client.
    pub fn silent_for(&self) -> f32 {
        self.silent_for
    }

    pub fn touch(&mut self) {
        self.silent_for = 0.0;
    }

    pub fn is_timed_out(&self, timeout_secs: f32) -> bool {
        self.silent_for > timeout_secs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitError {
    AlreadyListed,
    Full,
}

/// Accepted clients, addressable by id and by address.
#[derive(Debug)]
pub struct ConnectionManager {
    clients_by_addr: HashMap<PeerAddress, u32>,
    clients: HashMap<u32, ClientConnection>,
    next_client_id: u32,
    max_clients: usize,
}

impl ConnectionManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients_by_addr: HashMap::new(),
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a new client. A known address is refused so that a stale
    /// entry has to time out before the same peer can join again.
    pub fn admit(
        &mut self,
        addr: PeerAddress,
        player_name: String,
        model_name: String,
    ) -> Result<u32, AdmitError> {
        if self.clients_by_addr.contains_key(&addr) {
            return Err(AdmitError::AlreadyListed);
        }
        if self.clients.len() >= self.max_clients {
            return Err(AdmitError::Full);
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        self.clients.insert(
            client_id,
            ClientConnection::new(client_id, addr, player_name, model_name),
        );
        self.clients_by_addr.insert(addr, client_id);
        Ok(client_id)
    }

    pub fn is_listed(&self, addr: &PeerAddress) -> bool {
        self.clients_by_addr.contains_key(addr)
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.max_clients
    }

    pub fn get_by_addr_mut(&mut self, addr: &PeerAddress) -> Option<&mut ClientConnection> {
        let id = self.clients_by_addr.get(addr)?;
        self.clients.get_mut(id)
    }

    pub fn get(&self, client_id: u32) -> Option<&ClientConnection> {
        self.clients.get(&client_id)
    }

    pub fn get_mut(&mut self, client_id: u32) -> Option<&mut ClientConnection> {
        self.clients.get_mut(&client_id)
    }

    pub fn remove(&mut self, client_id: u32) -> Option<ClientConnection> {
        let conn = self.clients.remove(&client_id)?;
        self.clients_by_addr.remove(&conn.addr);
        Some(conn)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientConnection> {
        self.clients.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ClientConnection> {
        self.clients.values_mut()
    }

    /// Ages every client by `frame_time` and removes the ones that stayed
    /// silent longer than `timeout_secs`.
    pub fn cleanup_timed_out(&mut self, frame_time: f32, timeout_secs: f32) -> Vec<ClientConnection> {
        let mut timed_out: Vec<u32> = Vec::new();
        for conn in self.clients.values_mut() {
            conn.silent_for += frame_time;
            if conn.is_timed_out(timeout_secs) {
                timed_out.push(conn.client_id);
            }
        }
        timed_out.sort_unstable();
        timed_out.into_iter().filter_map(|id| self.remove(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
