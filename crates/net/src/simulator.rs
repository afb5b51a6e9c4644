//! In-memory datagram network with seeded loss, duplication and reordering.
//!
//! Every socket lives on `127.0.0.1`. Hosts other than dotted quads and
//! `localhost` must be registered with [`SimulatedNetwork::add_host`] before
//! they resolve.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::address::PeerAddress;
use crate::buffer::WireBuffer;
use crate::error::SocketError;
use crate::socket::{DatagramSocket, SocketFactory};

const FIRST_EPHEMERAL_PORT: u16 = 50000;
const LOOPBACK: [u8; 4] = [127, 0, 0, 1];

/// Fault injection settings applied to every datagram sent on the network.
#[derive(Debug, Clone, Default)]
pub struct PacketLossSimulation {
    /// Chance in percent that a datagram is silently dropped.
    pub loss_percent: f32,
    /// Chance in percent that a delivered datagram arrives twice.
    pub duplicate_percent: f32,
    /// Delivered datagrams are inserted at a random queue position.
    pub reorder: bool,
}

#[derive(Debug)]
struct NetworkState {
    rng: StdRng,
    simulation: PacketLossSimulation,
    queues: HashMap<u16, VecDeque<(Vec<u8>, PeerAddress)>>,
    failures: HashMap<u16, VecDeque<io::ErrorKind>>,
    hosts: HashMap<String, [u8; 4]>,
    bound: HashSet<u16>,
    next_port: u16,
    opened: usize,
    closed: usize,
    delivered: u64,
    dropped: u64,
}

impl NetworkState {
    fn should_drop(&mut self) -> bool {
        let loss = self.simulation.loss_percent;
        loss > 0.0 && self.rng.gen_range(0.0..100.0) < loss
    }

    fn should_duplicate(&mut self) -> bool {
        let dup = self.simulation.duplicate_percent;
        dup > 0.0 && self.rng.gen_range(0.0..100.0) < dup
    }

    fn deliver(&mut self, data: &[u8], from: PeerAddress, port: u16) {
        let copies = if self.should_duplicate() { 2 } else { 1 };
        for _ in 0..copies {
            let reorder = self.simulation.reorder;
            let position = match self.queues.get(&port) {
                Some(queue) if reorder => self.rng.gen_range(0..=queue.len()),
                Some(queue) => queue.len(),
                None => return,
            };
            if let Some(queue) = self.queues.get_mut(&port) {
                queue.insert(position, (data.to_vec(), from));
                self.delivered += 1;
            }
        }
    }

    fn allocate_port(&mut self) -> Option<u16> {
        for _ in 0..=(u16::MAX - FIRST_EPHEMERAL_PORT) {
            let port = self.next_port;
            self.next_port = if port == u16::MAX {
                FIRST_EPHEMERAL_PORT
            } else {
                port + 1
            };
            if !self.bound.contains(&port) {
                return Some(port);
            }
        }
        None
    }
}

/// Shared handle to a simulated network. Clones refer to the same network.
#[derive(Debug, Clone)]
pub struct SimulatedNetwork {
    state: Rc<RefCell<NetworkState>>,
}

impl SimulatedNetwork {
    pub fn new(seed: u64) -> Self {
        Self::with_simulation(seed, PacketLossSimulation::default())
    }

    pub fn with_simulation(seed: u64, simulation: PacketLossSimulation) -> Self {
        let state = NetworkState {
            rng: StdRng::seed_from_u64(seed),
            simulation,
            queues: HashMap::new(),
            failures: HashMap::new(),
            hosts: HashMap::new(),
            bound: HashSet::new(),
            next_port: FIRST_EPHEMERAL_PORT,
            opened: 0,
            closed: 0,
            delivered: 0,
            dropped: 0,
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn set_simulation(&self, simulation: PacketLossSimulation) {
        self.state.borrow_mut().simulation = simulation;
    }

    pub fn add_host(&self, name: &str, ip: [u8; 4]) {
        self.state.borrow_mut().hosts.insert(name.to_string(), ip);
    }

    /// Makes the next receive on `port` fail with `kind`.
    pub fn inject_receive_error(&self, port: u16, kind: io::ErrorKind) {
        self.state
            .borrow_mut()
            .failures
            .entry(port)
            .or_default()
            .push_back(kind);
    }

    /// Sockets bound so far.
    pub fn opened_sockets(&self) -> usize {
        self.state.borrow().opened
    }

    /// Sockets released so far.
    pub fn closed_sockets(&self) -> usize {
        self.state.borrow().closed
    }

    pub fn open_sockets(&self) -> usize {
        self.state.borrow().bound.len()
    }

    pub fn is_bound(&self, port: u16) -> bool {
        self.state.borrow().bound.contains(&port)
    }

    /// Datagrams waiting to be read on `port`.
    pub fn queued(&self, port: u16) -> usize {
        self.state
            .borrow()
            .queues
            .get(&port)
            .map_or(0, VecDeque::len)
    }

    pub fn delivered(&self) -> u64 {
        self.state.borrow().delivered
    }

    pub fn dropped(&self) -> u64 {
        self.state.borrow().dropped
    }
}

impl SocketFactory for SimulatedNetwork {
    type Socket = SimulatedSocket;

    fn resolve(&self, host: &str, port: u16) -> Result<PeerAddress, SocketError> {
        if let Ok(ip) = host.parse::<std::net::Ipv4Addr>() {
            return Ok(PeerAddress::new(ip.octets(), port));
        }
        if host.eq_ignore_ascii_case("localhost") {
            return Ok(PeerAddress::new(LOOPBACK, port));
        }
        self.state
            .borrow()
            .hosts
            .get(host)
            .map(|ip| PeerAddress::new(*ip, port))
            .ok_or_else(|| SocketError::Resolve(host.to_string()))
    }

    fn bind_udp(&self, port: u16) -> Result<SimulatedSocket, SocketError> {
        let mut state = self.state.borrow_mut();
        let port = if port == 0 {
            state.allocate_port().ok_or(SocketError::Bind {
                port,
                source: io::Error::from(io::ErrorKind::AddrNotAvailable),
            })?
        } else {
            port
        };

        if !state.bound.insert(port) {
            return Err(SocketError::Bind {
                port,
                source: io::Error::from(io::ErrorKind::AddrInUse),
            });
        }
        state.queues.insert(port, VecDeque::new());
        state.opened += 1;

        Ok(SimulatedSocket {
            network: Rc::clone(&self.state),
            local_addr: PeerAddress::new(LOOPBACK, port),
        })
    }
}

#[derive(Debug)]
pub struct SimulatedSocket {
    network: Rc<RefCell<NetworkState>>,
    local_addr: PeerAddress,
}

impl DatagramSocket for SimulatedSocket {
    fn local_addr(&self) -> PeerAddress {
        self.local_addr
    }

    fn send_to(&mut self, data: &[u8], dest: PeerAddress) -> Result<usize, SocketError> {
        let mut state = self.network.borrow_mut();
        if state.should_drop() {
            state.dropped += 1;
        } else if dest.ip() == LOOPBACK {
            state.deliver(data, self.local_addr, dest.port());
        }
        Ok(data.len())
    }

    fn recv_from(&mut self) -> Result<Option<(WireBuffer, PeerAddress)>, SocketError> {
        let mut state = self.network.borrow_mut();
        let port = self.local_addr.port();

        if let Some(kind) = state.failures.get_mut(&port).and_then(VecDeque::pop_front) {
            return Err(SocketError::receive(io::Error::from(kind)));
        }

        Ok(state
            .queues
            .get_mut(&port)
            .and_then(VecDeque::pop_front)
            .map(|(data, from)| (WireBuffer::from_bytes(data), from)))
    }
}

impl Drop for SimulatedSocket {
    fn drop(&mut self) {
        let mut state = self.network.borrow_mut();
        let port = self.local_addr.port();
        state.bound.remove(&port);
        state.queues.remove(&port);
        state.failures.remove(&port);
        state.closed += 1;
    }
}
