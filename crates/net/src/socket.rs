use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, TcpListener, TcpStream, UdpSocket};

use crate::address::PeerAddress;
use crate::buffer::WireBuffer;
use crate::error::SocketError;

const RECV_BUFFER_SIZE: usize = 65536;

/// A non-blocking datagram socket. Dropping it releases the OS resource.
pub trait DatagramSocket {
    fn local_addr(&self) -> PeerAddress;

    fn send_to(&mut self, data: &[u8], dest: PeerAddress) -> Result<usize, SocketError>;

    /// Returns the next pending datagram, or `Ok(None)` when nothing is
    /// available right now.
    fn recv_from(&mut self) -> Result<Option<(WireBuffer, PeerAddress)>, SocketError>;

    /// Sends the whole buffer, treating a short write as an error.
    fn send_buffer(&mut self, buf: &WireBuffer, dest: PeerAddress) -> Result<usize, SocketError> {
        let sent = self.send_to(buf.as_bytes(), dest)?;
        if sent < buf.len() {
            return Err(SocketError::MessageLength {
                addr: dest,
                wanted: buf.len(),
                sent,
            });
        }
        Ok(sent)
    }
}

/// Source of sockets and name resolution for the transport.
pub trait SocketFactory {
    type Socket: DatagramSocket;

    fn resolve(&self, host: &str, port: u16) -> Result<PeerAddress, SocketError>;

    /// Binds a non-blocking UDP socket on all interfaces. Port 0 picks any
    /// free port.
    fn bind_udp(&self, port: u16) -> Result<Self::Socket, SocketError>;
}

/// Sockets backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformSockets;

impl PlatformSockets {
    /// Non-blocking TCP listener bound to `port` on all interfaces.
    pub fn tcp_listener(&self, port: u16) -> Result<TcpListener, SocketError> {
        let bind = |source| SocketError::Bind { port, source };
        let listener =
            TcpListener::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)).map_err(bind)?;
        listener.set_nonblocking(true).map_err(bind)?;
        Ok(listener)
    }

    /// Connects to `addr`, then switches the stream to non-blocking mode.
    pub fn tcp_connect(&self, addr: PeerAddress) -> Result<TcpStream, SocketError> {
        let connect = |source| SocketError::Connect { addr, source };
        let stream = TcpStream::connect(addr.to_socket_addr()).map_err(connect)?;
        stream.set_nonblocking(true).map_err(connect)?;
        Ok(stream)
    }
}

impl SocketFactory for PlatformSockets {
    type Socket = PlatformUdpSocket;

    fn resolve(&self, host: &str, port: u16) -> Result<PeerAddress, SocketError> {
        PeerAddress::resolve(host, port)
    }

    fn bind_udp(&self, port: u16) -> Result<PlatformUdpSocket, SocketError> {
        let bind = |source| SocketError::Bind { port, source };
        let socket =
            UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)).map_err(bind)?;
        socket.set_nonblocking(true).map_err(bind)?;

        let local_addr = socket
            .local_addr()
            .ok()
            .and_then(PeerAddress::from_socket_addr)
            .unwrap_or(PeerAddress::NULL);

        Ok(PlatformUdpSocket {
            socket,
            local_addr,
            recv_buffer: vec![0u8; RECV_BUFFER_SIZE].into_boxed_slice(),
        })
    }
}

pub struct PlatformUdpSocket {
    socket: UdpSocket,
    local_addr: PeerAddress,
    recv_buffer: Box<[u8]>,
}

impl DatagramSocket for PlatformUdpSocket {
    fn local_addr(&self) -> PeerAddress {
        self.local_addr
    }

    fn send_to(&mut self, data: &[u8], dest: PeerAddress) -> Result<usize, SocketError> {
        self.socket
            .send_to(data, dest.to_socket_addr())
            .map_err(|e| SocketError::send(dest, e))
    }

    fn recv_from(&mut self) -> Result<Option<(WireBuffer, PeerAddress)>, SocketError> {
        match self.socket.recv_from(&mut self.recv_buffer) {
            Ok((size, addr)) => {
                let sender = PeerAddress::from_socket_addr(addr).unwrap_or(PeerAddress::NULL);
                let data = WireBuffer::from_bytes(&self.recv_buffer[..size]);
                Ok(Some((data, sender)))
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(SocketError::receive(e)),
        }
    }
}
