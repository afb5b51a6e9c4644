use std::sync::atomic::{AtomicU16, Ordering};
use std::thread;
use std::time::Duration;

use tether::{
    Client, ClientConfig, ClientEvent, ClientGameMessage, ConnectionState, PlatformSockets,
    Server, ServerConfig, ServerEvent,
};

static PORT_COUNTER: AtomicU16 = AtomicU16::new(41000);

fn next_port() -> u16 {
    PORT_COUNTER.fetch_add(10, Ordering::SeqCst)
}

/// Ticks both ends until `done` holds or the budget runs out.
fn pump(
    client: &mut Client<PlatformSockets>,
    server: &mut Server<PlatformSockets>,
    mut done: impl FnMut(&mut Client<PlatformSockets>, &mut Server<PlatformSockets>) -> bool,
) -> bool {
    for _ in 0..500 {
        client.tick(0.01);
        server.tick(0.05);
        if done(client, server) {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

#[test]
fn test_handshake_over_udp() {
    let port = next_port();
    let mut server = Server::bind(
        &PlatformSockets,
        ServerConfig {
            port,
            ..Default::default()
        },
    )
    .unwrap();

    let mut client = Client::new(PlatformSockets, ClientConfig::default());
    client.connect("127.0.0.1", port).unwrap();
    assert_eq!(client.state(), ConnectionState::Connecting);

    let joined = pump(&mut client, &mut server, |c, _| {
        c.state() == ConnectionState::InGame
    });
    assert!(joined, "client never entered the game");
    assert_eq!(server.client_count(), 1);
    assert!(server
        .drain_events()
        .any(|e| matches!(e, ServerEvent::ClientConnected { .. })));
}

#[test]
fn test_reliable_exchange_over_udp() {
    let port = next_port();
    let mut server = Server::bind(
        &PlatformSockets,
        ServerConfig {
            port,
            ..Default::default()
        },
    )
    .unwrap();
    let mut client = Client::new(PlatformSockets, ClientConfig::default());
    client.connect("localhost", port).unwrap();
    assert!(pump(&mut client, &mut server, |c, _| c.state()
        == ConnectionState::InGame));
    server.drain_events().for_each(drop);

    client.say("hello").unwrap();
    let mut said = Vec::new();
    let arrived = pump(&mut client, &mut server, |_, s| {
        for event in s.drain_events() {
            if let ServerEvent::Payload { bytes, .. } = event {
                said.extend(bytes);
            }
        }
        !said.is_empty()
    });
    assert!(arrived);
    assert_eq!(said, ClientGameMessage::SayToAll("hello".into()).to_bytes());

    server.broadcast_reliable(b"welcome").unwrap();
    let mut received = Vec::new();
    let arrived = pump(&mut client, &mut server, |c, _| {
        for event in c.drain_events() {
            if let ClientEvent::Payload { bytes, .. } = event {
                received.extend(bytes);
            }
        }
        !received.is_empty()
    });
    assert!(arrived);
    assert_eq!(received, b"welcome");
}

#[test]
fn test_connect_to_silent_port_times_out() {
    let port = next_port();
    let mut client = Client::new(
        PlatformSockets,
        ClientConfig {
            connect_timeout_secs: 0.5,
            ..Default::default()
        },
    );
    client.connect("127.0.0.1", port).unwrap();
    for _ in 0..10 {
        client.tick(0.1);
    }
    assert_eq!(client.state(), ConnectionState::Idle);
    assert!(client.server_address().is_null());
}
