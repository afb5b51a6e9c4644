mod remote;

use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;

use remote::RemoteConsole;
use tether::{
    ClientGameMessage, DisconnectReason, PlatformSockets, Server, ServerConfig, ServerEvent,
    ServerGameMessage,
};

#[derive(Parser)]
#[command(name = "tether-server")]
#[command(about = "Tether game server")]
struct Args {
    #[arg(short, long, default_value_t = tether::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value_t = 60)]
    tick_rate: u32,

    #[arg(short, long, default_value_t = 32)]
    max_clients: usize,

    #[arg(short, long, default_value = "DeathMatch")]
    game: String,

    #[arg(long, default_value_t = 30.0, help = "Seconds of silence before a client is dropped")]
    client_timeout: f32,

    #[arg(long, default_value_t = 0.05, help = "Seconds between two datagrams to a client")]
    send_interval: f32,

    #[arg(long, default_value = "", help = "Remote console password (empty disables it)")]
    rcon_password: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = ServerConfig {
        port: args.port,
        game_name: args.game,
        max_clients: args.max_clients,
        send_interval_secs: args.send_interval,
        client_timeout_secs: args.client_timeout,
        rcon_password: args.rcon_password,
        ..Default::default()
    };

    let mut server = Server::bind(&PlatformSockets, config)?;
    log::info!("Server started on {}", server.local_addr());

    let console = Rc::new(RefCell::new(RemoteConsole::new()));
    let handler_console = Rc::clone(&console);
    server.set_rcon_handler(move |line| handler_console.borrow_mut().run(line));

    let tick_duration = Duration::from_secs_f64(1.0 / f64::from(args.tick_rate.max(1)));
    let mut last_tick = Instant::now();

    loop {
        let now = Instant::now();
        let frame_time = now.duration_since(last_tick).as_secs_f32();
        last_tick = now;

        server.tick(frame_time);

        let events: Vec<ServerEvent> = server.drain_events().collect();
        for event in events {
            handle_event(&mut server, event);
        }

        let mut console = console.borrow_mut();
        console.players = server
            .clients()
            .map(|c| format!("{} {} ({})", c.client_id, c.player_name, c.addr))
            .collect();
        for text in console.announcements.drain(..) {
            broadcast_chat(&mut server, text);
        }
        drop(console);

        thread::sleep(tick_duration.saturating_sub(now.elapsed()));
    }
}

fn handle_event(server: &mut Server<PlatformSockets>, event: ServerEvent) {
    match event {
        ServerEvent::ClientConnected {
            client_id,
            addr,
            player_name,
            ..
        } => {
            log::info!("Client {} connected from {}", client_id, addr);
            broadcast_chat(server, format!("{} joined.", player_name));
        }
        ServerEvent::ClientDisconnected { client_id, reason } => {
            log::info!("Client {} {}", client_id, reason.as_str());
        }
        ServerEvent::ConnectionDenied { addr, reason } => {
            log::warn!("Connection denied to {}: {}", addr, reason);
        }
        ServerEvent::Payload {
            client_id, bytes, ..
        } => handle_payload(server, client_id, bytes),
        ServerEvent::Error { message } => log::error!("{}", message),
    }
}

fn handle_payload(server: &mut Server<PlatformSockets>, client_id: u32, bytes: Vec<u8>) {
    let mut payload = tether::WireBuffer::from_bytes(bytes);
    let messages = match ClientGameMessage::read_all(&mut payload) {
        Ok(messages) => messages,
        Err(e) => {
            log::warn!("Bad message from client {}: {}", client_id, e);
            return;
        }
    };

    for message in messages {
        match message {
            ClientGameMessage::Disconnect => {
                if let Err(e) = server.disconnect_client(client_id, DisconnectReason::Graceful) {
                    log::debug!("{}", e);
                }
                return;
            }
            ClientGameMessage::SayToAll(text) => {
                let name = server
                    .client(client_id)
                    .map_or_else(|| client_id.to_string(), |c| c.player_name.clone());
                broadcast_chat(server, format!("{}: {}", name, text));
            }
        }
    }
}

fn broadcast_chat(server: &mut Server<PlatformSockets>, text: String) {
    log::info!("{}", text);
    let message = ServerGameMessage::Chat(text).to_bytes();
    if let Err(e) = server.broadcast_reliable(&message) {
        log::error!("Chat message not sent: {}", e);
    }
}
