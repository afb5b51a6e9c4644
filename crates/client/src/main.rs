mod input;

use std::sync::mpsc::TryRecvError;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;

use tether::{
    Client, ClientConfig, ClientEvent, CommandOutcome, ConsoleCommand, PlatformSockets,
    ServerGameMessage, WireBuffer,
};

#[derive(Parser)]
#[command(name = "tether-client")]
#[command(about = "Tether console client")]
struct Args {
    #[arg(short, long, help = "Server to connect to on startup")]
    server: Option<String>,

    #[arg(short, long, default_value_t = tether::DEFAULT_PORT)]
    port: u16,

    #[arg(long, default_value_t = 0, help = "Local UDP port (0 picks any)")]
    client_port: u16,

    #[arg(short, long, default_value = "Player")]
    name: String,

    #[arg(short, long, default_value = "James")]
    model: String,

    #[arg(short, long, default_value = "", help = "Only join servers running this game")]
    game: String,

    #[arg(long, default_value = "")]
    rcon_password: String,

    #[arg(short, long, default_value_t = 60)]
    tick_rate: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = ClientConfig {
        client_port: args.client_port,
        player_name: args.name,
        model_name: args.model,
        game_name: args.game,
        rcon_password: args.rcon_password,
        default_server_host: args.server.clone().unwrap_or_else(|| "localhost".to_string()),
        default_server_port: args.port,
        ..Default::default()
    };
    let mut client = Client::new(PlatformSockets, config);

    if let Some(host) = &args.server {
        if let Err(e) = client.connect(host, args.port) {
            println!("{}", e);
        }
    }

    let lines = input::spawn_stdin_reader();
    let tick_duration = Duration::from_secs_f64(1.0 / f64::from(args.tick_rate.max(1)));
    let mut last_tick = Instant::now();

    'main: loop {
        loop {
            let line = match lines.try_recv() {
                Ok(line) => line,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break 'main,
            };
            if run_line(&mut client, &line) == CommandOutcome::Quit {
                break 'main;
            }
        }

        let now = Instant::now();
        client.tick(now.duration_since(last_tick).as_secs_f32());
        last_tick = now;

        let events: Vec<ClientEvent> = client.drain_events().collect();
        for event in events {
            show_event(event);
        }

        thread::sleep(tick_duration.saturating_sub(now.elapsed()));
    }

    client.disconnect();
    log::info!("Client shutting down");
    Ok(())
}

fn run_line(client: &mut Client<PlatformSockets>, line: &str) -> CommandOutcome {
    let command = match ConsoleCommand::parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return CommandOutcome::Done,
        Err(e) => {
            println!("{}", e);
            return CommandOutcome::Done;
        }
    };

    match command.execute(client) {
        Ok(CommandOutcome::Print(text)) => {
            println!("{}", text);
            CommandOutcome::Done
        }
        Ok(outcome) => outcome,
        Err(e) => {
            println!("{}", e);
            CommandOutcome::Done
        }
    }
}

fn show_event(event: ClientEvent) {
    match event {
        ClientEvent::StateChanged { state } => println!("[{}]", state),
        ClientEvent::Message(text) => println!("{}", text),
        ClientEvent::RconReply(text) => print!("{}", text),
        ClientEvent::Payload { bytes, .. } if bytes.is_empty() => {}
        ClientEvent::Payload { bytes, sequence } => {
            let mut payload = WireBuffer::from_bytes(bytes);
            match ServerGameMessage::read_all(&mut payload) {
                Ok(messages) => messages.into_iter().for_each(show_message),
                Err(e) => log::warn!("Bad server message in packet {}: {}", sequence, e),
            }
        }
    }
}

fn show_message(message: ServerGameMessage) {
    match message {
        ServerGameMessage::Chat(text) => println!("{}", text),
        ServerGameMessage::DropClient { client_id, reason } => {
            println!("Client {} left ({})", client_id, reason)
        }
    }
}
