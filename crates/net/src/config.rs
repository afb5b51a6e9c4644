use crate::protocol::DEFAULT_PORT;

/// At most this many datagrams are read per tick.
pub const MAX_PACKETS_PER_TICK: usize = 20;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Local UDP port; 0 lets the OS pick one.
    pub client_port: u16,
    pub player_name: String,
    pub model_name: String,
    /// Servers announcing a different game are ignored. Empty accepts any.
    pub game_name: String,
    pub connect_timeout_secs: f32,
    pub max_packets_per_tick: usize,
    pub rcon_password: String,
    pub default_server_host: String,
    pub default_server_port: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_port: 0,
            player_name: "Player".to_string(),
            model_name: "James".to_string(),
            game_name: String::new(),
            connect_timeout_secs: 8.0,
            max_packets_per_tick: MAX_PACKETS_PER_TICK,
            rcon_password: String::new(),
            default_server_host: "localhost".to_string(),
            default_server_port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Announced to clients in the connect acknowledgement.
    pub game_name: String,
    pub max_clients: usize,
    pub send_interval_secs: f32,
    pub client_timeout_secs: f32,
    pub max_packets_per_tick: usize,
    /// Remote console is disabled while this is empty.
    pub rcon_password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            game_name: "DeathMatch".to_string(),
            max_clients: 32,
            send_interval_secs: 0.05,
            client_timeout_secs: 30.0,
            max_packets_per_tick: 256,
            rcon_password: String::new(),
        }
    }
}
