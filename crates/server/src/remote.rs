use std::time::Instant;

/// Commands reachable through the remote console.
///
/// The server loop refreshes `players` every tick and broadcasts whatever
/// lands in `announcements`.
#[derive(Debug)]
pub struct RemoteConsole {
    pub players: Vec<String>,
    pub announcements: Vec<String>,
    started: Instant,
}

impl RemoteConsole {
    pub fn new() -> Self {
        Self {
            players: Vec::new(),
            announcements: Vec::new(),
            started: Instant::now(),
        }
    }

    pub fn run(&mut self, line: &str) -> String {
        let line = line.trim();
        let (name, rest) = line.split_once(' ').unwrap_or((line, ""));

        match name {
            "status" | "players" => {
                if self.players.is_empty() {
                    return "No players connected.\n".to_string();
                }
                let mut out = format!("{} player(s):\n", self.players.len());
                for player in &self.players {
                    out.push_str("  ");
                    out.push_str(player);
                    out.push('\n');
                }
                out
            }
            "uptime" => format!("Up for {} seconds.\n", self.started.elapsed().as_secs()),
            "say" if !rest.trim().is_empty() => {
                self.announcements.push(format!("Server: {}", rest.trim()));
                String::new()
            }
            "help" => "Commands: status, uptime, say <text>, help\n".to_string(),
            _ => format!("Unknown command \"{}\".\n", line),
        }
    }
}
