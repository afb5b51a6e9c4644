use crate::client::Client;
use crate::error::{ClientError, ConsoleError};
use crate::socket::SocketFactory;

/// A line typed at the client console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Connect { host: String, port: Option<u16> },
    Disconnect,
    Rcon(String),
    Say(String),
    Status,
    Quit,
}

/// What the caller should do after a command ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Done,
    Print(String),
    Quit,
}

impl ConsoleCommand {
    /// Parses a console line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, ConsoleError> {
        let line = line.trim();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        let command = match name.to_ascii_lowercase().as_str() {
            "" => return Ok(None),
            "connect" => {
                let mut args = rest.split_whitespace();
                let host = args
                    .next()
                    .ok_or(ConsoleError::Usage("connect <host> [port]"))?
                    .to_string();
                let port = args
                    .next()
                    .map(str::parse::<u16>)
                    .transpose()
                    .map_err(|_| ConsoleError::Usage("connect <host> [port]"))?;
                ConsoleCommand::Connect { host, port }
            }
            "disconnect" => ConsoleCommand::Disconnect,
            "rcon" if !rest.is_empty() => ConsoleCommand::Rcon(rest.to_string()),
            "rcon" => return Err(ConsoleError::Usage("rcon <command>")),
            "say" if !rest.is_empty() => ConsoleCommand::Say(rest.to_string()),
            "say" => return Err(ConsoleError::Usage("say <text>")),
            "status" => ConsoleCommand::Status,
            "quit" | "exit" => ConsoleCommand::Quit,
            other => return Err(ConsoleError::UnknownCommand(other.to_string())),
        };
        Ok(Some(command))
    }

    /// Runs the command against `client`.
    pub fn execute<F: SocketFactory>(
        &self,
        client: &mut Client<F>,
    ) -> Result<CommandOutcome, ClientError> {
        match self {
            ConsoleCommand::Connect { host, port } => {
                let port = port.unwrap_or(client.config().default_server_port);
                client.connect(host, port)?;
            }
            ConsoleCommand::Disconnect => client.disconnect(),
            ConsoleCommand::Rcon(command) => client.rcon(command)?,
            ConsoleCommand::Say(text) => client.say(text)?,
            ConsoleCommand::Status => return Ok(CommandOutcome::Print(status_line(client))),
            ConsoleCommand::Quit => {
                client.disconnect();
                return Ok(CommandOutcome::Quit);
            }
        }
        Ok(CommandOutcome::Done)
    }
}

fn status_line<F: SocketFactory>(client: &Client<F>) -> String {
    let stats = client.stats();
    let mut line = format!("state: {}", client.state());
    if !client.server_address().is_null() {
        line.push_str(&format!(", server: {}", client.server_address()));
    }
    if let Some(left) = client.connect_time_left() {
        line.push_str(&format!(", timeout in {:.1}s", left));
    }
    line.push_str(&format!(
        ", sent {} packets ({} bytes), received {} packets ({} bytes)",
        stats.packets_sent, stats.bytes_sent, stats.packets_received, stats.bytes_received
    ));
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::events::ConnectionState;
    use crate::simulator::SimulatedNetwork;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            ConsoleCommand::parse("connect 10.0.0.1 27000").unwrap(),
            Some(ConsoleCommand::Connect {
                host: "10.0.0.1".into(),
                port: Some(27000)
            })
        );
        assert_eq!(
            ConsoleCommand::parse("  connect localhost").unwrap(),
            Some(ConsoleCommand::Connect {
                host: "localhost".into(),
                port: None
            })
        );
        assert_eq!(
            ConsoleCommand::parse("rcon changeLevel('dm1')").unwrap(),
            Some(ConsoleCommand::Rcon("changeLevel('dm1')".into()))
        );
        assert_eq!(
            ConsoleCommand::parse("say hello  there").unwrap(),
            Some(ConsoleCommand::Say("hello  there".into()))
        );
        assert_eq!(
            ConsoleCommand::parse("QUIT").unwrap(),
            Some(ConsoleCommand::Quit)
        );
        assert_eq!(ConsoleCommand::parse("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            ConsoleCommand::parse("connect"),
            Err(ConsoleError::Usage("connect <host> [port]"))
        );
        assert_eq!(
            ConsoleCommand::parse("connect host notaport"),
            Err(ConsoleError::Usage("connect <host> [port]"))
        );
        assert_eq!(
            ConsoleCommand::parse("say"),
            Err(ConsoleError::Usage("say <text>"))
        );
        assert_eq!(
            ConsoleCommand::parse("jump"),
            Err(ConsoleError::UnknownCommand("jump".into()))
        );
    }

    #[test]
    fn test_execute_against_given_client() {
        let net = SimulatedNetwork::new(5);
        let _server = net.bind_udp(30000).unwrap();
        let mut client = Client::new(net.clone(), ClientConfig::default());

        let connect = ConsoleCommand::parse("connect localhost").unwrap().unwrap();
        assert_eq!(connect.execute(&mut client).unwrap(), CommandOutcome::Done);
        assert_eq!(client.state(), ConnectionState::Connecting);

        let again = connect.execute(&mut client).unwrap_err();
        assert_eq!(again.to_string(), "The client is already connecting...");

        let status = ConsoleCommand::Status.execute(&mut client).unwrap();
        assert!(matches!(status, CommandOutcome::Print(ref s) if s.starts_with("state: connecting")));

        assert_eq!(
            ConsoleCommand::Quit.execute(&mut client).unwrap(),
            CommandOutcome::Quit
        );
        assert_eq!(client.state(), ConnectionState::Idle);
        assert_eq!(net.closed_sockets(), 1);
    }

    #[test]
    fn test_say_needs_game() {
        let net = SimulatedNetwork::new(5);
        let mut client = Client::new(net, ClientConfig::default());
        assert!(matches!(
            ConsoleCommand::Say("hi".into()).execute(&mut client),
            Err(ClientError::NotConnected)
        ));
    }
}
