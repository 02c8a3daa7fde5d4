/// file: src/ui.rs
/// description: ui presentation layer that renders channel events and radar snapshots
use crate::{
    error::RadarError,
    events::ChannelEvent,
    formatter::{Colors, RadarFormatter},
    types::ChannelKey,
    view::ConsumerSnapshot,
};
use tracing::debug;

/// Console input understood by the interactive loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Switch(ChannelKey),
    Retry,
    Status,
    Help,
    Quit,
}

impl Command {
    /// Blank lines yield `Ok(None)`; any other word is taken as a symbol.
    pub fn parse(line: &str) -> Result<Option<Command>, RadarError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let command = match line.to_ascii_lowercase().as_str() {
            "retry" | "r" => Command::Retry,
            "status" | "s" => Command::Status,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            _ => Command::Switch(ChannelKey::new(line)?),
        };
        Ok(Some(command))
    }
}

pub struct UIOptions {
    pub colored: bool,
    pub quiet: bool,
}

pub struct UIController {
    formatter: RadarFormatter,
    colored: bool,
    quiet_mode: bool,
}

impl UIController {
    pub fn new(formatter: RadarFormatter, options: UIOptions) -> Self {
        Self {
            formatter,
            colored: options.colored,
            quiet_mode: options.quiet,
        }
    }

    pub fn handle_event(&self, event: &ChannelEvent) {
        match event {
            ChannelEvent::Connecting {
                key,
                target,
                attempt,
            } => {
                self.print_connection_status(
                    "CONNECTING",
                    &format!("{key} (attempt {attempt}) {target}"),
                );
            }
            ChannelEvent::Connected { key, instance_id } => {
                self.print_connection_status("CONNECTED", &format!("{key} ID: {instance_id}"));
            }
            ChannelEvent::Updated { key, facets } => {
                debug!("{} merged {} facets", key, facets);
            }
            ChannelEvent::ServerError { key, message } => {
                self.print_error("SERVER ERROR", &format!("{key}: {message}"));
            }
            ChannelEvent::MalformedFrame { key, reason } => {
                debug!("{} dropped malformed frame: {}", key, reason);
            }
            ChannelEvent::ConnectionLost { key, reason } => {
                self.print_connection_status("DISCONNECTED", &format!("{key}: {reason}"));
            }
            ChannelEvent::Reconnecting {
                key,
                attempt,
                delay_ms,
            } => {
                self.print_reconnect_info(key, *delay_ms, *attempt);
            }
            ChannelEvent::Failed { key, attempts } => {
                self.print_error(
                    "CONNECTION FAILED",
                    &format!(
                        "{key}: gave up after {attempts} attempts, type 'retry' or a new symbol"
                    ),
                );
            }
            ChannelEvent::TornDown { key } => {
                self.print_connection_status("STOPPING", &format!("{key} channel closed"));
            }
        }
    }

    pub fn render(&self, symbol: &str, snapshot: &ConsumerSnapshot) {
        println!("{}", self.formatter.format_snapshot(symbol, snapshot));
    }

    pub fn print_health(&self, health: &serde_json::Value) {
        println!("{}", health);
    }

    pub fn print_startup_banner(&self, symbol: &str) {
        if self.quiet_mode {
            return;
        }

        let (bold, cyan, reset) = if self.colored {
            (Colors::BOLD, Colors::BRIGHT_CYAN, Colors::RESET)
        } else {
            ("", "", "")
        };
        println!();
        println!("{bold}{cyan}╔══════════════════════════════════════════════════════════════╗{reset}");
        println!("{bold}{cyan}║                     MARKET RADAR CLIENT                      ║{reset}");
        println!("{bold}{cyan}╚══════════════════════════════════════════════════════════════╝{reset}");
        println!(
            " Version {} │ Symbol {} │ commands: <SYMBOL>, retry, status, quit",
            env!("CARGO_PKG_VERSION"),
            symbol
        );
        println!();
    }

    pub fn print_help(&self) {
        println!("  <SYMBOL>   switch the radar to another trading pair (e.g. ETHUSDT)");
        println!("  retry      rebuild the channel after reconnection gave up");
        println!("  status     print connection health as JSON");
        println!("  quit       close the channel and exit");
    }

    pub fn print_error(&self, error_type: &str, message: &str) {
        if self.colored {
            println!(
                "{}{}[{}]{} ! {}{}{}",
                Colors::BOLD,
                Colors::BRIGHT_RED,
                error_type,
                Colors::RESET,
                Colors::RED,
                message,
                Colors::RESET
            );
        } else {
            println!("[{}] ! {}", error_type, message);
        }
    }

    fn print_connection_status(&self, status: &str, message: &str) {
        if self.quiet_mode {
            return;
        }

        let (color, symbol) = match status {
            "CONNECTING" => (Colors::BRIGHT_YELLOW, "*"),
            "CONNECTED" => (Colors::BRIGHT_GREEN, "+"),
            "DISCONNECTED" => (Colors::BRIGHT_RED, "X"),
            "STOPPING" => (Colors::BRIGHT_MAGENTA, "!"),
            _ => (Colors::WHITE, "-"),
        };

        if self.colored {
            println!(
                "{}{}[{}]{} {} {}{}{}",
                Colors::BOLD,
                color,
                status,
                Colors::RESET,
                symbol,
                Colors::WHITE,
                message,
                Colors::RESET
            );
        } else {
            println!("[{}] {} {}", status, symbol, message);
        }
    }

    fn print_reconnect_info(&self, key: &str, delay_ms: u64, attempt: u32) {
        if self.quiet_mode {
            return;
        }
        if self.colored {
            println!(
                "{}{}[RECONNECTING]{} > {} attempt {} in {}ms...",
                Colors::BOLD,
                Colors::BRIGHT_YELLOW,
                Colors::RESET,
                key,
                attempt,
                delay_ms
            );
        } else {
            println!("[RECONNECTING] > {} attempt {} in {}ms...", key, attempt, delay_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_symbols() {
        assert_eq!(Command::parse("   ").unwrap(), None);
        assert_eq!(Command::parse("retry").unwrap(), Some(Command::Retry));
        assert_eq!(Command::parse("Q").unwrap(), Some(Command::Quit));
        assert_eq!(Command::parse("status\n").unwrap(), Some(Command::Status));
        assert_eq!(
            Command::parse("ethusdt").unwrap(),
            Some(Command::Switch(ChannelKey::new("ETHUSDT").unwrap()))
        );
        assert!(Command::parse("eth usdt").is_err());
    }
}
