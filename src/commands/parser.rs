use super::{ShellPassthrough, SlashCommand};

/// Parsed command types
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedCommand {
    /// Slash command (/help, /sessions, etc.)
    Slash(SlashCommand),
    /// Shell passthrough (!whois example.com)
    ShellPassthrough(ShellPassthrough),
    /// Regular user message
    Regular(String),
}

/// Command parser
pub struct CommandParser;

impl CommandParser {
    /// Parse user input into a command
    pub fn parse(input: &str) -> ParsedCommand {
        let trimmed = input.trim();

        if let Some(rest) = trimmed.strip_prefix('/') {
            if !rest.is_empty() {
                return ParsedCommand::Slash(SlashCommand::parse(trimmed));
            }
        }

        if let Some(rest) = trimmed.strip_prefix('!') {
            return ParsedCommand::ShellPassthrough(ShellPassthrough {
                command: rest.trim().to_string(),
            });
        }

        ParsedCommand::Regular(input.to_string())
    }
}
