//! Line protocol definitions
//!
//! Client → server lines are parsed into `ClientCommand`s; server → client
//! texts are produced from `Notice` values via `Display`, so every fixed
//! wire string lives in this module.

use std::fmt;

use crate::error::CommandError;

/// Instruction block sent after a successful handshake
pub const INSTRUCTIONS: [&str; 6] = [
    "Instructions:",
    "1. Type your message to broadcast it to everyone.",
    "2. Use '/send <username1,username2> <message>' to send to specific users.",
    "3. Use '/exclude <username1,username2> <message>' to broadcast excluding specific users.",
    "4. Use '/banned' to query banned phrases.",
    "5. Type 'exit' to disconnect.",
];

/// Client → Server command, one per received line
///
/// Matching order: empty, `exit`, `/banned`, `/send`, `/exclude`, chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Blank or whitespace-only line
    Empty,
    /// `exit` (any case)
    Exit,
    /// `/banned` (any case)
    Banned,
    /// `/send <u1,u2> <body>`
    Send {
        recipients: Vec<String>,
        body: String,
    },
    /// `/exclude <u1,u2> <body>`
    Exclude {
        excluded: Vec<String>,
        body: String,
    },
    /// Anything else, broadcast verbatim
    Chat(String),
}

impl ClientCommand {
    /// Parse one received line
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            return Ok(ClientCommand::Empty);
        }
        if trimmed.eq_ignore_ascii_case("exit") {
            return Ok(ClientCommand::Exit);
        }
        if trimmed.eq_ignore_ascii_case("/banned") {
            return Ok(ClientCommand::Banned);
        }
        if let Some(args) = arguments(trimmed, "/send") {
            let (recipients, body) = split_addressed(args).ok_or(CommandError::MalformedSend)?;
            return Ok(ClientCommand::Send { recipients, body });
        }
        if let Some(args) = arguments(trimmed, "/exclude") {
            let (excluded, body) =
                split_addressed(args).ok_or(CommandError::MalformedExclude)?;
            return Ok(ClientCommand::Exclude { excluded, body });
        }

        Ok(ClientCommand::Chat(line.to_string()))
    }
}

/// Text after `command` if the line is that command (bare or followed by whitespace)
fn arguments<'a>(line: &'a str, command: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(command)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim_start())
    } else {
        None
    }
}

/// Split `<u1,u2> <body>` into trimmed non-empty names and the body
fn split_addressed(args: &str) -> Option<(Vec<String>, String)> {
    let (list, body) = args.split_once(char::is_whitespace)?;
    let body = body.trim_start();
    if body.is_empty() {
        return None;
    }

    let names: Vec<String> = list
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        return None;
    }

    Some((names, body.to_string()))
}

/// Server → Client notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Handshake prompt
    UsernamePrompt,
    /// Online names sent after the handshake
    ConnectedClients(Vec<String>),
    /// Someone joined
    Joined(String),
    /// Someone left
    Left(String),
    /// Blank line received
    EmptyMessage,
    /// Reply to `/banned`
    BannedPhrases(Vec<String>),
    /// Broadcast or exclude-broadcast blocked by the filter
    BlockedBroadcast,
    /// Private message blocked by the filter
    BlockedPrivate,
    /// Unicast target not online
    UserNotFound {
        username: String,
        available: Vec<String>,
    },
    /// Malformed `/send` or `/exclude`
    Usage(&'static str),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::UsernamePrompt => write!(f, "Please provide your username:"),
            Notice::ConnectedClients(names) => {
                write!(f, "Connected clients: {}", names.join(", "))
            }
            Notice::Joined(name) => write!(f, "{} has joined the chat.", name),
            Notice::Left(name) => write!(f, "{} has left the chat.", name),
            Notice::EmptyMessage => {
                write!(f, "Cannot send an empty message. Please type something.")
            }
            Notice::BannedPhrases(phrases) => {
                write!(f, "Banned phrases: {}", phrases.join(", "))
            }
            Notice::BlockedBroadcast => write!(
                f,
                "Your message contains a banned phrase and will not be broadcast."
            ),
            Notice::BlockedPrivate => write!(
                f,
                "Your message contains a banned phrase and will not be sent."
            ),
            Notice::UserNotFound {
                username,
                available,
            } => write!(
                f,
                "User {} not found. Available clients: {}",
                username,
                available.join(", ")
            ),
            Notice::Usage(usage) => write!(f, "Usage: {}", usage),
        }
    }
}

/// Convert a protocol usage error into the notice sent back to the client
impl From<CommandError> for Notice {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::MalformedSend => Notice::Usage("/send <username1,username2> <message>"),
            CommandError::MalformedExclude => {
                Notice::Usage("/exclude <username1,username2> <message>")
            }
        }
    }
}

/// Broadcast line as seen by recipients
pub fn chat_line(sender: &str, body: &str) -> String {
    format!("{}: {}", sender, body)
}

/// Private line as seen by unicast recipients
pub fn private_line(sender: &str, body: &str) -> String {
    format!("{} (private): {}", sender, body)
}
