//! Server configuration
//!
//! Loaded once at startup from a `key=value` text file and shared read-only
//! (behind an `Arc`) for the lifetime of the process.
//!
//! ```text
//! port=12345
//! serverName=Relay
//! bannedPhrase=spam
//! bannedPhrase=buy now
//! ```

use std::fs;
use std::path::Path;
use std::str::FromStr;

use tracing::{info, warn};

use crate::error::ConfigError;

/// Immutable server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// TCP port to listen on
    pub port: u16,
    /// Name shown in the startup banner
    pub server_name: String,
    /// Lowercased banned phrases, in file order
    pub banned_phrases: Vec<String>,
}

impl Config {
    /// Read and parse the configuration file at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = text.parse()?;
        info!(
            "Server configuration loaded from {} ({} banned phrases)",
            path.display(),
            config.banned_phrases.len()
        );
        Ok(config)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut port = None;
        let mut server_name = None;
        let mut banned_phrases = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::Malformed {
                    line: index + 1,
                    content: raw.to_string(),
                });
            };
            let value = value.trim();

            match key.trim() {
                "port" => {
                    let parsed = value.parse::<u16>().map_err(|_| ConfigError::InvalidPort {
                        value: value.to_string(),
                    })?;
                    port = Some(parsed);
                }
                "serverName" => server_name = Some(value.to_string()),
                "bannedPhrase" => {
                    if value.is_empty() {
                        warn!("Ignoring empty bannedPhrase on line {}", index + 1);
                    } else {
                        banned_phrases.push(value.to_lowercase());
                    }
                }
                other => warn!("Ignoring unknown configuration key '{}'", other),
            }
        }

        Ok(Config {
            port: port.ok_or(ConfigError::MissingKey("port"))?,
            server_name: server_name.ok_or(ConfigError::MissingKey("serverName"))?,
            banned_phrases,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: Config = "port=12345\nserverName=Relay\nbannedPhrase=Spam\nbannedPhrase= buy now \n"
            .parse()
            .unwrap();

        assert_eq!(config.port, 12345);
        assert_eq!(config.server_name, "Relay");
        assert_eq!(config.banned_phrases, vec!["spam", "buy now"]);
    }

    #[test]
    fn test_banned_phrase_keeps_equals_in_value() {
        let config: Config = "port=1\nserverName=x\nbannedPhrase=a=b\n".parse().unwrap();
        assert_eq!(config.banned_phrases, vec!["a=b"]);
    }

    #[test]
    fn test_comments_blank_lines_and_unknown_keys_ignored() {
        let config: Config = "# relay\n\nport = 2000\nmotd=hello\nserverName=Relay\n"
            .parse()
            .unwrap();

        assert_eq!(config.port, 2000);
        assert!(config.banned_phrases.is_empty());
    }

    #[test]
    fn test_empty_banned_phrase_skipped() {
        let config: Config = "port=1\nserverName=x\nbannedPhrase=\nbannedPhrase=  \n"
            .parse()
            .unwrap();
        assert!(config.banned_phrases.is_empty());
    }

    #[test]
    fn test_missing_port() {
        let err = "serverName=Relay\n".parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey("port")));
    }

    #[test]
    fn test_missing_server_name() {
        let err = "port=80\n".parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey("serverName")));
    }

    #[test]
    fn test_invalid_port() {
        let err = "port=eighty\nserverName=x\n".parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort { .. }));

        let err = "port=70000\nserverName=x\n".parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort { .. }));
    }

    #[test]
    fn test_malformed_line() {
        let err = "port=80\nserverName\n".parse::<Config>().unwrap_err();
        match err {
            ConfigError::Malformed { line, content } => {
                assert_eq!(line, 2);
                assert_eq!(content, "serverName");
            }
            other => panic!("Wrong error: {other:?}"),
        }
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/server_details.txt").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("chat_relay_{}.txt", uuid::Uuid::new_v4()));
        fs::write(&path, "port=4000\nserverName=File\nbannedPhrase=BAD\n").unwrap();

        let config = Config::load(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.port, 4000);
        assert_eq!(config.banned_phrases, vec!["bad"]);
    }
}
