use std::collections::HashMap;
use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub connection: ConnectionSettings,
    pub auth: AuthSettings,
    pub push: PushSettings,
    pub log: LogSettings,
}

/// Listener addresses and request paths.
///
/// WebSocket upgrades are accepted on `port`; the push/drop HTTP API is
/// served on `admin_port`.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub admin_port: u16,
    pub ws_path: String,
    pub push_path: String,
    pub drop_path: String,
}

/// Per-connection limits.
#[derive(Debug, Deserialize, Clone)]
pub struct ConnectionSettings {
    pub write_timeout_ms: u64,
    pub max_message_bytes: usize,
}

impl ConnectionSettings {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Token → identity table used to resolve register messages. Empty means
/// the token itself is the identity.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthSettings {
    pub tokens: HashMap<String, String>,
}

/// Shared secret required on push/drop requests, if any.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PushSettings {
    pub auth_token: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Every field is optional; missing values are filled from defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub connection: Option<PartialConnectionSettings>,
    pub auth: Option<PartialAuthSettings>,
    pub push: Option<PartialPushSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub admin_port: Option<u16>,
    pub ws_path: Option<String>,
    pub push_path: Option<String>,
    pub drop_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialConnectionSettings {
    pub write_timeout_ms: Option<u64>,
    pub max_message_bytes: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialAuthSettings {
    pub tokens: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
pub struct PartialPushSettings {
    pub auth_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

/// Provides default values for `Settings`.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
                admin_port: 8081,
                ws_path: "/ws".to_string(),
                push_path: "/push".to_string(),
                drop_path: "/drop".to_string(),
            },
            connection: ConnectionSettings {
                write_timeout_ms: 5_000,
                max_message_bytes: 64 * 1024,
            },
            auth: AuthSettings::default(),
            push: PushSettings::default(),
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl Settings {
    /// Fills every field missing from `partial` with its default.
    pub fn merge(partial: PartialSettings) -> Self {
        let default = Settings::default();
        let server = partial.server;
        let connection = partial.connection;

        Settings {
            server: ServerSettings {
                host: server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(default.server.host),
                port: server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(default.server.port),
                admin_port: server
                    .as_ref()
                    .and_then(|s| s.admin_port)
                    .unwrap_or(default.server.admin_port),
                ws_path: server
                    .as_ref()
                    .and_then(|s| s.ws_path.clone())
                    .unwrap_or(default.server.ws_path),
                push_path: server
                    .as_ref()
                    .and_then(|s| s.push_path.clone())
                    .unwrap_or(default.server.push_path),
                drop_path: server
                    .as_ref()
                    .and_then(|s| s.drop_path.clone())
                    .unwrap_or(default.server.drop_path),
            },
            connection: ConnectionSettings {
                write_timeout_ms: connection
                    .as_ref()
                    .and_then(|c| c.write_timeout_ms)
                    .unwrap_or(default.connection.write_timeout_ms),
                max_message_bytes: connection
                    .as_ref()
                    .and_then(|c| c.max_message_bytes)
                    .unwrap_or(default.connection.max_message_bytes),
            },
            auth: AuthSettings {
                tokens: partial
                    .auth
                    .and_then(|a| a.tokens)
                    .unwrap_or(default.auth.tokens),
            },
            push: PushSettings {
                auth_token: partial
                    .push
                    .and_then(|p| p.auth_token)
                    .filter(|t| !t.is_empty()),
            },
            log: LogSettings {
                level: partial
                    .log
                    .and_then(|l| l.level)
                    .unwrap_or(default.log.level),
            },
        }
    }

    /// Checks the request paths. The push and drop paths must start with
    /// `/`; the WebSocket path may also be empty, which accepts any path.
    /// The three routes must be distinct.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let paths = [
            ("ws_path", &self.server.ws_path, true),
            ("push_path", &self.server.push_path, false),
            ("drop_path", &self.server.drop_path, false),
        ];
        for (name, path, may_be_empty) in paths {
            let legal = path.starts_with('/') || (may_be_empty && path.is_empty());
            if !legal {
                return Err(ConfigError::Message(format!(
                    "server.{name}: {path} is not a legal path"
                )));
            }
        }
        if self.server.ws_path == self.server.push_path {
            return Err(ConfigError::Message(
                "server.ws_path is equal to server.push_path".to_string(),
            ));
        }
        if self.server.push_path == self.server.drop_path {
            return Err(ConfigError::Message(
                "server.push_path is equal to server.drop_path".to_string(),
            ));
        }
        if self.connection.write_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "connection.write_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
