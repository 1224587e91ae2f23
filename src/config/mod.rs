//! Configuration management for the MCP server.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::http::HttpConfig;

/// Command-line arguments for the MCP server.
#[derive(Parser, Debug, Clone)]
#[command(name = "mcp-serve")]
#[command(author = "MCP Serve Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Minimal MCP server speaking JSON-RPC over stdio or HTTP/SSE")]
pub struct Args {
    /// Transport mode: stdio or http
    #[arg(short, long, default_value = "stdio", env = "MCP_TRANSPORT")]
    pub transport: Transport,

    /// HTTP port (only for http transport)
    #[arg(short, long, default_value = "8080", env = "MCP_PORT")]
    pub port: u16,

    /// Server name reported by initialize
    #[arg(long, default_value = "MCP Server", env = "MCP_SERVER_NAME")]
    pub name: String,

    /// Server version reported by initialize
    #[arg(long, default_value = "1.0.0", env = "MCP_SERVER_VERSION")]
    pub server_version: String,

    /// Per-request deadline in seconds
    #[arg(long, default_value = "30", env = "MCP_REQUEST_TIMEOUT")]
    pub request_timeout: u64,

    /// Graceful shutdown bound in seconds
    #[arg(long, default_value = "5", env = "MCP_SHUTDOWN_TIMEOUT")]
    pub shutdown_timeout: u64,

    /// HTTP body read deadline in seconds
    #[arg(long, default_value = "30", env = "MCP_READ_TIMEOUT")]
    pub read_timeout: u64,

    /// SSE frame write deadline in seconds
    #[arg(long, default_value = "30", env = "MCP_WRITE_TIMEOUT")]
    pub write_timeout: u64,

    /// HTTP idle timeout in seconds
    #[arg(long, default_value = "120", env = "MCP_IDLE_TIMEOUT")]
    pub idle_timeout: u64,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info", env = "MCP_LOG_LEVEL")]
    pub log_level: LogLevel,

    /// Emit logs as JSON
    #[arg(long, env = "MCP_LOG_JSON")]
    pub log_json: bool,
}

/// Transport mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Stdio,
    Http,
}

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Transport mode
    pub transport: Transport,
    /// HTTP port
    pub port: u16,
    /// Server name
    pub name: String,
    /// Server version
    pub server_version: String,
    /// Timeouts, in seconds
    pub request_timeout: u64,
    pub shutdown_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub idle_timeout: u64,
    /// Log level
    pub log_level: LogLevel,
    /// JSON log output
    pub log_json: bool,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            transport: args.transport,
            port: args.port,
            name: args.name,
            server_version: args.server_version,
            request_timeout: args.request_timeout,
            shutdown_timeout: args.shutdown_timeout,
            read_timeout: args.read_timeout,
            write_timeout: args.write_timeout,
            idle_timeout: args.idle_timeout,
            log_level: args.log_level,
            log_json: args.log_json,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport: Transport::Stdio,
            port: 8080,
            name: "MCP Server".to_string(),
            server_version: "1.0.0".to_string(),
            request_timeout: 30,
            shutdown_timeout: 5,
            read_timeout: 30,
            write_timeout: 30,
            idle_timeout: 120,
            log_level: LogLevel::Info,
            log_json: false,
        }
    }
}

impl Config {
    /// Reject settings the transports cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::Config("port must be between 1 and 65535".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(Error::Config("server name must not be empty".to_string()));
        }
        if self.server_version.trim().is_empty() {
            return Err(Error::Config("server version must not be empty".to_string()));
        }

        for (name, seconds) in [
            ("request", self.request_timeout),
            ("shutdown", self.shutdown_timeout),
            ("read", self.read_timeout),
            ("write", self.write_timeout),
            ("idle", self.idle_timeout),
        ] {
            if seconds == 0 {
                return Err(Error::Config(format!(
                    "{} timeout must be at least 1 second",
                    name
                )));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Settings for the HTTP transport.
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            port: self.port,
            read_timeout: Duration::from_secs(self.read_timeout),
            write_timeout: Duration::from_secs(self.write_timeout),
            idle_timeout: Duration::from_secs(self.idle_timeout),
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_default() {
        assert_eq!(Transport::default(), Transport::Stdio);
    }

    #[test]
    fn test_transport_serialization() {
        let transports = [
            (Transport::Stdio, "\"stdio\""),
            (Transport::Http, "\"http\""),
        ];

        for (transport, expected) in &transports {
            let json = serde_json::to_string(transport).unwrap();
            assert_eq!(json, *expected);
        }
    }

    #[test]
    fn test_config_default_values() {
        let config = Config::default();

        assert_eq!(config.transport, Transport::Stdio);
        assert_eq!(config.port, 8080);
        assert_eq!(config.name, "MCP Server");
        assert_eq!(config.server_version, "1.0.0");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(!config.log_json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_deserialization() {
        let json = r#"{
            "transport": "http",
            "port": 9000,
            "name": "Tea House",
            "server_version": "2.0.0",
            "request_timeout": 10,
            "shutdown_timeout": 2,
            "read_timeout": 15,
            "write_timeout": 15,
            "idle_timeout": 60,
            "log_level": "debug",
            "log_json": true
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.transport, Transport::Http);
        assert_eq!(config.port, 9000);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert!(config.log_json);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let port = Config {
            port: 0,
            ..Config::default()
        };
        assert!(matches!(port.validate(), Err(Error::Config(_))));

        let timeout = Config {
            write_timeout: 0,
            ..Config::default()
        };
        let err = timeout.validate().unwrap_err();
        assert!(err.to_string().contains("write timeout"));

        let name = Config {
            name: "  ".to_string(),
            ..Config::default()
        };
        assert!(name.validate().is_err());
    }

    #[test]
    fn test_http_config() {
        let config = Config {
            port: 3000,
            shutdown_timeout: 7,
            ..Config::default()
        };

        let http = config.http_config();
        assert_eq!(http.port, 3000);
        assert_eq!(http.shutdown_timeout, Duration::from_secs(7));
        assert_eq!(http.idle_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_args_parsing() {
        let args = Args::try_parse_from([
            "mcp-serve",
            "--transport",
            "http",
            "--port",
            "4000",
            "--log-level",
            "warn",
            "--request-timeout",
            "5",
        ])
        .unwrap();

        let config: Config = args.into();

        assert_eq!(config.transport, Transport::Http);
        assert_eq!(config.port, 4000);
        assert_eq!(config.log_level, LogLevel::Warn);
        assert_eq!(config.request_timeout, 5);
        assert_eq!(config.name, "MCP Server");
    }

    #[test]
    fn test_args_reject_unknown_transport() {
        assert!(Args::try_parse_from(["mcp-serve", "--transport", "carrier-pigeon"]).is_err());
    }

    #[test]
    fn test_log_level_filters() {
        assert_eq!(LogLevel::Debug.as_filter(), "debug");
        assert_eq!(LogLevel::Error.as_filter(), "error");
    }
}
