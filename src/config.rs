use std::time::Duration;

use clap::{Parser, Subcommand};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::input::InputSettings;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE", global = true)]
    pub config: Option<String>,

    /// Base URL of the chat backend
    #[arg(long, env = "CHAT_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Port for the reference backend
    #[arg(long, env = "PORT", global = true)]
    pub port: Option<u16>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run the reference `/api/message` backend
    Serve,
    /// Chat from the terminal (default)
    Chat,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub client: ClientConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub endpoint: String,
    pub refocus_delay_ms: u64,
    pub placeholder: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub chunk_delay_ms: u64,
}

impl ClientConfig {
    /// Input settings derived from this config.
    pub fn input_settings(&self) -> InputSettings {
        InputSettings {
            refocus_delay: Duration::from_millis(self.refocus_delay_ms),
            placeholder: self.placeholder.clone(),
        }
    }
}

impl ServerConfig {
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args()).map(|(config, _)| config)
    }

    /// Parse `args` and layer the configuration.
    ///
    /// Priority: CLI flag > CLI env var > `CHAT_` env > config file > defaults.
    pub fn load_from_args<I, T>(args: I) -> Result<(Self, Option<Command>), config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder()
            .set_default("client.base_url", "http://127.0.0.1:3000")?
            .set_default("client.endpoint", "/api/message")?
            .set_default("client.refocus_delay_ms", 10)?
            .set_default("client.placeholder", crate::input::DEFAULT_PLACEHOLDER)?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.chunk_delay_ms", 20)?;

        if let Some(path) = &cli.config {
            builder = builder.add_source(File::with_name(path));
        } else {
            builder = builder.add_source(File::with_name("config").required(false));
        }

        // E.g. CHAT_SERVER__PORT=8000
        builder = builder.add_source(
            Environment::with_prefix("CHAT")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(base_url) = cli.base_url {
            builder = builder.set_override("client.base_url", base_url)?;
        }
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }

        let cfg = builder.build()?;
        Ok((cfg.try_deserialize()?, cli.command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides() {
        let (config, command) = AppConfig::load_from_args([
            "chat-input",
            "--base-url",
            "http://example.test:8080",
            "--port",
            "4000",
            "serve",
        ])
        .unwrap();

        assert_eq!(config.client.base_url, "http://example.test:8080");
        assert_eq!(config.server.port, 4000);
        assert_eq!(command, Some(Command::Serve));
    }

    #[test]
    fn test_input_settings() {
        let client = ClientConfig {
            base_url: "http://localhost".into(),
            endpoint: "/api/message".into(),
            refocus_delay_ms: 25,
            placeholder: "Ask".into(),
        };
        let settings = client.input_settings();
        assert_eq!(settings.refocus_delay, Duration::from_millis(25));
        assert_eq!(settings.placeholder, "Ask");
    }
}
