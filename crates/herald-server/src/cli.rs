use clap::{Parser, Subcommand};
use herald_config::{Config, ConfigLoader};
use std::path::PathBuf;

/// Herald - real-time publish/subscribe notification server
#[derive(Parser, Debug)]
#[command(name = "herald-server")]
#[command(about = "Publish/subscribe notification server with topic reservations")]
#[command(version)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, env = "HERALD_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Server bind address, overrides the configuration file
    #[arg(long, env = "HERALD_BIND_ADDRESS")]
    pub bind_address: Option<String>,

    /// Server port, overrides the configuration file
    #[arg(short, long, env = "HERALD_PORT")]
    pub port: Option<u16>,

    /// Log level, overrides the configuration file
    #[arg(long, env = "HERALD_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the server
    Serve,
    /// Validate configuration
    Config {
        /// Show resolved configuration
        #[arg(long)]
        show: bool,
    },
    /// Generate default configuration
    Init {
        /// Output file path
        #[arg(short, long, default_value = "herald.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

impl Args {
    /// Get the effective configuration file path
    pub fn config_file(&self) -> Option<&PathBuf> {
        self.config.as_ref()
    }

    /// Get the command to execute, `serve` when none was given
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }

    /// Load the configuration file and environment, then apply command line
    /// overrides
    pub fn load_config(&self) -> herald_config::Result<Config> {
        let mut loader = ConfigLoader::new();
        if let Some(path) = self.config_file() {
            loader = loader.with_file(&path.to_string_lossy());
        }
        let mut config = loader.load()?;

        if let Some(host) = &self.bind_address {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.to_lowercase();
        }

        config.validate()?;
        Ok(config)
    }
}
