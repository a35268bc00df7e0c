use clap::Parser;
use herald_config::{Config, LoggingConfig};
use herald_server::{
    cli::{Args, Commands},
    error::{Result, ServerError},
    server::HeraldServer,
};
use std::process;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Logging needs the configuration, so a bad configuration is reported
    // on stderr before any subscriber exists
    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            process::exit(1);
        }
    };
    init_logging(&config.logging);

    let result = match args.command() {
        Commands::Serve => run_server(config).await,
        Commands::Config { show } => handle_config(&config, show),
        Commands::Init { output, force } => init_config(&output, force),
    };

    match result {
        Ok(()) => process::exit(0),
        Err(e) => {
            error!(error = %e, "Command failed");
            process::exit(1);
        }
    }
}

/// Run the server until a shutdown signal arrives
async fn run_server(config: Config) -> Result<()> {
    info!(
        address = %config.server.bind_address(),
        "Starting herald server"
    );
    let server = HeraldServer::new(config).await?;
    server.start().await
}

/// Print or just validate the resolved configuration
fn handle_config(config: &Config, show: bool) -> Result<()> {
    if show {
        let rendered = toml::to_string_pretty(config).map_err(|e| {
            ServerError::Config(herald_config::ConfigError::loading(e.to_string()))
        })?;
        println!("{rendered}");
    } else {
        info!("Configuration is valid");
    }
    Ok(())
}

/// Write the default configuration to `output`
fn init_config(output: &std::path::Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(ServerError::Config(herald_config::ConfigError::file(format!(
            "{} already exists, use --force to overwrite",
            output.display()
        ))));
    }

    let content = Config::generate_default()?;
    std::fs::write(output, content).map_err(|e| {
        ServerError::Config(herald_config::ConfigError::file(format!(
            "Failed to write {}: {e}",
            output.display()
        )))
    })?;

    info!(path = %output.display(), "Configuration file created");
    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", logging.level)));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
