//! API Workbench - mock API responder and outbound request proxy

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use api_workbench::{
    cli::{Cli, Command},
    config::Config,
    gateway::Gateway,
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Some(Command::CheckConfig) => check_config(&config),
        Some(Command::Serve) | None => run_server(config).await,
    }
}

/// Load configuration and apply CLI overrides
fn load_config(cli: &Cli) -> api_workbench::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(ref host) = cli.host {
        config.server.host = host.clone();
    }
    Ok(config)
}

/// Print the resolved configuration summary
fn check_config(config: &Config) -> ExitCode {
    println!("✅ Configuration valid");
    println!("   Listen: {}:{}", config.server.host, config.server.port);
    println!("   Store: {}", config.store.backend.as_str());
    if let Some(ref url) = config.store.url {
        println!("   Store URL: {url}");
    }
    if let Some(ref seed) = config.store.seed_file {
        println!("   Seed file: {}", seed.display());
    }
    println!("   Session cookie: {}", config.auth.session_cookie);
    println!(
        "   Login required: {}{}",
        config.auth.require_login,
        if config.auth.require_login {
            format!(" (redirect to {})", config.auth.login_path)
        } else {
            String::new()
        }
    );
    match config.proxy.timeout {
        Some(t) => println!("   Proxy timeout: {t:?}"),
        None => println!("   Proxy timeout: none"),
    }
    ExitCode::SUCCESS
}

/// Run the server
async fn run_server(config: Config) -> ExitCode {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        store = config.store.backend.as_str(),
        "Starting API Workbench"
    );

    let gateway = match Gateway::new(config) {
        Ok(g) => g,
        Err(e) => {
            error!("Failed to create gateway: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = gateway.run().await {
        error!("Gateway error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Shutdown complete");
    ExitCode::SUCCESS
}
