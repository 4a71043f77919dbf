//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// API Workbench - mock API responder and outbound request proxy
#[derive(Parser, Debug)]
#[command(name = "api-workbench")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "API_WORKBENCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "API_WORKBENCH_PORT")]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "API_WORKBENCH_HOST")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "API_WORKBENCH_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "API_WORKBENCH_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the server (default)
    Serve,

    /// Load and validate configuration, then print a summary
    CheckConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_server_mode() {
        let cli = Cli::try_parse_from(["api-workbench"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_overrides_and_subcommand() {
        let cli = Cli::try_parse_from([
            "api-workbench",
            "--port",
            "8080",
            "--host",
            "0.0.0.0",
            "check-config",
            "--config",
            "workbench.yaml",
        ])
        .unwrap();
        assert_eq!(cli.port, Some(8080));
        assert_eq!(cli.host.as_deref(), Some("0.0.0.0"));
        assert!(matches!(cli.command, Some(Command::CheckConfig)));
        assert_eq!(cli.config, Some(PathBuf::from("workbench.yaml")));
    }
}
