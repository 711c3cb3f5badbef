//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Authentication translation gateway - validate credentials, answer in the caller's format
#[derive(Parser, Debug)]
#[command(name = "auth-mux")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(
        short,
        long,
        default_value = "config.yaml",
        env = "AUTH_MUX_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Port to listen on
    #[arg(short, long, env = "AUTH_MUX_PORT")]
    pub port: Option<u16>,

    /// Address to bind to
    #[arg(long, env = "AUTH_MUX_ADDRESS")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "AUTH_MUX_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "AUTH_MUX_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Start the gateway server (default)
    Serve,

    /// Resolve every adapter declaration and print the route table
    Check,
}
