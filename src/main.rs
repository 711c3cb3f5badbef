//! auth-mux - authentication translation gateway

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use auth_mux::{
    cli::{Cli, Command},
    config::Config,
    gateway::{Gateway, RouteSummary, build_routes},
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup tracing
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
        Some(Command::Check) => run_check(&config),
        Some(Command::Serve) | None => run_server(config).await,
    }
}

fn load_config(cli: &Cli) -> auth_mux::Result<Config> {
    let mut config = Config::load(Some(&cli.config))?;

    // Apply CLI overrides
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(ref host) = cli.host {
        config.address.clone_from(host);
    }
    Ok(config)
}

/// Resolve every declaration and print the route table
fn run_check(config: &Config) -> ExitCode {
    let routes = match build_routes(&config.inputs, &config.outputs) {
        Ok(routes) => routes,
        Err(e) => {
            error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let table: Vec<RouteSummary> = routes.iter().map(|r| r.summary()).collect();
    match serde_yaml::to_string(&table) {
        Ok(yaml) => {
            print!("{yaml}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to serialize route table: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Run the gateway server
async fn run_server(config: Config) -> ExitCode {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        address = %config.address,
        port = config.port,
        inputs = config.inputs.len(),
        outputs = config.outputs.len(),
        "Starting auth-mux"
    );

    let gateway = match Gateway::new(config) {
        Ok(g) => g,
        Err(e) => {
            error!("Failed to create gateway: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Run with graceful shutdown
    if let Err(e) = gateway.run().await {
        error!("Gateway error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Gateway shutdown complete");
    ExitCode::SUCCESS
}
