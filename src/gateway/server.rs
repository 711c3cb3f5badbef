//! Gateway server

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::signal;
use tracing::{info, warn};

use super::router::{Route, create_router};
use crate::config::Config;
use crate::{Error, Result};

/// auth-mux gateway server
#[derive(Debug)]
pub struct Gateway {
    /// Configuration
    config: Config,
    /// Installed routes
    routes: Vec<Route>,
}

impl Gateway {
    /// Create a new gateway, resolving every adapter declaration.
    ///
    /// Issuer keys are not loaded here; they load on first use.
    pub fn new(config: Config) -> Result<Self> {
        let routes = super::router::build_routes(&config.inputs, &config.outputs)?;

        for route in &routes {
            info!(
                path = %route.path,
                input = %route.input_name,
                output = %route.output_name,
                "Added handler"
            );
        }
        if routes.is_empty() {
            warn!("No routes configured: declare at least one input and one output");
        }

        Ok(Self { config, routes })
    }

    /// Installed routes
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// The HTTP application serving every route
    #[must_use]
    pub fn router(&self) -> Router {
        create_router(&self.routes, &self.config)
    }

    /// Run the gateway until a shutdown signal arrives
    pub async fn run(self) -> Result<()> {
        let addr = self.config.bind_addr()?;
        let app = self.router();

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        let grace = self.config.shutdown_timeout;
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown_handle.graceful_shutdown(Some(grace));
        });

        info!("============================================================");
        info!("AUTH-MUX v{}", env!("CARGO_PKG_VERSION"));
        info!("============================================================");

        match self.config.tls()? {
            Some(tls) => {
                // Err only when a process-wide provider is already installed
                let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
                let rustls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                    .await
                    .map_err(|e| {
                        Error::Config(format!(
                            "Failed to load TLS files {} / {}: {e}",
                            tls.cert.display(),
                            tls.key.display()
                        ))
                    })?;

                info!(address = %addr, routes = self.routes.len(), "Listening (HTTPS)");
                axum_server::bind_rustls(addr, rustls_config)
                    .handle(handle)
                    .serve(app.into_make_service())
                    .await?;
            }
            None => {
                warn!("TLS disabled: cert and key are not set, serving plain HTTP");
                info!(address = %addr, routes = self.routes.len(), "Listening (HTTP)");
                axum_server::bind(addr)
                    .handle(handle)
                    .serve(app.into_make_service())
                    .await?;
            }
        }

        info!("Gateway stopped");
        Ok(())
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
