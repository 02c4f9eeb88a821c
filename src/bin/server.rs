//! StratumDB server binary: loads configuration, starts the engine façade,
//! binds the TCP/UDP front end, and wires graceful shutdown (C9/C11).

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use stratumdb::config::Config;
use stratumdb::facade::EngineFacade;
use stratumdb::server::{tcp, udp};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::args().nth(1);
    let config = match Config::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let facade = match EngineFacade::start(&config.db_engine, &config.disk_store) {
        Ok(facade) => Arc::new(facade),
        Err(err) => {
            error!(%err, "failed to start engine");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        if let Err(err) = ctrlc::set_handler(move || {
            info!("shutdown signal received");
            shutdown.store(true, Ordering::Relaxed);
        }) {
            error!(%err, "failed to install signal handler");
            return ExitCode::FAILURE;
        }
    }

    let udp_handle = {
        let facade = Arc::clone(&facade);
        let shutdown = Arc::clone(&shutdown);
        let host = config.server.host.clone();
        let port = config.server.udp_port;
        let buffer_size = config.server.udp_buffer_size;
        std::thread::spawn(move || {
            if let Err(err) = udp::serve(facade, &host, port, buffer_size, shutdown) {
                error!(%err, "udp listener failed");
            }
        })
    };

    let tcp_result = tcp::serve(Arc::clone(&facade), &config.server.host, config.server.port, Arc::clone(&shutdown));

    shutdown.store(true, Ordering::Relaxed);
    let _ = udp_handle.join();

    if let Err(err) = facade.shutdown() {
        error!(%err, "error during shutdown");
        return ExitCode::FAILURE;
    }

    match tcp_result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "tcp listener failed");
            ExitCode::FAILURE
        }
    }
}
