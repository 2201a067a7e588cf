use std::process::ExitCode;

use tracing::{error, info};

use parlor::{ChatServer, Config};

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            if let Err(e) = config.apply_env_overrides() {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
            config
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    // Initialize logging
    if let Err(e) = parlor::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        parlor::logging::init_console_only(&config.logging.level);
    }

    info!("Parlor chat server");

    let server = match ChatServer::bind(&config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to start server on {}:{}: {}", config.server.host, config.server.port, e);
            return ExitCode::FAILURE;
        }
    };
    let processor = server.processor();

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return ExitCode::FAILURE;
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    if let Ok(snapshot) = processor.snapshot().await {
        info!(
            "Final state: {} rooms, {} sessions",
            snapshot.rooms.len(),
            snapshot.sessions
        );
        for (kind, count) in &snapshot.commands_processed {
            info!("  {} processed {} times", kind, count);
        }
    }

    ExitCode::SUCCESS
}
