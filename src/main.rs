// FHIR Datastore - Versioned FHIR resource persistence on Azure Cosmos DB
// Copyright (c) 2025 FHIR Datastore Contributors
// Licensed under the MIT License

use clap::Parser;
use fhir_datastore::cli::commands::session::EXIT_FATAL;
use fhir_datastore::cli::{Cli, Commands};
use fhir_datastore::config::LoggingConfig;
use fhir_datastore::domain::Cancellation;
use fhir_datastore::logging::init_logging;
use std::process;
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Console-only logging for the CLI
    let log_level = cli.log_level.as_deref().unwrap_or("info");
    if let Err(e) = init_logging(log_level, &LoggingConfig::console_only()) {
        eprintln!("Failed to initialize logging: {e}");
        process::exit(EXIT_FATAL);
    }

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "fhir-datastore");

    // In-flight store operations observe this as cancellation
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {
                            tracing::info!("Received SIGINT (Ctrl+C), cancelling");
                        }
                        _ = sigterm.recv() => {
                            tracing::info!("Received SIGTERM, cancelling");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to create SIGTERM handler");
                    if tokio::signal::ctrl_c().await.is_err() {
                        return;
                    }
                    tracing::info!("Received SIGINT (Ctrl+C), cancelling");
                }
            }
            let _ = shutdown_tx.send(true);
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            } else {
                tracing::info!("Received SIGINT (Ctrl+C), cancelling");
                let _ = shutdown_tx.send(true);
            }
        }
    });

    let exit_code = match execute_command(&cli, Cancellation::new(shutdown_rx)).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command execution failed");
            eprintln!("Error: {e}");
            EXIT_FATAL
        }
    };

    process::exit(exit_code);
}

/// Execute the CLI command
async fn execute_command(cli: &Cli, cancel: Cancellation) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::Init(args) => args.execute().await,
        Commands::ValidateConfig(args) => args.execute(&cli.config).await,
        Commands::Provision(args) => args.execute(&cli.config).await,
        Commands::Read(args) => args.execute(&cli.config, cancel).await,
        Commands::Upsert(args) => args.execute(&cli.config, cancel).await,
        Commands::Delete(args) => args.execute(&cli.config, cancel).await,
        Commands::HardDelete(args) => args.execute(&cli.config, cancel).await,
        Commands::Capabilities(args) => args.execute(&cli.config).await,
    }
}
