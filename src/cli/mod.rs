//! CLI interface and argument parsing

pub mod commands;

use clap::{Parser, Subcommand};

/// FHIR data store - versioned resource persistence on Azure Cosmos DB
#[derive(Parser, Debug)]
#[command(name = "fhir-datastore")]
#[command(version, about, long_about = None)]
#[command(author = "FHIR Datastore Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "fhir-datastore.toml",
        env = "FHIR_DATASTORE_CONFIG"
    )]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "FHIR_DATASTORE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new configuration file
    Init(commands::init::InitArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Create the database and collection and install stored procedures
    Provision(commands::provision::ProvisionArgs),

    /// Read the current or a specific version of a resource
    Read(commands::read::ReadArgs),

    /// Create or update a resource from a JSON file
    Upsert(commands::upsert::UpsertArgs),

    /// Mark a resource deleted, keeping its history
    Delete(commands::delete::DeleteArgs),

    /// Permanently remove every version of a resource
    HardDelete(commands::delete::HardDeleteArgs),

    /// Print the declared capabilities
    Capabilities(commands::capabilities::CapabilitiesArgs),
}
