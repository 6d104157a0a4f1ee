//! azfwsync
//!
//! Sync your client IP into the firewall allow-lists of every Synapse
//! workspace and SQL server in an Azure resource group.
//!
//! # Usage
//!
//! ```bash
//! azfwsync sync --resource-group data-platform
//! azfwsync sync -g data-platform --rule-name HOME-OFFICE --ip 203.0.113.7
//! azfwsync config set tenant_id 11111111-1111-1111-1111-111111111111
//! azfwsync sync -g data-platform --format json
//! ```

use std::net::Ipv4Addr;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod arm;
mod auth;
mod commands;
mod config;
mod error;
mod ip;
mod output;
mod sync;

#[derive(Parser)]
#[command(name = "azfwsync")]
#[command(version = "0.1.0")]
#[command(about = "Sync your client IP into Azure Synapse and SQL server firewall allow-lists", long_about = None)]
struct Cli {
    /// Azure AD tenant ID
    #[arg(long, env = "AZFWSYNC_TENANT_ID")]
    tenant_id: Option<String>,

    /// Azure subscription ID
    #[arg(long, env = "AZFWSYNC_SUBSCRIPTION_ID")]
    subscription_id: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    format: output::OutputFormat,

    /// Profile name from config file
    #[arg(long, short)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync the client IP into every workspace and SQL server firewall
    Sync {
        /// Resource group holding the workspaces and servers
        #[arg(long, short = 'g', env = "AZFWSYNC_RESOURCE_GROUP")]
        resource_group: Option<String>,

        /// Firewall rule name (defaults to the upper-cased host name)
        #[arg(long)]
        rule_name: Option<String>,

        /// Client IPv4 address (defaults to an external lookup)
        #[arg(long)]
        ip: Option<Ipv4Addr>,
    },
    /// Configure CLI
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Set configuration value
    Set { key: String, value: String },
    /// Get configuration value
    Get { key: String },
    /// List all configuration
    List,
    /// Initialize configuration
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "azfwsync=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = config::Config::load(cli.profile.as_deref()).unwrap_or_default();

    let result = match cli.command {
        Commands::Sync {
            resource_group,
            rule_name,
            ip,
        } => {
            let params = commands::sync::SyncParams {
                tenant_id: cli.tenant_id.or_else(|| config.tenant_id.clone()),
                subscription_id: cli.subscription_id.or_else(|| config.subscription_id.clone()),
                resource_group: resource_group.or_else(|| config.resource_group.clone()),
                rule_name,
                ip,
            };
            commands::sync::handle(params, &config, cli.format).await
        }
        Commands::Config { action } => commands::config::handle(action, cli.profile.as_deref()).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
