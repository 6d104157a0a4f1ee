//! Config commands

use crate::config::Config;
use crate::error::{Error, Result};
use crate::ConfigCommands;

pub async fn handle(action: ConfigCommands, profile: Option<&str>) -> Result<()> {
    match action {
        ConfigCommands::Init => {
            let config = Config::default();
            config.save(profile)?;
            println!("Configuration initialized at ~/.azfwsync/config.toml");
        }
        ConfigCommands::Set { key, value } => {
            let mut config = Config::load(profile).unwrap_or_default();
            match key.as_str() {
                "tenant_id" => config.tenant_id = Some(value),
                "subscription_id" => config.subscription_id = Some(value),
                "resource_group" => config.resource_group = Some(value),
                "client_id" => config.client_id = Some(value),
                "client_secret" => config.client_secret = Some(value),
                _ => return Err(Error::Config(format!("Unknown config key: {}", key))),
            }
            config.save(profile)?;
            println!("Set {} successfully", key);
        }
        ConfigCommands::Get { key } => {
            let config = Config::load(profile).unwrap_or_default();
            let value = match key.as_str() {
                "tenant_id" => config.tenant_id,
                "subscription_id" => config.subscription_id,
                "resource_group" => config.resource_group,
                "client_id" => config.client_id,
                "client_secret" => config.client_secret.map(mask),
                _ => return Err(Error::Config(format!("Unknown config key: {}", key))),
            };
            println!("{}: {}", key, value.unwrap_or_else(|| "(not set)".into()));
        }
        ConfigCommands::List => {
            let config = Config::load(profile).unwrap_or_default();
            let display = |v: Option<String>| v.unwrap_or_else(|| "(not set)".into());
            println!("tenant_id: {}", display(config.tenant_id));
            println!("subscription_id: {}", display(config.subscription_id));
            println!("resource_group: {}", display(config.resource_group));
            println!("client_id: {}", display(config.client_id));
            println!("client_secret: {}", display(config.client_secret.map(mask)));
        }
    }
    Ok(())
}

fn mask(secret: String) -> String {
    format!("{}****", &secret[..4.min(secret.len())])
}
