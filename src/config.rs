//! CLI Configuration

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    pub tenant_id: Option<String>,
    pub subscription_id: Option<String>,
    pub resource_group: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl Config {
    pub fn load(profile: Option<&str>) -> Result<Self> {
        let path = Self::config_path(profile)?;
        if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| Error::Config(e.to_string()))?;
            toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, profile: Option<&str>) -> Result<()> {
        let path = Self::config_path(profile)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::Config(e.to_string()))?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(&path, content).map_err(|e| Error::Config(e.to_string()))
    }

    fn config_path(profile: Option<&str>) -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| Error::Config("Cannot find home directory".into()))?;
        let filename = match profile {
            Some(p) => format!("config.{}.toml", p),
            None => "config.toml".to_string(),
        };
        Ok(home.join(".azfwsync").join(filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config: Config = toml::from_str(
            r#"
            tenant_id = "11111111-1111-1111-1111-111111111111"
            subscription_id = "22222222-2222-2222-2222-222222222222"
            resource_group = "data-platform"
            client_id = "app-id"
            client_secret = "hunter2"
            "#,
        )
        .unwrap();

        assert_eq!(config.resource_group.as_deref(), Some("data-platform"));
        assert_eq!(config.client_secret.as_deref(), Some("hunter2"));
    }

    #[test]
    fn missing_keys_default_to_none() {
        let config: Config = toml::from_str("tenant_id = \"t\"").unwrap();
        assert_eq!(config.tenant_id.as_deref(), Some("t"));
        assert!(config.subscription_id.is_none());
        assert!(config.client_secret.is_none());
    }

    #[test]
    fn round_trips_through_toml() {
        let config = Config {
            tenant_id: Some("t".into()),
            subscription_id: Some("s".into()),
            resource_group: None,
            client_id: Some("c".into()),
            client_secret: None,
        };
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.tenant_id, config.tenant_id);
        assert_eq!(parsed.resource_group, None);
    }
}
