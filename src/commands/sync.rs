//! Sync command

use std::net::Ipv4Addr;

use colored::Colorize;

use crate::arm::ArmClient;
use crate::auth::{Credentials, SessionManager};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::ip::PublicIpResolver;
use crate::output::OutputFormat;
use crate::sync::{self, SyncRequest};

/// Merged CLI/env/config parameters for one sync run
pub struct SyncParams {
    pub tenant_id: Option<String>,
    pub subscription_id: Option<String>,
    pub resource_group: Option<String>,
    pub rule_name: Option<String>,
    pub ip: Option<Ipv4Addr>,
}

pub async fn handle(params: SyncParams, config: &Config, format: OutputFormat) -> Result<()> {
    let tenant_id = required(params.tenant_id, "tenant id (--tenant-id, AZFWSYNC_TENANT_ID, or config)")?;
    let subscription_id = required(
        params.subscription_id,
        "subscription id (--subscription-id, AZFWSYNC_SUBSCRIPTION_ID, or config)",
    )?;
    let resource_group = required(
        params.resource_group,
        "resource group (--resource-group, AZFWSYNC_RESOURCE_GROUP, or config)",
    )?;

    let credentials = Credentials::resolve(config)?;
    let mut sessions = SessionManager::new(credentials);
    let session = sessions.ensure(&tenant_id, &subscription_id).await?;

    let backend = ArmClient::new(session.subscription_id(), session.token());
    let resolver = PublicIpResolver::new();

    let report = sync::run(
        &backend,
        &resolver,
        SyncRequest {
            resource_group: resource_group.clone(),
            rule_name: params.rule_name,
            client_ip: params.ip,
        },
    )
    .await?;

    if report.rules.is_empty() {
        println!(
            "No Synapse workspaces or SQL servers found in resource group {}",
            resource_group
        );
        return Ok(());
    }

    format.print(&report.rules);
    println!(
        "{} rule(s) {}, {} rule(s) {}",
        report.created(),
        "created".green(),
        report.updated(),
        "updated".yellow(),
    );
    Ok(())
}

fn required(value: Option<String>, what: &str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::Config(format!("missing {}", what)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_rejects_missing_and_blank_values() {
        assert!(required(None, "tenant id").is_err());
        assert!(required(Some("   ".into()), "tenant id").is_err());
        assert_eq!(required(Some("t".into()), "tenant id").unwrap(), "t");
    }
}
