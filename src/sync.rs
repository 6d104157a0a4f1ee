//! Firewall allow-list synchronization
//!
//! Ensures a single-address firewall rule exists on every Synapse workspace
//! and every SQL server in a resource group. Workspace rule names match
//! case-insensitively; SQL server rule names match exact-case and updates go
//! through the stored rule name. Processing is strictly sequential and
//! fail-fast: the first error aborts the run, rules already written stay.

use std::fmt;
use std::net::Ipv4Addr;

use async_trait::async_trait;
use serde::Serialize;
use tabled::Tabled;

use crate::arm::FirewallRule;
use crate::error::Result;
use crate::ip::IpResolver;

/// Enumeration and rule CRUD for the two resource types
#[async_trait]
pub trait FirewallBackend: Send + Sync {
    async fn list_workspaces(&self, resource_group: &str) -> Result<Vec<String>>;
    async fn list_workspace_rules(
        &self,
        resource_group: &str,
        workspace: &str,
    ) -> Result<Vec<FirewallRule>>;
    async fn put_workspace_rule(
        &self,
        resource_group: &str,
        workspace: &str,
        rule: &str,
        ip: Ipv4Addr,
    ) -> Result<FirewallRule>;

    async fn list_sql_servers(&self, resource_group: &str) -> Result<Vec<String>>;
    async fn list_sql_server_rules(
        &self,
        resource_group: &str,
        server: &str,
    ) -> Result<Vec<FirewallRule>>;
    async fn put_sql_server_rule(
        &self,
        resource_group: &str,
        server: &str,
        rule: &str,
        ip: Ipv4Addr,
    ) -> Result<FirewallRule>;
}

#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub resource_group: String,
    /// Defaults to the upper-cased local host name
    pub rule_name: Option<String>,
    /// Defaults to one external lookup, reused for every resource
    pub client_ip: Option<Ipv4Addr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Workspace,
    SqlServer,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Workspace => write!(f, "Synapse workspace"),
            ResourceKind::SqlServer => write!(f, "SQL server"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Created,
    Updated,
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleAction::Created => write!(f, "created"),
            RuleAction::Updated => write!(f, "updated"),
        }
    }
}

/// Per-resource outcome of a sync run
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct RuleOutcome {
    #[tabled(rename = "Resource type")]
    pub resource_type: ResourceKind,
    #[tabled(rename = "Resource")]
    pub resource: String,
    #[tabled(rename = "Rule")]
    pub rule: String,
    #[tabled(rename = "Start IP")]
    pub start_ip: Ipv4Addr,
    #[tabled(rename = "End IP")]
    pub end_ip: Ipv4Addr,
    #[tabled(rename = "Action")]
    pub action: RuleAction,
}

impl RuleOutcome {
    fn from_rule(resource_type: ResourceKind, resource: String, rule: FirewallRule, action: RuleAction) -> Self {
        Self {
            resource_type,
            resource,
            rule: rule.name,
            start_ip: rule.properties.start_ip_address,
            end_ip: rule.properties.end_ip_address,
            action,
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct SyncReport {
    pub rules: Vec<RuleOutcome>,
}

impl SyncReport {
    pub fn created(&self) -> usize {
        self.rules.iter().filter(|r| r.action == RuleAction::Created).count()
    }

    pub fn updated(&self) -> usize {
        self.rules.iter().filter(|r| r.action == RuleAction::Updated).count()
    }
}

/// Default firewall rule name: the local host name, upper-cased
pub fn default_rule_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
        .to_uppercase()
}

/// Run one synchronization pass over every workspace and SQL server in the
/// resource group. Sequential, no retries, no rollback.
pub async fn run<B, R>(backend: &B, resolver: &R, request: SyncRequest) -> Result<SyncReport>
where
    B: FirewallBackend,
    R: IpResolver,
{
    let ip = match request.client_ip {
        Some(ip) => ip,
        None => resolver.public_ipv4().await?,
    };
    let rule_name = request.rule_name.clone().unwrap_or_else(default_rule_name);
    let resource_group = request.resource_group.as_str();

    tracing::info!(%resource_group, rule = %rule_name, %ip, "starting firewall sync");
    let mut report = SyncReport::default();

    for workspace in backend.list_workspaces(resource_group).await? {
        let rules = backend.list_workspace_rules(resource_group, &workspace).await?;
        // the workspace API treats rule names case-insensitively
        let action = if rules.iter().any(|r| r.name.eq_ignore_ascii_case(&rule_name)) {
            RuleAction::Updated
        } else {
            RuleAction::Created
        };
        let written = backend
            .put_workspace_rule(resource_group, &workspace, &rule_name, ip)
            .await?;
        tracing::info!(%workspace, rule = %written.name, %action, "workspace rule written");
        report.rules.push(RuleOutcome::from_rule(
            ResourceKind::Workspace,
            workspace,
            written,
            action,
        ));
    }

    for server in backend.list_sql_servers(resource_group).await? {
        let rules = backend.list_sql_server_rules(resource_group, &server).await?;
        // exact-case match; an update must go through the stored name
        let (target, action) = match rules.iter().find(|r| r.name == rule_name) {
            Some(existing) => (existing.name.clone(), RuleAction::Updated),
            None => (rule_name.clone(), RuleAction::Created),
        };
        let written = backend
            .put_sql_server_rule(resource_group, &server, &target, ip)
            .await?;
        tracing::info!(%server, rule = %written.name, %action, "SQL server rule written");
        report.rules.push(RuleOutcome::from_rule(
            ResourceKind::SqlServer,
            server,
            written,
            action,
        ));
    }

    tracing::info!(
        created = report.created(),
        updated = report.updated(),
        "firewall sync finished"
    );
    Ok(report)
}
