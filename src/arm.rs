//! Azure Resource Manager client
//!
//! Thin reqwest wrapper over the two resource providers this tool touches:
//! `Microsoft.Synapse/workspaces` and `Microsoft.Sql/servers`. Firewall rules
//! are written with a single PUT per rule (ARM create-or-update semantics),
//! so the same call covers both the create and the overwrite path.

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::sync::FirewallBackend;

/// Default ARM endpoint
pub const DEFAULT_BASE_URL: &str = "https://management.azure.com";

const SYNAPSE_API_VERSION: &str = "2021-06-01";
const SQL_API_VERSION: &str = "2021-11-01";

/// A named firewall rule as returned by ARM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallRule {
    pub name: String,
    pub properties: FirewallRuleProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallRuleProperties {
    pub start_ip_address: Ipv4Addr,
    pub end_ip_address: Ipv4Addr,
}

/// ARM list envelope
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct ListResult<T> {
    #[serde(default)]
    value: Vec<T>,
    #[serde(rename = "nextLink")]
    next_link: Option<String>,
}

/// The subset of a tracked resource we care about
#[derive(Debug, Deserialize)]
struct TrackedResource {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ArmErrorEnvelope {
    error: ArmErrorBody,
}

#[derive(Debug, Deserialize)]
struct ArmErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

pub struct ArmClient {
    base_url: String,
    subscription_id: String,
    token: String,
    http: reqwest::Client,
}

impl ArmClient {
    pub fn new(subscription_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            subscription_id: subscription_id.into(),
            token: token.into(),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Override the ARM endpoint URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn resource_url(&self, resource_group: &str, suffix: &str, api_version: &str) -> Result<Url> {
        Ok(Url::parse(&format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/{}?api-version={}",
            self.base_url, self.subscription_id, resource_group, suffix, api_version
        ))?)
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let (code, message) = match serde_json::from_slice::<ArmErrorEnvelope>(&body) {
                Ok(envelope) => (envelope.error.code, envelope.error.message),
                Err(_) => (
                    "unknown".to_string(),
                    String::from_utf8_lossy(&body).to_string(),
                ),
            };
            return Err(Error::Api {
                status: status.as_u16(),
                code,
                message,
            });
        }

        Ok(serde_json::from_slice(&body)?)
    }

    /// GET a paged collection, following nextLink until exhausted
    async fn list_all<T: DeserializeOwned>(&self, first: Url) -> Result<Vec<T>> {
        let mut url = first;
        let mut items = Vec::new();
        loop {
            let page: ListResult<T> = self.send(self.http.get(url)).await?;
            items.extend(page.value);
            match page.next_link {
                Some(next) => url = Url::parse(&next)?,
                None => break,
            }
        }
        Ok(items)
    }

    async fn list_resources(
        &self,
        resource_group: &str,
        suffix: &str,
        api_version: &str,
    ) -> Result<Vec<String>> {
        let url = self.resource_url(resource_group, suffix, api_version)?;
        let resources: Vec<TrackedResource> = self.list_all(url).await?;
        Ok(resources.into_iter().map(|r| r.name).collect())
    }

    async fn list_rules(
        &self,
        resource_group: &str,
        suffix: &str,
        api_version: &str,
    ) -> Result<Vec<FirewallRule>> {
        let url = self.resource_url(resource_group, suffix, api_version)?;
        self.list_all(url).await
    }

    async fn put_rule(
        &self,
        resource_group: &str,
        suffix: &str,
        api_version: &str,
        ip: Ipv4Addr,
    ) -> Result<FirewallRule> {
        let url = self.resource_url(resource_group, suffix, api_version)?;
        let properties = FirewallRuleProperties {
            start_ip_address: ip,
            end_ip_address: ip,
        };
        let body = serde_json::json!({ "properties": properties });
        self.send(self.http.put(url).json(&body)).await
    }
}

#[async_trait]
impl FirewallBackend for ArmClient {
    async fn list_workspaces(&self, resource_group: &str) -> Result<Vec<String>> {
        tracing::debug!(%resource_group, "listing Synapse workspaces");
        self.list_resources(
            resource_group,
            "Microsoft.Synapse/workspaces",
            SYNAPSE_API_VERSION,
        )
        .await
    }

    async fn list_workspace_rules(
        &self,
        resource_group: &str,
        workspace: &str,
    ) -> Result<Vec<FirewallRule>> {
        tracing::debug!(%workspace, "listing workspace firewall rules");
        self.list_rules(
            resource_group,
            &format!("Microsoft.Synapse/workspaces/{}/firewallRules", workspace),
            SYNAPSE_API_VERSION,
        )
        .await
    }

    async fn put_workspace_rule(
        &self,
        resource_group: &str,
        workspace: &str,
        rule: &str,
        ip: Ipv4Addr,
    ) -> Result<FirewallRule> {
        tracing::debug!(%workspace, %rule, %ip, "writing workspace firewall rule");
        self.put_rule(
            resource_group,
            &format!(
                "Microsoft.Synapse/workspaces/{}/firewallRules/{}",
                workspace, rule
            ),
            SYNAPSE_API_VERSION,
            ip,
        )
        .await
    }

    async fn list_sql_servers(&self, resource_group: &str) -> Result<Vec<String>> {
        tracing::debug!(%resource_group, "listing SQL servers");
        self.list_resources(resource_group, "Microsoft.Sql/servers", SQL_API_VERSION)
            .await
    }

    async fn list_sql_server_rules(
        &self,
        resource_group: &str,
        server: &str,
    ) -> Result<Vec<FirewallRule>> {
        tracing::debug!(%server, "listing SQL server firewall rules");
        self.list_rules(
            resource_group,
            &format!("Microsoft.Sql/servers/{}/firewallRules", server),
            SQL_API_VERSION,
        )
        .await
    }

    async fn put_sql_server_rule(
        &self,
        resource_group: &str,
        server: &str,
        rule: &str,
        ip: Ipv4Addr,
    ) -> Result<FirewallRule> {
        tracing::debug!(%server, %rule, %ip, "writing SQL server firewall rule");
        self.put_rule(
            resource_group,
            &format!("Microsoft.Sql/servers/{}/firewallRules/{}", server, rule),
            SQL_API_VERSION,
            ip,
        )
        .await
    }
}
