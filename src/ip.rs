//! External client IP discovery
//!
//! The lookup endpoint returns the caller's externally visible address as a
//! plain-text body. IPv4 only.

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Default lookup endpoint (plain-text IPv4 response)
pub const DEFAULT_LOOKUP_URL: &str = "https://api.ipify.org";

#[async_trait]
pub trait IpResolver: Send + Sync {
    async fn public_ipv4(&self) -> Result<Ipv4Addr>;
}

pub struct PublicIpResolver {
    endpoint: String,
    http: reqwest::Client,
}

impl PublicIpResolver {
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_LOOKUP_URL)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }
}

impl Default for PublicIpResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IpResolver for PublicIpResolver {
    async fn public_ipv4(&self) -> Result<Ipv4Addr> {
        tracing::debug!(endpoint = %self.endpoint, "looking up client IP");
        let response = self.http.get(&self.endpoint).send().await?;
        if !response.status().is_success() {
            return Err(Error::IpLookup(format!(
                "lookup endpoint returned {}",
                response.status()
            )));
        }
        let body = response.text().await?;
        let ip = body
            .trim()
            .parse()
            .map_err(|_| Error::IpLookup(format!("not an IPv4 address: {:?}", body.trim())))?;
        tracing::info!(%ip, "resolved client IP");
        Ok(ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn parses_plain_text_ipv4() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("203.0.113.7\n"))
            .expect(1)
            .mount(&server)
            .await;

        let resolver = PublicIpResolver::with_endpoint(server.uri());
        let ip = resolver.public_ipv4().await.unwrap();
        assert_eq!(ip, Ipv4Addr::new(203, 0, 113, 7));
    }

    #[tokio::test]
    async fn rejects_non_ipv4_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let resolver = PublicIpResolver::with_endpoint(server.uri());
        let err = resolver.public_ipv4().await.unwrap_err();
        assert!(matches!(err, Error::IpLookup(_)));
    }

    #[tokio::test]
    async fn surfaces_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let resolver = PublicIpResolver::with_endpoint(server.uri());
        let err = resolver.public_ipv4().await.unwrap_err();
        assert!(matches!(err, Error::IpLookup(_)));
    }
}
