// ABOUTME: Best-effort REST lookup of a node's reachable IP address
// A failed lookup never blocks the connect attempt, it only leaves the ip parameter empty

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Lookup returned no usable address")]
    MissingIp,
}

/// Resolver response: the address plus where the server got it from
/// (cluster config, DNS, guest agent).
#[derive(Debug, Clone, Deserialize)]
pub struct NodeIp {
    pub ip: String,
    #[serde(default)]
    pub source: Option<String>,
}

/// One-shot client for the node-ip collaborator endpoint.
pub struct IpResolver {
    client: reqwest::Client,
    api_base: String,
    ticket: String,
}

impl IpResolver {
    pub fn new(api_base: impl Into<String>, ticket: impl Into<String>, accept_invalid_certs: bool) -> Self {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            ticket: ticket.into(),
        }
    }

    /// `GET {api}/clusters/{cluster}/nodes/{node}/ip`
    pub async fn resolve(&self, cluster: &str, node: &str) -> Result<NodeIp, ResolveError> {
        let url = format!("{}/clusters/{cluster}/nodes/{node}/ip", self.api_base);
        debug!("resolving node ip via {}", url);
        let response = self
            .client
            .get(&url)
            .header("Cookie", format!("PegaProxTicket={}", self.ticket))
            .send()
            .await?
            .error_for_status()?;
        let resolved: NodeIp = response.json().await?;
        if resolved.ip.trim().is_empty() {
            return Err(ResolveError::MissingIp);
        }
        debug!(
            "resolved {} to {} (source: {:?})",
            node, resolved.ip, resolved.source
        );
        Ok(resolved)
    }
}
