use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::{
    dns::{Changes, DomainFilterWire, Endpoint},
    error::{ProviderError, Result},
    filter::DomainFilter,
    handlers::WEBHOOK_CT,
    provider::Provider,
};

/// A provider running in another process, reached over the webhook protocol.
pub struct WebhookProvider {
    http: Client,
    base: String,
    domain_filter: DomainFilter,
}

impl WebhookProvider {
    /// Connect to `url` (including any path prefix) and negotiate the domain
    /// filter once.
    pub async fn new(url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::transport("building reqwest client", e))?;

        let mut provider = Self {
            http,
            base: url.trim_end_matches('/').to_string(),
            domain_filter: DomainFilter::default(),
        };
        provider.domain_filter = provider.negotiate().await?;
        info!(
            "webhook {} serves {:?}",
            provider.base,
            provider.domain_filter.filters()
        );
        Ok(provider)
    }

    /// Ask the remote provider again which domains it serves.
    pub async fn negotiate(&self) -> Result<DomainFilter> {
        let req = self.http.get(format!("{}/", self.base));
        let wire: DomainFilterWire = self.call_json("GET /", req).await?;
        Ok(wire.into())
    }

    fn with_headers(req: RequestBuilder) -> RequestBuilder {
        req.header(header::ACCEPT, WEBHOOK_CT)
    }

    async fn call(&self, operation: &str, req: RequestBuilder) -> Result<reqwest::Response> {
        let resp = Self::with_headers(req)
            .send()
            .await
            .map_err(|e| ProviderError::transport(operation, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("webhook {operation} [{status}]: {body}");
            return Err(ProviderError::Api {
                operation: operation.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        req: RequestBuilder,
    ) -> Result<T> {
        self.call(operation, req)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::transport(operation, e))
    }

    fn post_json<T: serde::Serialize>(&self, path: &str, body: &T) -> Result<RequestBuilder> {
        let bytes = serde_json::to_vec(body).map_err(|source| ProviderError::Json {
            operation: format!("POST {path}"),
            source,
        })?;
        Ok(self
            .http
            .post(format!("{}{path}", self.base))
            .header(header::CONTENT_TYPE, WEBHOOK_CT)
            .body(bytes))
    }
}

#[async_trait]
impl Provider for WebhookProvider {
    async fn records(&self) -> Result<Vec<Endpoint>> {
        let req = self.http.get(format!("{}/records", self.base));
        self.call_json("GET /records", req).await
    }

    async fn apply_changes(&self, changes: Changes) -> Result<()> {
        let req = self.post_json("/records", &changes)?;
        let resp = self.call("POST /records", req).await?;
        if resp.status() != StatusCode::NO_CONTENT {
            debug!("POST /records answered {} instead of 204", resp.status());
        }
        Ok(())
    }

    async fn adjust_endpoints(&self, endpoints: Vec<Endpoint>) -> Result<Vec<Endpoint>> {
        let req = self.post_json("/adjustendpoints", &endpoints)?;
        self.call_json("POST /adjustendpoints", req).await
    }

    async fn domain_filter(&self) -> DomainFilter {
        self.domain_filter.clone()
    }
}
