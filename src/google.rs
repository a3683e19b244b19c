use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize};
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, error, info};

use crate::{
    backend::{Change, DnsBackend, ManagedZonesPage, ResourceRecordSetsPage},
    error::{ProviderError, Result},
};

/// Refresh metadata tokens this long before they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

// ─────────────────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GoogleSettings {
    /// Cloud DNS REST base, e.g. https://dns.googleapis.com/dns/v1
    pub api_url: String,
    /// Metadata server host or URL.
    pub metadata_host: String,
    pub project: Option<String>,
    /// Static bearer token; the metadata server is asked otherwise.
    pub access_token: Option<String>,
    pub request_timeout: Duration,
}

// ─────────────────────────────────────────────────────────────────────────────
// Metadata server
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

/// Client for the instance metadata server (project id, service account token).
pub struct MetadataClient {
    http: Client,
    base: String,
    token: Mutex<Option<(String, Instant)>>,
}

impl MetadataClient {
    pub fn new(http: Client, host: &str) -> Self {
        let host = host.trim_end_matches('/');
        let base = if host.contains("://") {
            format!("{host}/computeMetadata/v1")
        } else {
            format!("http://{host}/computeMetadata/v1")
        };
        Self {
            http,
            base,
            token: Mutex::new(None),
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http
            .get(format!("{}/{path}", self.base))
            .header("Metadata-Flavor", "Google")
    }

    pub async fn project_id(&self) -> Result<String> {
        let resp = self
            .get("project/project-id")
            .send()
            .await
            .map_err(|e| ProviderError::transport("GET metadata project-id", e))?;
        let body = checked("GET metadata project-id", resp).await?;
        let project = body.trim().to_string();
        if project.is_empty() {
            return Err(ProviderError::ProjectDetection(
                "metadata server returned an empty project id".into(),
            ));
        }
        Ok(project)
    }

    /// Default service account token, cached until shortly before expiry.
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some((token, expires_at)) = cached.as_ref() {
            if Instant::now() < *expires_at {
                return Ok(token.clone());
            }
        }

        let resp = self
            .get("instance/service-accounts/default/token")
            .send()
            .await
            .map_err(|e| ProviderError::transport("GET metadata token", e))?;
        let body = checked("GET metadata token", resp).await?;
        let token: MetadataToken = parse("GET metadata token", &body)?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some((token.access_token.clone(), Instant::now() + lifetime));
        debug!("refreshed metadata access token (valid {}s)", lifetime.as_secs());
        Ok(token.access_token)
    }
}

/// Project id from, in order: explicit config, `PROJECT_ID`,
/// `GOOGLE_PROJECT_ID`, the metadata server.
pub async fn resolve_project<F>(
    explicit: Option<&str>,
    env: F,
    metadata: &MetadataClient,
) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(project) = explicit.map(str::trim).filter(|p| !p.is_empty()) {
        return Ok(project.to_string());
    }
    for var in ["PROJECT_ID", "GOOGLE_PROJECT_ID"] {
        if let Some(project) = env(var).filter(|p| !p.trim().is_empty()) {
            return Ok(project.trim().to_string());
        }
    }

    let project = metadata
        .project_id()
        .await
        .map_err(|e| ProviderError::ProjectDetection(e.to_string()))?;
    info!("Google project auto-detected: {project}");
    Ok(project)
}

// ─────────────────────────────────────────────────────────────────────────────
// Cloud DNS client
// ─────────────────────────────────────────────────────────────────────────────

enum Credentials {
    Static(String),
    Metadata,
}

pub struct GoogleCloudDns {
    http: Client,
    api_url: String,
    project: String,
    credentials: Credentials,
    metadata: MetadataClient,
}

impl GoogleCloudDns {
    /// Resolve the project and credentials source. Fails if no project id
    /// can be found anywhere.
    pub async fn connect(settings: GoogleSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| ProviderError::transport("building reqwest client", e))?;
        let metadata = MetadataClient::new(http.clone(), &settings.metadata_host);

        let project = resolve_project(
            settings.project.as_deref(),
            |var| std::env::var(var).ok(),
            &metadata,
        )
        .await?;

        let credentials = match settings.access_token.filter(|t| !t.is_empty()) {
            Some(token) => Credentials::Static(token),
            None => Credentials::Metadata,
        };

        Ok(Self {
            http,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            project,
            credentials,
            metadata,
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    fn zones_url(&self) -> String {
        format!("{}/projects/{}/managedZones", self.api_url, self.project)
    }

    async fn bearer(&self) -> Result<String> {
        match &self.credentials {
            Credentials::Static(token) => Ok(token.clone()),
            Credentials::Metadata => self.metadata.access_token().await,
        }
    }

    async fn send(&self, operation: &str, req: RequestBuilder) -> Result<String> {
        let resp = req
            .bearer_auth(self.bearer().await?)
            .send()
            .await
            .map_err(|e| ProviderError::transport(operation, e))?;
        checked(operation, resp).await
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        operation: &str,
        url: String,
        page_token: Option<&str>,
    ) -> Result<T> {
        let mut req = self.http.get(url);
        if let Some(token) = page_token {
            req = req.query(&[("pageToken", token)]);
        }
        parse(operation, &self.send(operation, req).await?)
    }
}

#[async_trait]
impl DnsBackend for GoogleCloudDns {
    async fn list_managed_zones(&self, page_token: Option<&str>) -> Result<ManagedZonesPage> {
        self.get_page("GET managedZones", self.zones_url(), page_token).await
    }

    async fn list_record_sets(
        &self,
        zone: &str,
        page_token: Option<&str>,
    ) -> Result<ResourceRecordSetsPage> {
        let url = format!("{}/{zone}/rrsets", self.zones_url());
        self.get_page("GET managedZones/:zone/rrsets", url, page_token).await
    }

    async fn create_change(&self, zone: &str, change: &Change) -> Result<()> {
        let url = format!("{}/{zone}/changes", self.zones_url());
        let req = self.http.post(url).json(change);
        if let Err(e) = self.send("POST managedZones/:zone/changes", req).await {
            error!("Cloud DNS change for {zone} failed: {e}");
            return Err(e);
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

async fn checked(operation: &str, resp: reqwest::Response) -> Result<String> {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(ProviderError::Api {
            operation: operation.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

fn parse<T: DeserializeOwned>(operation: &str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|source| ProviderError::Json {
        operation: operation.to_string(),
        source,
    })
}
