use std::time::Duration;

use serde::Deserialize;

use crate::{
    error::ProviderError,
    filter::{DomainFilter, ZoneIdFilter, ZoneTypeFilter},
    google::GoogleSettings,
    provider::ProviderSettings,
    zones::ZoneDomains,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Google,
    InMemory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Which backend serves the webhook: "google" or "inmemory"
    #[serde(default = "default_provider")]
    pub provider: BackendKind,

    /// Google project id; falls back to PROJECT_ID, GOOGLE_PROJECT_ID, metadata
    #[serde(default)]
    pub google_project: Option<String>,

    /// Comma-separated list of domains to manage; empty = manage all
    #[serde(default)]
    pub domain_filter: String,

    /// Comma-separated list of domains never to touch
    #[serde(default)]
    pub exclude_domains: String,

    /// Comma-separated zone id (or name) suffixes
    #[serde(default)]
    pub zone_id_filter: String,

    /// "public", "private" or empty for both
    #[serde(default)]
    pub google_zone_visibility: String,

    /// Max record sets per Cloud DNS change; 0 = no splitting
    #[serde(default = "default_batch_size")]
    pub google_batch_change_size: usize,

    /// Pause between two submitted changes
    #[serde(default = "default_batch_interval_ms")]
    pub google_batch_change_interval_ms: u64,

    /// Log changes without submitting them
    #[serde(default)]
    pub dry_run: bool,

    /// Explicit zone=domain pairs, comma-separated; skips zone listing
    #[serde(default)]
    pub zones: String,

    /// Domains served by the in-memory backend
    #[serde(default)]
    pub inmemory_zones: String,

    /// Path prefix for the webhook routes, e.g. "/gcp"
    #[serde(default)]
    pub webhook_prefix: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_api_url")]
    pub google_api_url: String,

    #[serde(default = "default_metadata_host")]
    pub gce_metadata_host: String,

    #[serde(default)]
    pub google_access_token: Option<String>,

    /// Per-request timeout towards the backend
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Deadline for one POST /records
    #[serde(default = "default_apply_timeout")]
    pub apply_timeout_secs: u64,
}

impl Config {
    /// Parse from environment variables (DOMAIN_FILTER, GOOGLE_PROJECT, …)
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(envy::from_env::<Config>()?)
    }

    pub fn domain_filter(&self) -> DomainFilter {
        DomainFilter::with_exclusions(
            split_list(&self.domain_filter),
            split_list(&self.exclude_domains),
        )
    }

    /// The explicit zone override, if one is configured.
    pub fn zone_overrides(&self) -> Result<Option<ZoneDomains>, ProviderError> {
        let pairs = split_list(&self.zones);
        if pairs.is_empty() {
            return Ok(None);
        }
        pairs
            .into_iter()
            .map(|pair| match pair.split_once('=') {
                Some((zone, domain)) if !zone.trim().is_empty() && !domain.trim().is_empty() => {
                    Ok((zone.trim().to_string(), domain.trim().to_string()))
                }
                _ => Err(ProviderError::Config(format!(
                    "ZONES entry '{pair}' is not of the form zone=domain"
                ))),
            })
            .collect::<Result<ZoneDomains, _>>()
            .map(Some)
    }

    pub fn provider_settings(&self) -> Result<ProviderSettings, ProviderError> {
        Ok(ProviderSettings {
            domain_filter: self.domain_filter(),
            zone_id_filter: ZoneIdFilter::new(split_list(&self.zone_id_filter)),
            zone_type_filter: ZoneTypeFilter::parse(&self.google_zone_visibility)?,
            batch_size: self.google_batch_change_size,
            batch_interval: Duration::from_millis(self.google_batch_change_interval_ms),
            dry_run: self.dry_run,
            zones: self.zone_overrides()?,
        })
    }

    pub fn google_settings(&self) -> GoogleSettings {
        GoogleSettings {
            api_url: self.google_api_url.clone(),
            metadata_host: self.gce_metadata_host.clone(),
            project: self.google_project.clone(),
            access_token: self.google_access_token.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn inmemory_zone_list(&self) -> Vec<String> {
        split_list(&self.inmemory_zones)
    }

    pub fn apply_timeout(&self) -> Duration {
        Duration::from_secs(self.apply_timeout_secs)
    }
}

/// Split a comma-separated setting, dropping blanks.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn default_provider()          -> BackendKind { BackendKind::Google }
fn default_batch_size()        -> usize  { 1000 }
fn default_batch_interval_ms() -> u64    { 1000 }
fn default_port()              -> u16    { 8888 }
fn default_api_url()           -> String { "https://dns.googleapis.com/dns/v1".into() }
fn default_metadata_host()     -> String { "metadata.google.internal".into() }
fn default_request_timeout()   -> u64    { 30 }
fn default_apply_timeout()     -> u64    { 300 }
