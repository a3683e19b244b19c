use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::info;

use crate::{
    apply::ApplyExecutor,
    backend::DnsBackend,
    codec::RecordCodec,
    dns::{Changes, Endpoint},
    error::Result,
    filter::{DomainFilter, ZoneIdFilter, ZoneTypeFilter},
    router::build_change,
    zones::{ZoneCatalog, ZoneDomains},
};

// ─────────────────────────────────────────────────────────────────────────────
// Provider contract
// ─────────────────────────────────────────────────────────────────────────────

/// What the controller needs from a DNS provider, whether it runs in-process
/// or behind the webhook protocol.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn records(&self) -> Result<Vec<Endpoint>>;

    async fn apply_changes(&self, changes: Changes) -> Result<()>;

    async fn adjust_endpoints(&self, endpoints: Vec<Endpoint>) -> Result<Vec<Endpoint>> {
        Ok(endpoints)
    }

    /// The domains this instance is responsible for.
    async fn domain_filter(&self) -> DomainFilter;
}

// ─────────────────────────────────────────────────────────────────────────────
// Cloud DNS provider
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub domain_filter: DomainFilter,
    pub zone_id_filter: ZoneIdFilter,
    pub zone_type_filter: ZoneTypeFilter,
    /// Maximum record sets per transaction; 0 disables splitting.
    pub batch_size: usize,
    pub batch_interval: Duration,
    pub dry_run: bool,
    /// Explicit zone → domain mapping, for callers that may not list zones.
    pub zones: Option<ZoneDomains>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            domain_filter: DomainFilter::default(),
            zone_id_filter: ZoneIdFilter::default(),
            zone_type_filter: ZoneTypeFilter::default(),
            batch_size: 1000,
            batch_interval: Duration::from_secs(1),
            dry_run: false,
            zones: None,
        }
    }
}

/// Zone-partitioned provider on top of any [`DnsBackend`].
pub struct CloudDnsProvider {
    backend: Arc<dyn DnsBackend>,
    catalog: ZoneCatalog,
    codec: RecordCodec,
    executor: ApplyExecutor,
    domain_filter: DomainFilter,
}

impl CloudDnsProvider {
    /// Build the provider. Without a zone override the zones are listed once
    /// up front, so a backend we can't read fails here rather than later.
    pub async fn new(backend: Arc<dyn DnsBackend>, settings: ProviderSettings) -> Result<Self> {
        let mut catalog = ZoneCatalog::new(
            Arc::clone(&backend),
            settings.domain_filter.clone(),
            settings.zone_id_filter,
            settings.zone_type_filter,
        );
        if let Some(zones) = settings.zones {
            catalog = catalog.with_overrides(zones);
        }

        if !catalog.has_overrides() {
            for zone in catalog.list_zones().await?.values() {
                info!(
                    name = %zone.name,
                    dns = %zone.dns_name,
                    visibility = %zone.visibility,
                    "Zone"
                );
            }
        }

        let executor = ApplyExecutor::new(
            Arc::clone(&backend),
            settings.batch_size,
            settings.batch_interval,
            settings.dry_run,
        );

        Ok(Self {
            backend,
            catalog,
            codec: RecordCodec::default(),
            executor,
            domain_filter: settings.domain_filter,
        })
    }

    pub fn catalog(&self) -> &ZoneCatalog {
        &self.catalog
    }
}

#[async_trait]
impl Provider for CloudDnsProvider {
    async fn records(&self) -> Result<Vec<Endpoint>> {
        let zones = self.catalog.resolve_domains().await?;
        let mut rrsets = Vec::new();

        for zone in zones.keys() {
            let mut page_token: Option<String> = None;
            loop {
                let page = self
                    .backend
                    .list_record_sets(zone, page_token.as_deref())
                    .await?;
                rrsets.extend(page.rrsets);
                match page.next_page_token {
                    Some(token) if !token.is_empty() => page_token = Some(token),
                    _ => break,
                }
            }
        }

        Ok(self.codec.decode(rrsets))
    }

    async fn apply_changes(&self, changes: Changes) -> Result<()> {
        let change = build_change(&changes, &self.domain_filter, &self.codec);
        self.executor.submit(&self.catalog, change).await
    }

    /// Derived from the resolved zones, which already passed the configured
    /// filter; configured exclusions are carried along.
    async fn domain_filter(&self) -> DomainFilter {
        let derived = self.catalog.domain_filter().await;
        DomainFilter::with_exclusions(derived.filters(), self.domain_filter.exclusions())
    }
}
