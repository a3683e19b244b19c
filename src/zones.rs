use std::{collections::BTreeMap, sync::Arc, time::Duration};

use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, warn};

use crate::{
    backend::{DnsBackend, ManagedZone},
    error::Result,
    filter::{DomainFilter, ZoneIdFilter, ZoneTypeFilter},
};

/// How long a listed zone-to-domain mapping is trusted before re-listing.
pub const ZONE_CACHE_TTL: Duration = Duration::from_secs(30);

/// Zones auto-created for GKE clusters; never ours to manage.
const RESERVED_ZONE_PREFIX: &str = "gke-";

pub type ZoneDomains = BTreeMap<String, String>;

struct Snapshot {
    domains: Arc<ZoneDomains>,
    fetched_at: Instant,
}

/// Which zones exist and which domain each covers, subject to filters.
pub struct ZoneCatalog {
    backend: Arc<dyn DnsBackend>,
    domain_filter: DomainFilter,
    zone_id_filter: ZoneIdFilter,
    zone_type_filter: ZoneTypeFilter,
    /// Operator-supplied mapping; when set the backend is never listed.
    overrides: Option<Arc<ZoneDomains>>,
    /// Held across the refresh so only one caller re-lists at a time.
    cache: Mutex<Option<Snapshot>>,
}

impl ZoneCatalog {
    pub fn new(
        backend: Arc<dyn DnsBackend>,
        domain_filter: DomainFilter,
        zone_id_filter: ZoneIdFilter,
        zone_type_filter: ZoneTypeFilter,
    ) -> Self {
        Self {
            backend,
            domain_filter,
            zone_id_filter,
            zone_type_filter,
            overrides: None,
            cache: Mutex::new(None),
        }
    }

    pub fn with_overrides(mut self, zones: ZoneDomains) -> Self {
        self.overrides = Some(Arc::new(zones));
        self
    }

    pub fn has_overrides(&self) -> bool {
        self.overrides.is_some()
    }

    // ── listing ──────────────────────────────────────────────────────────────

    /// Page through every managed zone and keep the ones we may manage.
    pub async fn list_zones(&self) -> Result<BTreeMap<String, ManagedZone>> {
        let mut zones = BTreeMap::new();
        let mut page_token: Option<String> = None;

        debug!("Matching zones against domain filter: {:?}", self.domain_filter);

        loop {
            let page = self
                .backend
                .list_managed_zones(page_token.as_deref())
                .await?;

            for zone in page.managed_zones {
                if zone.peering_config.is_some() || zone.forwarding_config.is_some() {
                    debug!(
                        "Filtered peering/forwarding zone {} (zone: {}) (visibility: {})",
                        zone.dns_name, zone.name, zone.visibility
                    );
                    continue;
                }
                if zone.name.starts_with(RESERVED_ZONE_PREFIX) {
                    debug!(
                        "Filtered gke zone {} (zone: {}) (visibility: {})",
                        zone.dns_name, zone.name, zone.visibility
                    );
                    continue;
                }
                if self.accepts(&zone) {
                    debug!(
                        "Matched {} (zone: {}) (visibility: {})",
                        zone.dns_name, zone.name, zone.visibility
                    );
                    zones.insert(zone.name.clone(), zone);
                } else {
                    debug!(
                        "Filtered {} (zone: {}) (visibility: {})",
                        zone.dns_name, zone.name, zone.visibility
                    );
                }
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        if zones.is_empty() {
            warn!(
                "No zones match domain filter {:?}",
                self.domain_filter.filters()
            );
        }

        Ok(zones)
    }

    fn accepts(&self, zone: &ManagedZone) -> bool {
        self.domain_filter.matches(&zone.dns_name)
            && self.zone_type_filter.matches(zone.visibility)
            && (self.zone_id_filter.matches(&zone.id) || self.zone_id_filter.matches(&zone.name))
    }

    // ── zone → domain ────────────────────────────────────────────────────────

    /// Zone name to domain suffix, from the override or a cached listing.
    pub async fn resolve_domains(&self) -> Result<Arc<ZoneDomains>> {
        if let Some(overrides) = &self.overrides {
            return Ok(Arc::clone(overrides));
        }

        let mut cache = self.cache.lock().await;
        if let Some(snapshot) = cache.as_ref() {
            if snapshot.fetched_at.elapsed() < ZONE_CACHE_TTL {
                return Ok(Arc::clone(&snapshot.domains));
            }
        }

        let domains: ZoneDomains = self
            .list_zones()
            .await?
            .into_values()
            .map(|zone| (zone.name, zone.dns_name))
            .collect();
        let domains = Arc::new(domains);

        *cache = Some(Snapshot {
            domains: Arc::clone(&domains),
            fetched_at: Instant::now(),
        });

        Ok(domains)
    }

    /// A filter matching exactly the resolved domains; empty if resolution
    /// fails, since callers only use it as a hint.
    pub async fn domain_filter(&self) -> DomainFilter {
        match self.resolve_domains().await {
            Ok(domains) => DomainFilter::new(domains.values()),
            Err(e) => {
                warn!("could not resolve zones for domain filter: {e}");
                DomainFilter::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{
        backend::{Change, ManagedZonesPage, ResourceRecordSetsPage},
        error::ProviderError,
        filter::ZoneVisibility,
        inmemory::InMemoryDns,
    };

    fn zone(name: &str, dns_name: &str, visibility: ZoneVisibility) -> ManagedZone {
        ManagedZone {
            name: name.into(),
            dns_name: dns_name.into(),
            id: format!("{}00", name.len()),
            visibility,
            ..Default::default()
        }
    }

    fn backend() -> Arc<InMemoryDns> {
        let mut peered = zone("peered", "peer.example.com.", ZoneVisibility::Private);
        peered.peering_config = Some(serde_json::json!({"targetNetwork": {}}));

        Arc::new(
            InMemoryDns::new(vec![
                zone("public-a", "a.example.com.", ZoneVisibility::Public),
                zone("private-b", "b.example.com.", ZoneVisibility::Private),
                zone("gke-cluster-1234-dns", "cluster.local.", ZoneVisibility::Private),
                zone("other", "example.org.", ZoneVisibility::Public),
                peered,
            ])
            .with_page_size(2),
        )
    }

    fn unfiltered(backend: Arc<dyn DnsBackend>) -> ZoneCatalog {
        ZoneCatalog::new(
            backend,
            DomainFilter::default(),
            ZoneIdFilter::default(),
            ZoneTypeFilter::default(),
        )
    }

    fn by_domain(backend: Arc<dyn DnsBackend>, domains: &[&str]) -> ZoneCatalog {
        ZoneCatalog::new(
            backend,
            DomainFilter::new(domains),
            ZoneIdFilter::default(),
            ZoneTypeFilter::default(),
        )
    }

    fn by_id(backend: Arc<dyn DnsBackend>, id: &str) -> ZoneCatalog {
        ZoneCatalog::new(
            backend,
            DomainFilter::default(),
            ZoneIdFilter::new([id]),
            ZoneTypeFilter::default(),
        )
    }

    /// Lists zones slowly so that concurrent callers overlap.
    struct Delayed(Arc<InMemoryDns>);

    #[async_trait]
    impl DnsBackend for Delayed {
        async fn list_managed_zones(&self, page_token: Option<&str>) -> Result<ManagedZonesPage> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.0.list_managed_zones(page_token).await
        }

        async fn list_record_sets(
            &self,
            zone: &str,
            page_token: Option<&str>,
        ) -> Result<ResourceRecordSetsPage> {
            self.0.list_record_sets(zone, page_token).await
        }

        async fn create_change(&self, zone: &str, change: &Change) -> Result<()> {
            self.0.create_change(zone, change).await
        }
    }

    struct Unreachable;

    #[async_trait]
    impl DnsBackend for Unreachable {
        async fn list_managed_zones(&self, _: Option<&str>) -> Result<ManagedZonesPage> {
            Err(ProviderError::Api {
                operation: "list managed zones".into(),
                status: 503,
                body: "backend unavailable".into(),
            })
        }

        async fn list_record_sets(
            &self,
            _: &str,
            _: Option<&str>,
        ) -> Result<ResourceRecordSetsPage> {
            Ok(ResourceRecordSetsPage::default())
        }

        async fn create_change(&self, _: &str, _: &Change) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn listing_skips_peering_and_reserved_zones_across_pages() {
        let zones = unfiltered(backend()).list_zones().await.unwrap();

        assert_eq!(
            zones.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["other", "private-b", "public-a"]
        );
    }

    #[tokio::test]
    async fn listing_applies_domain_visibility_and_id_filters() {
        let c = by_domain(backend(), &["example.com"]);
        assert_eq!(c.list_zones().await.unwrap().len(), 2);

        let by_visibility = ZoneCatalog::new(
            backend(),
            DomainFilter::default(),
            ZoneIdFilter::default(),
            ZoneTypeFilter::only(ZoneVisibility::Private),
        );
        let zones = by_visibility.list_zones().await.unwrap();
        assert_eq!(zones.keys().collect::<Vec<_>>(), vec!["private-b"]);

        // The filter may match either the numeric id or the zone name.
        let zones = by_id(backend(), "other").list_zones().await.unwrap();
        assert_eq!(zones.keys().collect::<Vec<_>>(), vec!["other"]);
        let zones = by_id(backend(), "800").list_zones().await.unwrap();
        assert_eq!(zones.keys().collect::<Vec<_>>(), vec!["public-a"]);
    }

    #[tokio::test]
    async fn no_match_is_an_empty_result_not_an_error() {
        let c = by_domain(backend(), &["example.net"]);
        assert!(c.list_zones().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn overrides_bypass_listing() {
        let backend = backend();
        let overrides: ZoneDomains =
            [("manual".to_string(), "manual.example.com.".to_string())].into();
        let c = unfiltered(backend.clone()).with_overrides(overrides.clone());

        assert_eq!(*c.resolve_domains().await.unwrap(), overrides);
        assert_eq!(backend.zone_list_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn resolved_domains_are_cached_until_expiry() {
        let backend = backend();
        let c = unfiltered(backend.clone());

        let first = c.resolve_domains().await.unwrap();
        assert_eq!(first.get("public-a").map(String::as_str), Some("a.example.com."));
        let listed_once = backend.zone_list_calls();

        tokio::time::advance(Duration::from_secs(10)).await;
        c.resolve_domains().await.unwrap();
        assert_eq!(backend.zone_list_calls(), listed_once);

        tokio::time::advance(ZONE_CACHE_TTL).await;
        c.resolve_domains().await.unwrap();
        assert!(backend.zone_list_calls() > listed_once);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_refresh() {
        let dns = backend();
        let c = Arc::new(unfiltered(Arc::new(Delayed(dns.clone()))));

        c.resolve_domains().await.unwrap();
        let one_pass = dns.zone_list_calls();
        tokio::time::advance(ZONE_CACHE_TTL).await;

        let callers: Vec<_> = (0..8)
            .map(|_| {
                let c = Arc::clone(&c);
                tokio::spawn(async move { c.resolve_domains().await })
            })
            .collect();
        for caller in callers {
            assert_eq!(caller.await.unwrap().unwrap().len(), 3);
        }

        assert_eq!(dns.zone_list_calls(), 2 * one_pass);
    }

    #[tokio::test]
    async fn derived_domain_filter_matches_resolved_zones() {
        let filter = by_domain(backend(), &["example.com"]).domain_filter().await;
        // Ordered by zone name: private-b, then public-a.
        assert_eq!(filter.filters(), ["b.example.com", "a.example.com"]);
    }

    #[tokio::test]
    async fn derived_domain_filter_is_empty_when_listing_fails() {
        let c = unfiltered(Arc::new(Unreachable));
        assert!(c.resolve_domains().await.is_err());
        assert_eq!(c.domain_filter().await, DomainFilter::default());
    }
}
