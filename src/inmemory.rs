//! An in-process backend with Cloud DNS change semantics.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, MutexGuard,
    },
};

use async_trait::async_trait;
use tracing::debug;

use crate::{
    backend::{
        Change, DnsBackend, ManagedZone, ManagedZonesPage, ResourceRecordSet,
        ResourceRecordSetsPage,
    },
    codec::ensure_trailing_dot,
    error::{ProviderError, Result},
    filter::ZoneVisibility,
};

/// Zones and record sets held in memory.
///
/// A change is validated as a whole before anything is written: deleting a
/// record set that doesn't exist exactly, or adding one whose name and type
/// are already present, rejects the entire change.
pub struct InMemoryDns {
    zones: Vec<ManagedZone>,
    records: Mutex<BTreeMap<String, Vec<ResourceRecordSet>>>,
    page_size: usize,
    zone_list_calls: AtomicUsize,
    change_calls: AtomicUsize,
}

impl InMemoryDns {
    pub fn new(zones: Vec<ManagedZone>) -> Self {
        let records = zones.iter().map(|z| (z.name.clone(), Vec::new())).collect();
        Self {
            zones,
            records: Mutex::new(records),
            page_size: usize::MAX,
            zone_list_calls: AtomicUsize::new(0),
            change_calls: AtomicUsize::new(0),
        }
    }

    /// One public zone per domain, named after the domain.
    pub fn from_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let zones = domains
            .into_iter()
            .enumerate()
            .map(|(i, d)| {
                let dns_name = ensure_trailing_dot(d.as_ref().trim());
                ManagedZone {
                    name: dns_name.trim_end_matches('.').replace('.', "-"),
                    dns_name,
                    id: (i + 1).to_string(),
                    visibility: ZoneVisibility::Public,
                    ..Default::default()
                }
            })
            .collect();
        Self::new(zones)
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn zone_list_calls(&self) -> usize {
        self.zone_list_calls.load(Ordering::SeqCst)
    }

    pub fn change_calls(&self) -> usize {
        self.change_calls.load(Ordering::SeqCst)
    }

    /// Current record sets of one zone.
    pub fn record_sets(&self, zone: &str) -> Vec<ResourceRecordSet> {
        self.lock().get(zone).cloned().unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Vec<ResourceRecordSet>>> {
        // A panic while holding the lock leaves plain data behind; keep serving it.
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn paginate<T: Clone>(
    items: &[T],
    page_token: Option<&str>,
    page_size: usize,
) -> (Vec<T>, Option<String>) {
    let start = page_token.and_then(|t| t.parse::<usize>().ok()).unwrap_or(0);
    let end = start.saturating_add(page_size).min(items.len());
    let page = items.get(start..end).map(<[T]>::to_vec).unwrap_or_default();
    let next = (end < items.len()).then(|| end.to_string());
    (page, next)
}

#[async_trait]
impl DnsBackend for InMemoryDns {
    async fn list_managed_zones(&self, page_token: Option<&str>) -> Result<ManagedZonesPage> {
        self.zone_list_calls.fetch_add(1, Ordering::SeqCst);
        let (managed_zones, next_page_token) = paginate(&self.zones, page_token, self.page_size);
        Ok(ManagedZonesPage {
            managed_zones,
            next_page_token,
        })
    }

    async fn list_record_sets(
        &self,
        zone: &str,
        page_token: Option<&str>,
    ) -> Result<ResourceRecordSetsPage> {
        let records = self.lock();
        let rrsets = records.get(zone).ok_or_else(|| ProviderError::Api {
            operation: format!("list record sets of {zone}"),
            status: 404,
            body: format!("managed zone {zone} not found"),
        })?;
        let (rrsets, next_page_token) = paginate(rrsets, page_token, self.page_size);
        Ok(ResourceRecordSetsPage {
            rrsets,
            next_page_token,
        })
    }

    async fn create_change(&self, zone: &str, change: &Change) -> Result<()> {
        self.change_calls.fetch_add(1, Ordering::SeqCst);

        let rejected = |reason: String| ProviderError::ChangeRejected {
            zone: zone.to_string(),
            reason,
        };

        let mut records = self.lock();
        let current = records
            .get(zone)
            .ok_or_else(|| rejected("managed zone not found".into()))?;

        let mut next = current.clone();
        for deletion in &change.deletions {
            let pos = next
                .iter()
                .position(|r| r == deletion)
                .ok_or_else(|| {
                    rejected(format!(
                        "record set {} {} not found or does not match",
                        deletion.name, deletion.record_type
                    ))
                })?;
            next.remove(pos);
        }
        for addition in &change.additions {
            if next
                .iter()
                .any(|r| r.name == addition.name && r.record_type == addition.record_type)
            {
                return Err(rejected(format!(
                    "record set {} {} already exists",
                    addition.name, addition.record_type
                )));
            }
            next.push(addition.clone());
        }

        debug!(
            zone,
            additions = change.additions.len(),
            deletions = change.deletions.len(),
            "applied in-memory change"
        );
        records.insert(zone.to_string(), next);
        Ok(())
    }
}
