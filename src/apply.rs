use std::{sync::Arc, time::Duration};

use tracing::{debug, info};

use crate::{
    backend::{Change, DnsBackend},
    error::Result,
    router::{batch, route_to_zones},
    zones::ZoneCatalog,
};

/// Submits a change zone by zone, batch by batch.
///
/// The first failed batch aborts the apply; batches already accepted are
/// left in place. Dropping the returned future between batches stops any
/// further submission.
pub struct ApplyExecutor {
    backend: Arc<dyn DnsBackend>,
    batch_size: usize,
    batch_interval: Duration,
    dry_run: bool,
}

impl ApplyExecutor {
    pub fn new(
        backend: Arc<dyn DnsBackend>,
        batch_size: usize,
        batch_interval: Duration,
        dry_run: bool,
    ) -> Self {
        Self {
            backend,
            batch_size,
            batch_interval,
            dry_run,
        }
    }

    pub async fn submit(&self, catalog: &ZoneCatalog, change: Change) -> Result<()> {
        if change.is_empty() {
            debug!("All records are already up to date");
            return Ok(());
        }

        let zones = catalog.resolve_domains().await?;

        let batches: Vec<(String, Change)> = route_to_zones(&zones, change)
            .into_iter()
            .flat_map(|(zone, change)| {
                batch(change, self.batch_size)
                    .into_iter()
                    .map(move |c| (zone.clone(), c))
            })
            .collect();

        let total = batches.len();
        let mut number_in_zone = 0;
        let mut previous_zone: Option<String> = None;

        for (i, (zone, c)) in batches.into_iter().enumerate() {
            if previous_zone.as_deref() != Some(zone.as_str()) {
                number_in_zone = 0;
                previous_zone = Some(zone.clone());
            }

            info!("Change zone: {zone} batch #{number_in_zone}");
            for del in &c.deletions {
                info!(
                    "Del records: {} {} {:?} {}",
                    del.name, del.record_type, del.rrdatas, del.ttl
                );
            }
            for add in &c.additions {
                info!(
                    "Add records: {} {} {:?} {}",
                    add.name, add.record_type, add.rrdatas, add.ttl
                );
            }
            number_in_zone += 1;

            if self.dry_run {
                continue;
            }

            self.backend.create_change(&zone, &c).await?;

            if i + 1 < total {
                tokio::time::sleep(self.batch_interval).await;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::ResourceRecordSet,
        dns::RecordType,
        filter::{DomainFilter, ZoneIdFilter, ZoneTypeFilter},
        inmemory::InMemoryDns,
    };

    fn a(name: &str) -> ResourceRecordSet {
        ResourceRecordSet {
            name: name.into(),
            record_type: RecordType::A,
            ttl: 300,
            rrdatas: vec!["10.0.0.1".into()],
        }
    }

    fn setup(batch_size: usize, dry_run: bool) -> (Arc<InMemoryDns>, ZoneCatalog, ApplyExecutor) {
        let dns = Arc::new(InMemoryDns::from_domains(["example.com", "example.org"]));
        let catalog = ZoneCatalog::new(
            dns.clone(),
            DomainFilter::default(),
            ZoneIdFilter::default(),
            ZoneTypeFilter::default(),
        );
        let executor = ApplyExecutor::new(dns.clone(), batch_size, Duration::from_secs(1), dry_run);
        (dns, catalog, executor)
    }

    #[tokio::test]
    async fn empty_change_makes_no_backend_calls() {
        let (dns, catalog, executor) = setup(10, false);
        executor.submit(&catalog, Change::default()).await.unwrap();
        assert_eq!(dns.zone_list_calls(), 0);
        assert_eq!(dns.change_calls(), 0);
    }

    #[tokio::test]
    async fn dry_run_submits_nothing() {
        let (dns, catalog, executor) = setup(1, true);
        let change = Change {
            additions: vec![a("a.example.com."), a("b.example.com."), a("c.example.org.")],
            deletions: vec![],
        };
        executor.submit(&catalog, change).await.unwrap();
        assert_eq!(dns.change_calls(), 0);
        assert!(dns.record_sets("example-com").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn batches_are_paced_and_unroutable_records_skipped() {
        let (dns, catalog, executor) = setup(1, false);
        let change = Change {
            additions: vec![a("a.example.com."), a("b.example.com."), a("lost.example.net.")],
            deletions: vec![],
        };

        let started = tokio::time::Instant::now();
        executor.submit(&catalog, change).await.unwrap();

        assert_eq!(dns.change_calls(), 2);
        assert_eq!(dns.record_sets("example-com").len(), 2);
        // One pause between the two batches, none after the last.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(1) && elapsed < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn first_failure_aborts_remaining_batches() {
        let (dns, catalog, executor) = setup(1, false);
        let change = Change {
            additions: vec![a("c.example.com.")],
            deletions: vec![a("a.example.com."), a("b.example.com.")],
        };

        // "a" deletes a record that doesn't exist, so the first batch fails.
        let err = executor.submit(&catalog, change).await.unwrap_err();
        assert!(err.to_string().contains("a.example.com."));
        assert_eq!(dns.change_calls(), 1);
        assert!(dns.record_sets("example-com").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_submit_stops_before_the_next_batch() {
        let (dns, catalog, executor) = setup(1, false);
        let change = Change {
            additions: vec![a("a.example.com."), a("b.example.com."), a("c.example.com.")],
            deletions: vec![],
        };

        let outcome = tokio::time::timeout(
            Duration::from_millis(1500),
            executor.submit(&catalog, change),
        )
        .await;

        assert!(outcome.is_err());
        assert_eq!(dns.change_calls(), 2);
    }
}
