//! Splits one backend-wide change into per-zone, size-bounded transactions.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::{
    backend::{Change, ResourceRecordSet},
    codec::{ensure_trailing_dot, RecordCodec},
    dns::{Changes, Endpoint},
    filter::DomainFilter,
};

/// Drop endpoints the domain filter doesn't allow, before they are encoded.
pub fn filter_by_domain<'a>(
    endpoints: &'a [Endpoint],
    filter: &'a DomainFilter,
) -> impl Iterator<Item = &'a Endpoint> + 'a {
    endpoints.iter().filter(move |ep| filter.matches(&ep.dns_name))
}

/// Flatten the planner's diff into one change: creates and new update
/// values become additions, old update values and deletes become deletions.
pub fn build_change(changes: &Changes, filter: &DomainFilter, codec: &RecordCodec) -> Change {
    let encode = |eps: &[Endpoint]| -> Vec<ResourceRecordSet> {
        filter_by_domain(eps, filter)
            .filter(|ep| {
                if ep.targets.is_empty() {
                    warn!("Skipping {} {}: no targets", ep.record_type, ep.dns_name);
                }
                !ep.targets.is_empty()
            })
            .map(|ep| codec.encode(ep))
            .collect()
    };

    let mut change = Change::default();
    change.additions.extend(encode(&changes.create));
    change.additions.extend(encode(&changes.update_new));
    change.deletions.extend(encode(&changes.update_old));
    change.deletions.extend(encode(&changes.delete));
    drop_unchanged(&mut change);
    change
}

/// Remove record sets that are deleted and added back identically, e.g. an
/// update that only touched labels. A record set must not sit on both sides
/// of one transaction.
fn drop_unchanged(change: &mut Change) {
    let mut i = 0;
    while i < change.additions.len() {
        match change.deletions.iter().position(|d| *d == change.additions[i]) {
            Some(pos) => {
                change.deletions.remove(pos);
                let rrset = change.additions.remove(i);
                debug!("Record set {} {} is unchanged", rrset.name, rrset.record_type);
            }
            None => i += 1,
        }
    }
}

/// Find the zone owning `name` by longest domain-suffix match.
pub fn find_zone<'z>(zones: &'z BTreeMap<String, String>, name: &str) -> Option<&'z str> {
    let name = ensure_trailing_dot(name).to_ascii_lowercase();

    zones
        .iter()
        .map(|(zone, domain)| (zone, ensure_trailing_dot(domain).to_ascii_lowercase()))
        .filter(|(_, domain)| name == *domain || name.ends_with(&format!(".{domain}")))
        .max_by_key(|(_, domain)| domain.len())
        .map(|(zone, _)| zone.as_str())
}

/// Partition `change` by owning zone; `zones` maps zone name to domain.
///
/// Record sets matching no zone are dropped with a warning. Zones left with
/// nothing to do are absent from the result.
pub fn route_to_zones(
    zones: &BTreeMap<String, String>,
    change: Change,
) -> BTreeMap<String, Change> {
    let mut routed: BTreeMap<String, Change> = BTreeMap::new();

    for rrset in change.additions {
        match find_zone(zones, &rrset.name) {
            Some(zone) => routed.entry(zone.to_string()).or_default().additions.push(rrset),
            None => warn!(
                "No matching zone for record addition: {} {} {:?} {}",
                rrset.name, rrset.record_type, rrset.rrdatas, rrset.ttl
            ),
        }
    }

    for rrset in change.deletions {
        match find_zone(zones, &rrset.name) {
            Some(zone) => routed.entry(zone.to_string()).or_default().deletions.push(rrset),
            None => warn!(
                "No matching zone for record deletion: {} {} {:?} {}",
                rrset.name, rrset.record_type, rrset.rrdatas, rrset.ttl
            ),
        }
    }

    routed.retain(|_, c| !c.is_empty());
    routed
}

/// Split one zone's change into transactions of at most `max_batch_size`
/// record sets, never separating the record sets of a single name.
///
/// Names are packed greedily in sorted order. A name that alone exceeds the
/// cap is skipped. A cap of zero disables splitting.
pub fn batch(change: Change, max_batch_size: usize) -> Vec<Change> {
    if max_batch_size == 0 {
        return vec![change];
    }

    let mut by_name: BTreeMap<String, Change> = BTreeMap::new();
    for rrset in change.additions {
        by_name.entry(rrset.name.clone()).or_default().additions.push(rrset);
    }
    for rrset in change.deletions {
        by_name.entry(rrset.name.clone()).or_default().deletions.push(rrset);
    }

    let mut batches = Vec::new();
    let mut current = Change::default();

    for (name, named) in by_name {
        let size = named.len();

        if size > max_batch_size {
            warn!(
                "Total changes for {name} exceeds max batch size of {max_batch_size}, \
                 total changes: {size}"
            );
            continue;
        }

        if current.len() + size > max_batch_size {
            batches.push(std::mem::take(&mut current));
        }

        current.additions.extend(named.additions);
        current.deletions.extend(named.deletions);
    }

    if !current.is_empty() {
        batches.push(current);
    }

    batches
}
