use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{dns::RecordType, error::Result, filter::ZoneVisibility};

// ─────────────────────────────────────────────────────────────────────────────
// Cloud DNS API shapes (partial – only what we need)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedZone {
    /// Project-unique identifier used in API paths.
    pub name: String,
    /// Domain suffix served by the zone, trailing-dot terminated.
    pub dns_name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub visibility: ZoneVisibility,
    /// Peering and forwarding zones host no authoritative records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peering_config: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forwarding_config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecordSet {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    #[serde(default)]
    pub ttl: i64,
    #[serde(default)]
    pub rrdatas: Vec<String>,
}

/// One backend transaction: every deletion and addition lands atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additions: Vec<ResourceRecordSet>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deletions: Vec<ResourceRecordSet>,
}

impl Change {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.deletions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.additions.len() + self.deletions.len()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedZonesPage {
    #[serde(default)]
    pub managed_zones: Vec<ManagedZone>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecordSetsPage {
    #[serde(default)]
    pub rrsets: Vec<ResourceRecordSet>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Capability set
// ─────────────────────────────────────────────────────────────────────────────

/// The calls the zone catalog and the apply pipeline need from a DNS backend.
///
/// Listing is page-at-a-time; callers loop until `next_page_token` is `None`.
#[async_trait]
pub trait DnsBackend: Send + Sync {
    async fn list_managed_zones(&self, page_token: Option<&str>) -> Result<ManagedZonesPage>;

    async fn list_record_sets(
        &self,
        zone: &str,
        page_token: Option<&str>,
    ) -> Result<ResourceRecordSetsPage>;

    async fn create_change(&self, zone: &str, change: &Change) -> Result<()>;
}
