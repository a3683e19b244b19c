use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// external-dns webhook contract types
// ─────────────────────────────────────────────────────────────────────────────

/// DNS record types the controller can ask for.
///
/// Anything else survives the webhook boundary as `Other` so that a request
/// naming an unusual type is not rejected outright; backends decide whether
/// they can act on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordType {
    A,
    Aaaa,
    Cname,
    Txt,
    Mx,
    Srv,
    Ptr,
    Caa,
    Ds,
    Dnskey,
    Naptr,
    Tlsa,
    Uri,
    Ns,
    Other(String),
}

impl RecordType {
    pub fn as_str(&self) -> &str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Txt => "TXT",
            RecordType::Mx => "MX",
            RecordType::Srv => "SRV",
            RecordType::Ptr => "PTR",
            RecordType::Caa => "CAA",
            RecordType::Ds => "DS",
            RecordType::Dnskey => "DNSKEY",
            RecordType::Naptr => "NAPTR",
            RecordType::Tlsa => "TLSA",
            RecordType::Uri => "URI",
            RecordType::Ns => "NS",
            RecordType::Other(s) => s,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, RecordType::Other(_))
    }
}

impl FromStr for RecordType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "A" => RecordType::A,
            "AAAA" => RecordType::Aaaa,
            "CNAME" => RecordType::Cname,
            "TXT" => RecordType::Txt,
            "MX" => RecordType::Mx,
            "SRV" => RecordType::Srv,
            "PTR" => RecordType::Ptr,
            "CAA" => RecordType::Caa,
            "DS" => RecordType::Ds,
            "DNSKEY" => RecordType::Dnskey,
            "NAPTR" => RecordType::Naptr,
            "TLSA" => RecordType::Tlsa,
            "URI" => RecordType::Uri,
            "NS" => RecordType::Ns,
            _ => RecordType::Other(s.to_string()),
        })
    }
}

impl From<String> for RecordType {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(rt) => rt,
            Err(never) => match never {},
        }
    }
}

impl From<RecordType> for String {
    fn from(rt: RecordType) -> Self {
        rt.as_str().to_string()
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider-specific property attached to an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSpecific {
    pub name: String,
    pub value: String,
}

/// One DNS endpoint as external-dns understands it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub dns_name: String,
    pub record_type: RecordType,
    #[serde(default)]
    pub targets: Vec<String>,
    /// Unset (or zero on the wire) means "use the backend default".
    #[serde(rename = "recordTTL", default, skip_serializing_if = "Option::is_none")]
    pub record_ttl: Option<i64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provider_specific: Vec<ProviderSpecific>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub set_identifier: String,
}

impl Endpoint {
    pub fn new(dns_name: impl Into<String>, record_type: RecordType, targets: Vec<String>) -> Self {
        Self {
            dns_name: dns_name.into(),
            record_type,
            targets,
            record_ttl: None,
            labels: HashMap::new(),
            provider_specific: Vec::new(),
            set_identifier: String::new(),
        }
    }

    pub fn with_ttl(mut self, ttl: i64) -> Self {
        self.record_ttl = Some(ttl);
        self
    }

    /// TTL explicitly requested by the controller, if any.
    pub fn configured_ttl(&self) -> Option<i64> {
        self.record_ttl.filter(|ttl| *ttl > 0)
    }
}

/// The payload sent by external-dns to POST /records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Changes {
    #[serde(default, alias = "Create")]
    pub create: Vec<Endpoint>,
    #[serde(default, alias = "UpdateOld")]
    pub update_old: Vec<Endpoint>,
    #[serde(default, alias = "UpdateNew")]
    pub update_new: Vec<Endpoint>,
    #[serde(default, alias = "Delete")]
    pub delete: Vec<Endpoint>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty()
            && self.update_old.is_empty()
            && self.update_new.is_empty()
            && self.delete.is_empty()
    }
}

/// Domain-filter response for GET /
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainFilterWire {
    #[serde(default, alias = "include")]
    pub filters: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}
