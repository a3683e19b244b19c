use serde::{Deserialize, Serialize};

use crate::{dns::DomainFilterWire, error::ProviderError};

// ─────────────────────────────────────────────────────────────────────────────
// Domain filter
// ─────────────────────────────────────────────────────────────────────────────

/// Restricts which domains a provider instance may touch.
///
/// Entries are compared case-insensitively without their trailing dot. A
/// plain entry `example.com` matches the apex and every subdomain; an entry
/// starting with a dot (`.example.com`) matches subdomains only. Exclusions
/// win over inclusions, and an empty include list matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainFilter {
    filters: Vec<String>,
    exclude: Vec<String>,
}

impl DomainFilter {
    pub fn new<I, S>(filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_exclusions(filters, Vec::<String>::new())
    }

    pub fn with_exclusions<I, S, J, T>(filters: I, exclude: J) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        J: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        Self {
            filters: prepare(filters),
            exclude: prepare(exclude),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.filters.is_empty() || !self.exclude.is_empty()
    }

    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    pub fn exclusions(&self) -> &[String] {
        &self.exclude
    }

    pub fn matches(&self, domain: &str) -> bool {
        let domain = normalise(domain);
        let included = self.filters.is_empty() || matches_any(&self.filters, &domain);
        included && !matches_any(&self.exclude, &domain)
    }

    /// The form advertised to webhook callers.
    pub fn to_wire(&self) -> DomainFilterWire {
        DomainFilterWire {
            filters: self.filters.clone(),
            exclude: self.exclude.clone(),
        }
    }
}

impl From<DomainFilterWire> for DomainFilter {
    fn from(wire: DomainFilterWire) -> Self {
        Self::with_exclusions(wire.filters, wire.exclude)
    }
}

fn prepare<I, S>(entries: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    entries
        .into_iter()
        .map(|e| normalise(e.as_ref()))
        .filter(|e| !e.is_empty())
        .collect()
}

fn normalise(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

fn matches_any(entries: &[String], domain: &str) -> bool {
    entries.iter().any(|entry| {
        if entry.starts_with('.') {
            domain.ends_with(entry.as_str())
        } else {
            domain == entry || domain.ends_with(&format!(".{entry}"))
        }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Zone id filter
// ─────────────────────────────────────────────────────────────────────────────

/// Only consider zones whose identifier ends with one of the configured ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneIdFilter {
    ids: Vec<String>,
}

impl ZoneIdFilter {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            ids: ids
                .into_iter()
                .map(|id| id.as_ref().trim().to_string())
                .filter(|id| !id.is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, zone_id: &str) -> bool {
        self.ids.is_empty() || self.ids.iter().any(|id| zone_id.ends_with(id.as_str()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Zone type filter
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneVisibility {
    #[default]
    Public,
    Private,
}

impl std::fmt::Display for ZoneVisibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZoneVisibility::Public => f.write_str("public"),
            ZoneVisibility::Private => f.write_str("private"),
        }
    }
}

/// Restricts zones by visibility; unset matches both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZoneTypeFilter(Option<ZoneVisibility>);

impl ZoneTypeFilter {
    pub fn only(visibility: ZoneVisibility) -> Self {
        Self(Some(visibility))
    }

    /// Parse a configured visibility; empty means "any".
    pub fn parse(value: &str) -> Result<Self, ProviderError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" => Ok(Self(None)),
            "public" => Ok(Self::only(ZoneVisibility::Public)),
            "private" => Ok(Self::only(ZoneVisibility::Private)),
            other => Err(ProviderError::Config(format!(
                "unknown zone visibility '{other}', expected 'public' or 'private'"
            ))),
        }
    }

    pub fn matches(&self, visibility: ZoneVisibility) -> bool {
        self.0.map_or(true, |wanted| wanted == visibility)
    }
}
