use std::collections::HashMap;

use tracing::debug;

use crate::{
    backend::ResourceRecordSet,
    dns::{Endpoint, RecordType},
};

/// TTL used when the endpoint doesn't specify one.
pub const DEFAULT_TTL: i64 = 300;

/// Converts between Cloud DNS record sets and external-dns endpoints.
#[derive(Debug, Clone)]
pub struct RecordCodec {
    default_ttl: i64,
    /// Types outside [`RecordType`]'s known set that are still decoded.
    extra_types: Vec<RecordType>,
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            extra_types: Vec::new(),
        }
    }
}

impl RecordCodec {
    pub fn with_extra_types(mut self, extra: impl IntoIterator<Item = RecordType>) -> Self {
        self.extra_types.extend(extra);
        self
    }

    pub fn supports(&self, record_type: &RecordType) -> bool {
        record_type.is_known() || self.extra_types.contains(record_type)
    }

    // ── encode ───────────────────────────────────────────────────────────────

    /// Build the wire record set for one endpoint.
    ///
    /// Name-valued targets get a trailing dot: every MX/SRV value, and the
    /// first CNAME value (a CNAME only ever has one).
    pub fn encode(&self, ep: &Endpoint) -> ResourceRecordSet {
        let mut rrdatas = ep.targets.clone();

        match ep.record_type {
            RecordType::Cname => {
                if let Some(first) = rrdatas.first_mut() {
                    *first = ensure_trailing_dot(first);
                }
            }
            RecordType::Mx | RecordType::Srv => {
                for value in &mut rrdatas {
                    *value = ensure_trailing_dot(value);
                }
            }
            _ => {}
        }

        let ttl = ep.configured_ttl().unwrap_or(self.default_ttl);

        debug!(
            record_type = %ep.record_type,
            name        = %ep.dns_name,
            ?rrdatas,
            ttl,
            "encoded record set"
        );

        ResourceRecordSet {
            name: ensure_trailing_dot(&ep.dns_name),
            record_type: ep.record_type.clone(),
            ttl,
            rrdatas,
        }
    }

    // ── decode ───────────────────────────────────────────────────────────────

    /// Collapse wire record sets into one endpoint per (name, type).
    ///
    /// Unsupported types are dropped. Names and targets come back without
    /// their trailing dot.
    pub fn decode<I>(&self, rrsets: I) -> Vec<Endpoint>
    where
        I: IntoIterator<Item = ResourceRecordSet>,
    {
        let mut endpoints: Vec<Endpoint> = Vec::new();
        let mut index: HashMap<(String, RecordType), usize> = HashMap::new();

        for rrset in rrsets {
            if !self.supports(&rrset.record_type) {
                continue;
            }

            let name = trim_trailing_dot(&rrset.name).to_string();
            let targets = rrset
                .rrdatas
                .iter()
                .map(|t| trim_trailing_dot(t).to_string());

            match index.get(&(name.clone(), rrset.record_type.clone())) {
                Some(&i) => endpoints[i].targets.extend(targets),
                None => {
                    index.insert((name.clone(), rrset.record_type.clone()), endpoints.len());
                    endpoints.push(
                        Endpoint::new(name, rrset.record_type, targets.collect())
                            .with_ttl(rrset.ttl),
                    );
                }
            }
        }

        endpoints
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

pub fn ensure_trailing_dot(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.")
    }
}

fn trim_trailing_dot(name: &str) -> &str {
    name.strip_suffix('.').unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rrset(name: &str, record_type: RecordType, ttl: i64, rrdatas: &[&str]) -> ResourceRecordSet {
        ResourceRecordSet {
            name: name.into(),
            record_type,
            ttl,
            rrdatas: rrdatas.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn cname_round_trip_normalises_trailing_dots() {
        let codec = RecordCodec::default();
        let target = vec!["bar.example.com".into()];
        let ep = Endpoint::new("foo.example.com", RecordType::Cname, target);

        let wire = codec.encode(&ep);
        assert_eq!(wire.name, "foo.example.com.");
        assert_eq!(wire.rrdatas, vec!["bar.example.com."]);
        assert_eq!(wire.ttl, DEFAULT_TTL);

        let back = codec.decode([wire]);
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].dns_name, "foo.example.com");
        assert_eq!(back[0].targets, vec!["bar.example.com"]);
    }

    #[test]
    fn mx_and_srv_values_all_get_trailing_dots() {
        let codec = RecordCodec::default();
        let mx = Endpoint::new(
            "example.com",
            RecordType::Mx,
            vec!["10 mx1.example.com".into(), "20 mx2.example.com.".into()],
        );
        assert_eq!(
            codec.encode(&mx).rrdatas,
            vec!["10 mx1.example.com.", "20 mx2.example.com."]
        );

        let srv = Endpoint::new(
            "_sip._tcp.example.com",
            RecordType::Srv,
            vec!["0 5 5060 sip.example.com".into()],
        );
        assert_eq!(codec.encode(&srv).rrdatas, vec!["0 5 5060 sip.example.com."]);
    }

    #[test]
    fn address_and_txt_values_are_untouched() {
        let codec = RecordCodec::default();
        let a = Endpoint::new("a.example.com.", RecordType::A, vec!["10.0.0.1".into()])
            .with_ttl(60);
        let wire = codec.encode(&a);
        assert_eq!(wire.name, "a.example.com.");
        assert_eq!(wire.rrdatas, vec!["10.0.0.1"]);
        assert_eq!(wire.ttl, 60);

        let heritage = vec!["\"heritage=external-dns\"".into()];
        let txt = Endpoint::new("t.example.com", RecordType::Txt, heritage);
        assert_eq!(codec.encode(&txt).rrdatas, vec!["\"heritage=external-dns\""]);
    }

    #[test]
    fn decode_groups_by_name_and_type_and_drops_unsupported() {
        let codec = RecordCodec::default();
        let endpoints = codec.decode([
            rrset("a.example.com.", RecordType::A, 300, &["10.0.0.1"]),
            rrset("example.com.", RecordType::Other("SOA".into()), 21600, &["ns. admin. 1 2"]),
            rrset("a.example.com.", RecordType::A, 300, &["10.0.0.2"]),
            rrset("a.example.com.", RecordType::Txt, 300, &["\"owner\""]),
        ]);

        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].targets, vec!["10.0.0.1", "10.0.0.2"]);
        assert_eq!(endpoints[0].record_ttl, Some(300));
        assert_eq!(endpoints[1].record_type, RecordType::Txt);
    }

    #[test]
    fn extra_types_can_be_allow_listed() {
        let codec = RecordCodec::default().with_extra_types([RecordType::Other("SPF".into())]);
        let spf = rrset("example.com.", RecordType::Other("SPF".into()), 300, &["v=spf1 -all"]);
        let endpoints = codec.decode([spf]);
        assert_eq!(endpoints.len(), 1);
    }
}
