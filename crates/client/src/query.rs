//! Query-URL construction for the topology endpoints.
//!
//! Filter intents (service names, owning VOs, alternate host) are rewritten
//! into the query parameters the remote service understands. All additions
//! append to the existing parameter list; nothing already present on the base
//! URL is replaced or dropped, and repeated selector keys survive re-encoding.

use url::Url;

use crate::error::QueryError;

/// Domain the forward proxy must be bypassed for while querying topology.
pub const TOPOLOGY_NO_PROXY_DOMAIN: &str = ".opensciencegrid.org";

/// Fixed service-name → service-id table. Not fetched remotely.
pub const SERVICE_IDS: [(&str, u32); 7] = [
    ("ce", 1),
    ("srmv2", 3),
    ("gridftp", 5),
    ("xrootd", 142),
    ("perfsonar-bandwidth", 130),
    ("perfsonar-latency", 130),
    ("gums", 101),
];

/// The three fixed query URLs. Defaults are the interoperability contract;
/// overriding them is only intended for tests and site mirrors.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// VO summary listing every VO regardless of active status.
    pub vo_summary_all: String,
    /// VO summary restricted to active, enabled VOs (contact queries).
    pub vo_contacts: String,
    /// Resource-group summary restricted to active, enabled entries.
    pub resource_group_contacts: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            vo_summary_all:
                "https://topology.opensciencegrid.org/vosummary/xml?all_vos=on&active_value=1"
                    .to_string(),
            vo_contacts: "https://topology.opensciencegrid.org/vosummary/xml?\
                          &active=on&active_value=1&disable=on&disable_value=0"
                .to_string(),
            resource_group_contacts: "https://topology.opensciencegrid.org/rgsummary/xml?\
                                      &active=on&active_value=1&disable=on&disable_value=0"
                .to_string(),
        }
    }
}

/// Which summary a contact query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryKind {
    VirtualOrganization,
    ResourceGroup,
}

impl SummaryKind {
    /// Root element tag the response document must carry.
    pub fn root_tag(self) -> &'static str {
        match self {
            SummaryKind::VirtualOrganization => "VOSummary",
            SummaryKind::ResourceGroup => "ResourceSummary",
        }
    }
}

/// Replace the URL's authority with an alternate host, if one was supplied.
/// The override may carry a port (`host:9443`, `[::1]:9443`); without one,
/// the scheme default applies.
pub fn update_url_hostname(url: &str, host: Option<&str>) -> Result<Url, QueryError> {
    let mut url = Url::parse(url)?;
    if let Some(host) = host {
        let (hostname, port) = split_authority(host);
        url.set_host(Some(&hostname))
            .map_err(|_| QueryError::Host(host.to_string()))?;
        url.set_port(port)
            .map_err(|_| QueryError::Host(host.to_string()))?;
    }
    Ok(url)
}

/// Split an authority override into hostname and optional port. IPv6
/// literals keep (or gain) their brackets: a bare literal with multiple
/// colons is a host with no port, never a host:port split.
fn split_authority(authority: &str) -> (String, Option<u16>) {
    if let Some(inner) = authority.strip_prefix('[') {
        if let Some((address, rest)) = inner.split_once(']') {
            let port = rest.strip_prefix(':').and_then(|p| p.parse().ok());
            return (format!("[{address}]"), port);
        }
        return (authority.to_string(), None);
    }
    if authority.matches(':').count() > 1 {
        return (format!("[{authority}]"), None);
    }
    match authority.rsplit_once(':') {
        Some((name, port)) => match port.parse::<u16>() {
            Ok(port) => (name.to_string(), Some(port)),
            Err(_) => (authority.to_string(), None),
        },
        None => (authority.to_string(), None),
    }
}

/// Append one `service_sel[]` selector per requested service, plus the
/// `service=on` flag if the query did not already carry a `service` parameter.
pub fn apply_service_filter(url: &mut Url, services: &str) -> Result<(), QueryError> {
    if !has_param(url, "service") {
        url.query_pairs_mut().append_pair("service", "on");
    }
    for service in services.split(',') {
        let service = service.trim().to_lowercase();
        let id = service_id(&service).ok_or_else(|| QueryError::UnknownService {
            name: service.clone(),
            known: known_service_names(),
        })?;
        url.query_pairs_mut()
            .append_pair("service_sel[]", &id.to_string());
    }
    Ok(())
}

/// Append one `voown_sel[]` selector per requested owning VO, plus the
/// `voown=on` flag if absent. VO ids come from the caller-supplied name→id
/// map (the process-lifetime cache built by the VO name resolver).
pub fn apply_owner_filter(
    url: &mut Url,
    owner_vos: &str,
    vo_map: &crate::client::VoMap,
) -> Result<(), QueryError> {
    if !has_param(url, "voown") {
        url.query_pairs_mut().append_pair("voown", "on");
    }
    for vo in owner_vos.split(',') {
        let vo = vo.trim().to_lowercase();
        let id = vo_map.get(&vo).ok_or_else(|| QueryError::UnknownVo {
            name: vo.clone(),
            known: vo_map.keys().cloned().collect::<Vec<_>>().join(", "),
        })?;
        url.query_pairs_mut().append_pair("voown_sel[]", id);
    }
    Ok(())
}

fn has_param(url: &Url, name: &str) -> bool {
    url.query_pairs().any(|(key, _)| key == name)
}

fn service_id(name: &str) -> Option<u32> {
    SERVICE_IDS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, id)| *id)
}

fn known_service_names() -> String {
    SERVICE_IDS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}
