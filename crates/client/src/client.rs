//! The topology client context.
//!
//! Bundles the resolved credentials, the lazily established session, and the
//! process-lifetime VO-map cache, and threads them through query building and
//! fetching. Every network call is a blocking request/response awaited
//! sequentially; nothing here spawns tasks or overlaps I/O.

use std::collections::BTreeMap;
use std::path::PathBuf;

use roxmltree::Document;
use tracing::error;
use url::Url;

use crate::contacts::{self, ResultSet};
use crate::credentials::Credentials;
use crate::error::{AuthError, TopologyError};
use crate::proxy::ProxyBypass;
use crate::query::{self, Endpoints, SummaryKind, TOPOLOGY_NO_PROXY_DOMAIN};
use crate::session::Session;

/// Lowercase VO name → VO id, built at most once per client from the all-VOs
/// summary and treated as an immutable cache afterward.
pub type VoMap = BTreeMap<String, String>;

/// Diagnostic bodies are capped at this many bytes when logged or embedded in
/// errors.
const BODY_DIAGNOSTIC_LIMIT: usize = 2048;

/// Caller-supplied intents for a client instance.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Alternate host (optionally `host:port`) replacing the endpoint
    /// authority.
    pub host: Option<String>,
    /// Explicit certificate path, overriding defaults and `X509_USER_PROXY`.
    pub cert: Option<PathBuf>,
    /// Explicit key path, same precedence as `cert`.
    pub key: Option<PathBuf>,
    /// Comma-separated service names restricting resource queries.
    pub provides_service: Option<String>,
    /// Comma-separated owning-VO names restricting resource queries.
    pub owner_vo: Option<String>,
    /// Query endpoints; the defaults are the fixed production URLs.
    pub endpoints: Endpoints,
}

pub struct TopologyClient {
    options: ClientOptions,
    credentials: Option<Credentials>,
    session: Option<Session>,
    vo_map: Option<VoMap>,
}

impl TopologyClient {
    /// Client that resolves credentials (including the interactive passphrase
    /// prompt) on the first request.
    pub fn new(options: ClientOptions) -> Self {
        Self {
            options,
            credentials: None,
            session: None,
            vo_map: None,
        }
    }

    /// Client with pre-resolved credentials; nothing will be prompted.
    pub fn with_credentials(options: ClientOptions, credentials: Credentials) -> Self {
        Self {
            options,
            credentials: Some(credentials),
            session: None,
            vo_map: None,
        }
    }

    async fn session(&mut self) -> Result<&Session, AuthError> {
        if self.session.is_none() {
            let credentials = match self.credentials.take() {
                Some(credentials) => credentials,
                None => Credentials::resolve(
                    self.options.cert.as_deref(),
                    self.options.key.as_deref(),
                )?,
            };
            self.session = Some(Session::establish(&credentials)?);
        }
        Ok(self.session.as_ref().expect("session established above"))
    }

    /// The cached VO name → id map, fetching it on first use.
    ///
    /// Any failure here is fatal: a missing or malformed VO directory means
    /// owning-VO intents cannot be resolved at all.
    pub async fn vo_map(&mut self) -> Result<&VoMap, TopologyError> {
        if self.vo_map.is_none() {
            let map = self.fetch_vo_map().await?;
            self.vo_map = Some(map);
        }
        Ok(self.vo_map.as_ref().expect("VO map fetched above"))
    }

    #[tracing::instrument(name = "fetch_vo_map", level = "debug", skip(self))]
    async fn fetch_vo_map(&mut self) -> Result<VoMap, TopologyError> {
        let _bypass = ProxyBypass::new(TOPOLOGY_NO_PROXY_DOMAIN);
        let url = query::update_url_hostname(
            &self.options.endpoints.vo_summary_all,
            self.options.host.as_deref(),
        )?;
        let session = self.session().await?;
        let (status, body) = session.get(&url).await?;
        if !status.is_success() {
            return Err(TopologyError::Http {
                status,
                body: truncate_body(&body, BODY_DIAGNOSTIC_LIMIT).to_string(),
            });
        }

        let doc = Document::parse(&body)?;
        let root = doc.root_element();
        if root.tag_name().name() != "VOSummary" {
            return Err(TopologyError::UnexpectedRoot(
                root.tag_name().name().to_string(),
            ));
        }
        let mut map = VoMap::new();
        for vo in root.children().filter(|n| n.is_element()) {
            if vo.tag_name().name() != "VO" {
                return Err(TopologyError::UnexpectedElement {
                    expected: "VO",
                    found: vo.tag_name().name().to_string(),
                });
            }
            let mut info: BTreeMap<&str, &str> = BTreeMap::new();
            for item in vo.children().filter(|n| n.is_element()) {
                info.insert(item.tag_name().name(), item.text().unwrap_or(""));
            }
            // Both fields are required for an entry; anything else is skipped.
            if let (Some(id), Some(name)) = (info.get("ID"), info.get("Name")) {
                map.insert(name.to_lowercase(), (*id).to_string());
            }
        }
        Ok(map)
    }

    /// Perform one mangled, authenticated summary fetch.
    ///
    /// Protocol failures (non-2xx status, unexpected root tag, unparseable
    /// body) are logged and reported as `Ok(None)` — "nothing found, already
    /// logged" — so callers can distinguish them from configuration errors,
    /// which are always `Err`.
    #[tracing::instrument(name = "fetch_summary", level = "debug", skip(self))]
    pub async fn fetch_summary(
        &mut self,
        kind: SummaryKind,
    ) -> Result<Option<String>, TopologyError> {
        let _bypass = ProxyBypass::new(TOPOLOGY_NO_PROXY_DOMAIN);
        let base = match kind {
            SummaryKind::VirtualOrganization => self.options.endpoints.vo_contacts.clone(),
            SummaryKind::ResourceGroup => {
                self.options.endpoints.resource_group_contacts.clone()
            }
        };
        let url = self.mangle_url(&base).await?;
        let session = self.session().await?;
        let (status, body) = session.get(&url).await?;
        if !status.is_success() {
            error!(
                status = %status,
                body = truncate_body(&body, BODY_DIAGNOSTIC_LIMIT),
                "topology request failed"
            );
            return Ok(None);
        }
        match Document::parse(&body) {
            Ok(doc) if doc.root_element().tag_name().name() == kind.root_tag() => {}
            Ok(doc) => {
                error!(
                    root = doc.root_element().tag_name().name(),
                    expected = kind.root_tag(),
                    "topology returned invalid XML"
                );
                return Ok(None);
            }
            Err(e) => {
                error!(error = %e, "failed to parse topology response as XML");
                return Ok(None);
            }
        }
        Ok(Some(body))
    }

    /// Rewrite a base query URL according to the client's filter intents,
    /// lazily fetching the VO map when an owning-VO intent is present.
    async fn mangle_url(&mut self, base: &str) -> Result<Url, TopologyError> {
        let mut url = query::update_url_hostname(base, self.options.host.as_deref())?;
        if let Some(services) = self.options.provides_service.clone() {
            query::apply_service_filter(&mut url, &services)?;
        }
        if let Some(owner_vos) = self.options.owner_vo.clone() {
            let vo_map = self.vo_map().await?;
            query::apply_owner_filter(&mut url, &owner_vos, vo_map)?;
        }
        Ok(url)
    }

    /// VO contact lists keyed by VO name, or the "no result" sentinel for an
    /// already-logged protocol failure.
    pub async fn vo_contacts(&mut self) -> Result<Option<ResultSet>, TopologyError> {
        let Some(body) = self.fetch_summary(SummaryKind::VirtualOrganization).await? else {
            return Ok(None);
        };
        let doc = Document::parse(&body)?;
        Ok(Some(contacts::vo_contact_results(doc.root_element())))
    }

    /// Resource contact lists as two parallel result sets, keyed by resource
    /// name and by resource FQDN respectively.
    pub async fn resource_contacts_by_name_and_fqdn(
        &mut self,
    ) -> Result<Option<(ResultSet, ResultSet)>, TopologyError> {
        let Some(body) = self.fetch_summary(SummaryKind::ResourceGroup).await? else {
            return Ok(None);
        };
        let doc = Document::parse(&body)?;
        Ok(Some(contacts::resource_contact_results(doc.root_element())))
    }

    /// Resource contacts keyed by resource name only.
    pub async fn resource_contacts(&mut self) -> Result<Option<ResultSet>, TopologyError> {
        Ok(self
            .resource_contacts_by_name_and_fqdn()
            .await?
            .map(|(by_name, _)| by_name))
    }

    /// Resource contacts keyed by resource FQDN only.
    pub async fn resource_contacts_by_fqdn(
        &mut self,
    ) -> Result<Option<ResultSet>, TopologyError> {
        Ok(self
            .resource_contacts_by_name_and_fqdn()
            .await?
            .map(|(_, by_fqdn)| by_fqdn))
    }
}

/// Cap a diagnostic body without splitting a UTF-8 character.
fn truncate_body(body: &str, limit: usize) -> &str {
    if body.len() <= limit {
        return body;
    }
    let mut end = limit;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
