//! Post-fetch result filtering.
//!
//! Stages apply in a fixed order, each operating on the previous stage's
//! output: entity-key matching, then contact-type prefix matching, then
//! contact-email membership. Entities left with no contacts are removed
//! entirely. The input set is cloned, never mutated.

use std::collections::HashSet;

use crate::contacts::{Contact, ResultSet, CONTACT_TYPE_FIELD};

/// Sentinel contact-type value disabling the type stage.
pub const ALL_CONTACT_TYPES: &str = "all";

/// Caller-supplied filter intents.
#[derive(Debug, Clone, Default)]
pub struct ContactFilters {
    /// Glob-or-substring pattern against entity names. Takes precedence over
    /// `fqdn_pattern` when both are given.
    pub name_pattern: Option<String>,
    /// Glob-or-substring pattern against entity FQDNs.
    pub fqdn_pattern: Option<String>,
    /// Contact-type prefixes, matched case-sensitively as supplied. The
    /// sentinel `"all"` disables the stage.
    pub contact_types: Vec<String>,
    /// Exact-membership email filter, applied only when present.
    pub contact_emails: Option<HashSet<String>>,
}

impl ContactFilters {
    /// Filters that keep everything.
    pub fn any() -> Self {
        Self {
            contact_types: vec![ALL_CONTACT_TYPES.to_string()],
            ..Self::default()
        }
    }
}

/// Apply the filter stages to a result set, returning a freshly built set.
pub fn filter_contacts(filters: &ContactFilters, results: &ResultSet) -> ResultSet {
    let mut results = results.clone();

    // Key filter: name pattern wins over FQDN pattern when both are present.
    if let Some(pattern) = filters.name_pattern.as_deref() {
        results.retain(|name, _| key_matches(name, pattern));
    } else if let Some(pattern) = filters.fqdn_pattern.as_deref() {
        results.retain(|fqdn, _| key_matches(fqdn, pattern));
    }

    if !filters
        .contact_types
        .iter()
        .any(|t| t == ALL_CONTACT_TYPES)
    {
        results = retain_contacts(results, |contact| {
            contact
                .get(CONTACT_TYPE_FIELD)
                .is_some_and(|contact_type| {
                    filters
                        .contact_types
                        .iter()
                        .any(|prefix| contact_type.starts_with(prefix.as_str()))
                })
        });
    }

    if let Some(emails) = &filters.contact_emails {
        results = retain_contacts(results, |contact| {
            contact.get("Email").is_some_and(|email| emails.contains(email))
        });
    }

    results
}

/// Glob match (fnmatch semantics) or substring containment. A pattern that
/// does not parse as a glob still participates as a plain substring.
fn key_matches(key: &str, pattern: &str) -> bool {
    let globbed = glob::Pattern::new(pattern)
        .map(|p| p.matches(key))
        .unwrap_or(false);
    globbed || key.contains(pattern)
}

/// Keep only contacts satisfying `keep`, dropping entities left empty.
fn retain_contacts(results: ResultSet, keep: impl Fn(&Contact) -> bool) -> ResultSet {
    let mut kept = ResultSet::new();
    for (entity, contacts) in results {
        let survivors: Vec<Contact> = contacts.into_iter().filter(|c| keep(c)).collect();
        if !survivors.is_empty() {
            kept.insert(entity, survivors);
        }
    }
    kept
}
