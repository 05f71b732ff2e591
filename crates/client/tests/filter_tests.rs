use std::collections::HashSet;

use topology_client::contacts::{Contact, ResultSet};
use topology_client::{filter_contacts, ContactFilters};

fn contact(fields: &[(&str, &str)]) -> Contact {
    fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn site_a() -> ResultSet {
    let mut results = ResultSet::new();
    results.insert(
        "siteA".to_string(),
        vec![
            contact(&[("ContactType", "administrative"), ("Email", "a@x.org")]),
            contact(&[("ContactType", "security"), ("Email", "b@x.org")]),
        ],
    );
    results
}

#[test]
fn contact_type_prefix_keeps_matching_contacts() {
    let filters = ContactFilters {
        contact_types: vec!["administrative".to_string()],
        ..ContactFilters::default()
    };
    let filtered = filter_contacts(&filters, &site_a());
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered["siteA"].len(), 1);
    assert_eq!(filtered["siteA"][0]["ContactType"], "administrative");
    assert_eq!(filtered["siteA"][0]["Email"], "a@x.org");
}

#[test]
fn entity_dropped_entirely_when_no_contact_survives() {
    let filters = ContactFilters {
        contact_types: vec!["miscellaneous".to_string()],
        ..ContactFilters::default()
    };
    assert!(filter_contacts(&filters, &site_a()).is_empty());
}

#[test]
fn all_sentinel_disables_the_type_stage() {
    let filters = ContactFilters::any();
    let filtered = filter_contacts(&filters, &site_a());
    assert_eq!(filtered["siteA"].len(), 2);
}

#[test]
fn input_is_never_mutated() {
    let original = site_a();
    let filters = ContactFilters {
        contact_types: vec!["security".to_string()],
        ..ContactFilters::default()
    };
    let _ = filter_contacts(&filters, &original);
    assert_eq!(original["siteA"].len(), 2);
}

#[test]
fn name_filter_takes_precedence_over_fqdn_filter() {
    let mut results = site_a();
    results.insert(
        "ce.siteb.example.org".to_string(),
        vec![contact(&[("ContactType", "administrative")])],
    );
    let filters = ContactFilters {
        name_pattern: Some("siteA".to_string()),
        // Would match the other entity; must be ignored.
        fqdn_pattern: Some("*.example.org".to_string()),
        contact_types: vec!["all".to_string()],
        ..ContactFilters::default()
    };
    let filtered = filter_contacts(&filters, &results);
    assert_eq!(filtered.len(), 1);
    assert!(filtered.contains_key("siteA"));
}

#[test]
fn key_filter_accepts_glob_or_substring() {
    let mut results = ResultSet::new();
    for key in ["ce.sitea.example.org", "xfer.sitea.example.org", "other.net"] {
        results.insert(
            key.to_string(),
            vec![contact(&[("ContactType", "administrative")])],
        );
    }
    let glob_filters = ContactFilters {
        fqdn_pattern: Some("*.sitea.example.org".to_string()),
        contact_types: vec!["all".to_string()],
        ..ContactFilters::default()
    };
    let filtered = filter_contacts(&glob_filters, &results);
    assert_eq!(filtered.len(), 2);

    let substring_filters = ContactFilters {
        fqdn_pattern: Some("sitea".to_string()),
        contact_types: vec!["all".to_string()],
        ..ContactFilters::default()
    };
    let filtered = filter_contacts(&substring_filters, &results);
    assert_eq!(filtered.len(), 2);
}

#[test]
fn email_filter_is_exact_membership() {
    let filters = ContactFilters {
        contact_types: vec!["all".to_string()],
        contact_emails: Some(HashSet::from(["b@x.org".to_string()])),
        ..ContactFilters::default()
    };
    let filtered = filter_contacts(&filters, &site_a());
    assert_eq!(filtered["siteA"].len(), 1);
    assert_eq!(filtered["siteA"][0]["Email"], "b@x.org");
}

#[test]
fn email_filter_drops_contacts_without_an_email_field() {
    let mut results = ResultSet::new();
    results.insert(
        "siteC".to_string(),
        vec![contact(&[("ContactType", "administrative")])],
    );
    let filters = ContactFilters {
        contact_types: vec!["all".to_string()],
        contact_emails: Some(HashSet::from(["a@x.org".to_string()])),
        ..ContactFilters::default()
    };
    assert!(filter_contacts(&filters, &results).is_empty());
}

#[test]
fn stages_compose_in_order() {
    let mut results = site_a();
    results.insert(
        "siteB".to_string(),
        vec![contact(&[("ContactType", "administrative"), ("Email", "a@x.org")])],
    );
    let filters = ContactFilters {
        name_pattern: Some("siteA".to_string()),
        contact_types: vec!["administrative".to_string()],
        contact_emails: Some(HashSet::from(["a@x.org".to_string()])),
        ..ContactFilters::default()
    };
    let filtered = filter_contacts(&filters, &results);
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered["siteA"].len(), 1);
    assert_eq!(filtered["siteA"][0]["Email"], "a@x.org");
}
