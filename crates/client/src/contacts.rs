//! Contact-list normalization.
//!
//! The two summary endpoints return structurally different but semantically
//! similar XML. In `rgsummary`, contacts hang off a resource:
//!
//! ```xml
//! <ContactLists>
//!   <ContactList>
//!     <ContactType>Administrative Contact</ContactType>
//!     <Contacts><Contact><Name>...</Name>...</Contact></Contacts>
//!   </ContactList>
//! </ContactLists>
//! ```
//!
//! In `vosummary`, the classification element is tagged `Type` and the
//! grouping element is itself a `ContactType`:
//!
//! ```xml
//! <ContactTypes>
//!   <ContactType>
//!     <Type>Miscellaneous Contact</Type>
//!     <Contacts><Contact>...</Contact></Contacts>
//!   </ContactType>
//! </ContactTypes>
//! ```
//!
//! Both shapes normalize to flat records tagged with a lowercased
//! `ContactType` field; the walk dispatches on the classification tag
//! actually observed, not on which endpoint was called.

use std::collections::BTreeMap;

use roxmltree::Node;
use tracing::{debug, error};

/// One normalized contact: an open, XML-driven set of string fields. Only
/// [`CONTACT_TYPE_FIELD`] is guaranteed present.
pub type Contact = BTreeMap<String, String>;

/// Entity key (resource name, FQDN, or VO name) → that entity's contacts in
/// document order.
pub type ResultSet = BTreeMap<String, Vec<Contact>>;

/// The one field every normalized contact carries.
pub const CONTACT_TYPE_FIELD: &str = "ContactType";

/// Contact types stored in Topology data. Nothing upstream restricts a
/// contact to one of these, so they are advisory (CLI help, validation).
pub const CONTACT_TYPES: [&str; 8] = [
    "administrative",
    "miscellaneous",
    "security",
    "submitter",
    "site",
    "local executive",
    "local operational",
    "local security",
];

fn element_children<'a, 'input>(
    node: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(Node::is_element)
}

fn text_of<'a>(node: Node<'a, '_>) -> &'a str {
    node.text().unwrap_or("")
}

/// Normalize one contact-list grouping element (either shape) into flat
/// records, preserving document order.
///
/// Siblings are walked in order; the most recent `ContactType`/`Type`
/// element sets the current classification, and each `Contacts` container
/// emits one record per child contact, pre-seeded with that classification
/// and extended with every sub-element's tag→text pair.
pub fn contact_list_info(contact_list: Node<'_, '_>) -> Vec<Contact> {
    let mut records = Vec::new();
    let mut current_type: Option<String> = None;
    for child in element_children(contact_list) {
        match child.tag_name().name() {
            "ContactType" | "Type" => {
                current_type = Some(text_of(child).to_lowercase());
            }
            "Contacts" => {
                let Some(contact_type) = current_type.as_deref() else {
                    // The upstream data always puts the classification first;
                    // a Contacts container without one carries no usable type.
                    debug!("skipping Contacts container with no preceding classification");
                    continue;
                };
                for contact in element_children(child) {
                    let mut record = Contact::new();
                    record.insert(CONTACT_TYPE_FIELD.to_string(), contact_type.to_string());
                    for field in element_children(contact) {
                        record.insert(
                            field.tag_name().name().to_string(),
                            text_of(field).to_string(),
                        );
                    }
                    records.push(record);
                }
            }
            _ => {}
        }
    }
    records
}

/// Walk a `VOSummary` document into a result set keyed by VO name.
///
/// VOs with no name or no contacts are skipped. An unexpected child tag is
/// non-fatal: it is logged and the walk aborts, returning an empty set.
pub fn vo_contact_results(root: Node<'_, '_>) -> ResultSet {
    let mut results = ResultSet::new();
    for vo in element_children(root) {
        if vo.tag_name().name() != "VO" {
            error!(
                tag = vo.tag_name().name(),
                "topology returned a non-VO element inside VO summary"
            );
            return ResultSet::new();
        }
        let mut name: Option<&str> = None;
        let mut contacts = Vec::new();
        for item in element_children(vo) {
            match item.tag_name().name() {
                "Name" => name = item.text(),
                "ContactTypes" => {
                    for contact_type in element_children(item) {
                        contacts.extend(contact_list_info(contact_type));
                    }
                }
                _ => {}
            }
        }
        if let Some(name) = name
            && !name.is_empty()
            && !contacts.is_empty()
        {
            results.insert(name.to_string(), contacts);
        }
    }
    results
}

/// Walk a `ResourceSummary` document into two parallel result sets, one
/// keyed by resource name and one by resource FQDN.
///
/// A resource contributes to whichever of the two keys it has a value for
/// (possibly both) and is skipped entirely when no contacts were found. An
/// unexpected child tag is logged and aborts the walk, returning two empty
/// sets.
pub fn resource_contact_results(root: Node<'_, '_>) -> (ResultSet, ResultSet) {
    let mut by_name = ResultSet::new();
    let mut by_fqdn = ResultSet::new();
    for group in element_children(root) {
        if group.tag_name().name() != "ResourceGroup" {
            error!(
                tag = group.tag_name().name(),
                "topology returned a non-resource-group element inside summary"
            );
            return (ResultSet::new(), ResultSet::new());
        }
        for resources in element_children(group) {
            if resources.tag_name().name() != "Resources" {
                continue;
            }
            for resource in element_children(resources) {
                let mut name: Option<&str> = None;
                let mut fqdn: Option<&str> = None;
                let mut contacts = Vec::new();
                for item in element_children(resource) {
                    match item.tag_name().name() {
                        "Name" => name = item.text(),
                        "FQDN" => fqdn = item.text(),
                        "ContactLists" => {
                            for contact_list in element_children(item) {
                                if contact_list.tag_name().name() == "ContactList" {
                                    contacts.extend(contact_list_info(contact_list));
                                }
                            }
                        }
                        _ => {}
                    }
                }
                if contacts.is_empty() {
                    continue;
                }
                if let Some(name) = name
                    && !name.is_empty()
                {
                    by_name.insert(name.to_string(), contacts.clone());
                }
                if let Some(fqdn) = fqdn
                    && !fqdn.is_empty()
                {
                    by_fqdn.insert(fqdn.to_string(), contacts);
                }
            }
        }
    }
    (by_name, by_fqdn)
}
