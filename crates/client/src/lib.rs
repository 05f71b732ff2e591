//! Client-side access layer for the OSG topology directory service.
//!
//! Authenticates with an X.509 client certificate, issues parameterized
//! XML-returning queries against the fixed VO-summary and
//! resource-group-summary endpoints, normalizes the two contact-list XML
//! shapes into flat records, and filters the results by entity pattern,
//! contact type, and contact email.
//!
//! The intended consumers are command-line tools that need contact lists for
//! virtual organizations or grid resources; `topology-contacts` in this
//! crate is one such thin wrapper.

pub mod client;
pub mod contacts;
pub mod credentials;
pub mod error;
pub mod filter;
pub mod proxy;
pub mod query;
pub mod session;

pub use client::{ClientOptions, TopologyClient, VoMap};
pub use contacts::{Contact, ResultSet, CONTACT_TYPES};
pub use credentials::Credentials;
pub use error::{AuthError, QueryError, TopologyError};
pub use filter::{filter_contacts, ContactFilters};
pub use query::{Endpoints, SummaryKind};
