use std::fmt;
use std::path::PathBuf;

use hyper::StatusCode;
use thiserror::Error;

/// Which half of the credential pair an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    Certificate,
    Key,
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialKind::Certificate => f.write_str("certificate"),
            CredentialKind::Key => f.write_str("key"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("could not find {kind} at {}", .path.display())]
    InvalidPath { kind: CredentialKind, path: PathBuf },
    #[error("could not read {kind} at {}: {source}", .path.display())]
    Unreadable {
        kind: CredentialKind,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no usable {kind} found in {}", .path.display())]
    MissingMaterial { kind: CredentialKind, path: PathBuf },
    #[error("malformed {kind} in {}: {detail}", .path.display())]
    Malformed {
        kind: CredentialKind,
        path: PathBuf,
        detail: String,
    },
    #[error("failed to read decryption password: {0}")]
    Prompt(std::io::Error),
    #[error("incorrect password, please try again")]
    IncorrectPassword,
    #[error("TLS configuration rejected credentials: {0}")]
    Tls(String),
}

/// Configuration mistakes in filter intents. Always fatal, and the message
/// carries the full list of valid values so the caller can self-correct.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("requested service {name} not known; known service names: {known}")]
    UnknownService { name: String, known: String },
    #[error("requested owner VO {name} not known; known VOs: {known}")]
    UnknownVo { name: String, known: String },
    #[error("invalid query URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid hostname override: {0}")]
    Host(String),
}

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("topology request failed (status {status}): {body}")]
    Http { status: StatusCode, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("topology returned invalid XML with root tag {0}")]
    UnexpectedRoot(String),
    #[error("topology returned a non-{expected} element ({found}) inside summary")]
    UnexpectedElement {
        expected: &'static str,
        found: String,
    },
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),
}

impl TopologyError {
    /// True for failures that a caller can fix by re-prompting for the key
    /// passphrase rather than treating as a network fault.
    pub fn is_password_failure(&self) -> bool {
        matches!(self, TopologyError::Auth(AuthError::IncorrectPassword))
    }
}
