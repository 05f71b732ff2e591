//! Authenticated HTTP session.
//!
//! Wraps a hyper client whose connector presents the resolved X.509
//! credentials for mutual TLS. Established lazily on the first request and
//! reused for the remainder of the process.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::StatusCode;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use pkcs8::EncryptedPrivateKeyInfo;
use rustls::{ClientConfig, RootCertStore};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tracing::debug;
use url::Url;

use crate::credentials::Credentials;
use crate::error::{AuthError, CredentialKind, TopologyError};

const ENCRYPTED_KEY_TAG: &str = "ENCRYPTED PRIVATE KEY";

/// Opaque authenticated-connection context bound to one [`Credentials`]
/// value.
pub struct Session {
    client: Client<HttpsConnector<HttpConnector>, Empty<Bytes>>,
}

impl Session {
    /// Load the credential pair, decrypting the key if needed, and build the
    /// client-authenticated connector.
    pub fn establish(credentials: &Credentials) -> Result<Self, AuthError> {
        let certs = load_certificates(credentials.cert())?;
        let key = load_private_key(credentials.key(), credentials.passphrase())?;

        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls = ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| AuthError::Tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_client_auth_cert(certs, key)
        .map_err(|e| AuthError::Tls(e.to_string()))?;

        let connector = HttpsConnectorBuilder::new()
            .with_tls_config(tls)
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(connector);
        debug!(cert = %credentials.cert().display(), "session established");
        Ok(Self { client })
    }

    /// Blocking-style GET: one request, one fully collected response body.
    pub async fn get(&self, url: &Url) -> Result<(StatusCode, String), TopologyError> {
        let uri: hyper::Uri = url
            .as_str()
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| TopologyError::Network(e.to_string()))?;
        let response = self.client.get(uri).await.map_err(|e| {
            if wrong_passphrase_signature(&e) {
                TopologyError::Auth(AuthError::IncorrectPassword)
            } else {
                TopologyError::Network(e.to_string())
            }
        })?;
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| TopologyError::Network(e.to_string()))?
            .to_bytes();
        Ok((status, String::from_utf8_lossy(&body).into_owned()))
    }
}

/// Best-effort detection of a wrongly decrypted key at connect time: the
/// transport surfaces it as an io error with OS code EINVAL somewhere in the
/// source chain. Anything else is a plain network fault.
fn wrong_passphrase_signature(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>()
            && io_err.raw_os_error() == Some(nix::libc::EINVAL)
        {
            return true;
        }
        current = e.source();
    }
    false
}

fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, AuthError> {
    let data = fs::read(path).map_err(|source| AuthError::Unreadable {
        kind: CredentialKind::Certificate,
        path: path.to_path_buf(),
        source,
    })?;
    let certs = rustls_pemfile::certs(&mut io::Cursor::new(&data))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AuthError::Malformed {
            kind: CredentialKind::Certificate,
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
    if certs.is_empty() {
        return Err(AuthError::MissingMaterial {
            kind: CredentialKind::Certificate,
            path: path.to_path_buf(),
        });
    }
    Ok(certs)
}

/// Read the private key, handling both plain PEM keys (PKCS#8/PKCS#1/SEC1,
/// as found in proxy files) and passphrase-encrypted PKCS#8 blocks. A failed
/// decryption is reported as an incorrect password, not a parse error.
fn load_private_key(path: &Path, passphrase: &str) -> Result<PrivateKeyDer<'static>, AuthError> {
    let text = fs::read_to_string(path).map_err(|source| AuthError::Unreadable {
        kind: CredentialKind::Key,
        path: path.to_path_buf(),
        source,
    })?;

    let blocks = pem::parse_many(&text).unwrap_or_default();
    if let Some(block) = blocks.iter().find(|b| b.tag() == ENCRYPTED_KEY_TAG) {
        let info =
            EncryptedPrivateKeyInfo::try_from(block.contents()).map_err(|e| AuthError::Malformed {
                kind: CredentialKind::Key,
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        let document = info
            .decrypt(passphrase)
            .map_err(|_| AuthError::IncorrectPassword)?;
        return Ok(PrivatePkcs8KeyDer::from(document.as_bytes().to_vec()).into());
    }

    rustls_pemfile::private_key(&mut io::Cursor::new(text.as_bytes()))
        .map_err(|e| AuthError::Malformed {
            kind: CredentialKind::Key,
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?
        .ok_or_else(|| AuthError::MissingMaterial {
            kind: CredentialKind::Key,
            path: path.to_path_buf(),
        })
}
