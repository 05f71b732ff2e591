use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use nix::unistd::Uid;

use crate::error::{AuthError, CredentialKind};

/// Host credential pair used by privileged (root) callers.
pub const HOST_CERT_PATH: &str = "/etc/grid-security/hostcert.pem";
pub const HOST_KEY_PATH: &str = "/etc/grid-security/hostkey.pem";

/// Environment variable overriding the computed default for both halves.
pub const X509_USER_PROXY: &str = "X509_USER_PROXY";

/// A validated certificate/key pair plus the key's decryption passphrase.
///
/// Resolved once per process; the passphrase lives only in memory and is
/// redacted from `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    cert: PathBuf,
    key: PathBuf,
    passphrase: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("cert", &self.cert)
            .field("key", &self.key)
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Non-interactive constructor. Both paths must exist; the checks are
    /// independent so the error names the specific missing file.
    pub fn new(
        cert: impl Into<PathBuf>,
        key: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let cert = cert.into();
        let key = key.into();
        if !cert.exists() {
            return Err(AuthError::InvalidPath {
                kind: CredentialKind::Certificate,
                path: cert,
            });
        }
        if !key.exists() {
            return Err(AuthError::InvalidPath {
                kind: CredentialKind::Key,
                path: key,
            });
        }
        Ok(Self {
            cert,
            key,
            passphrase: passphrase.into(),
        })
    }

    /// Resolve credentials for the current process: privilege-dependent
    /// defaults, then the `X509_USER_PROXY` override, then explicit paths,
    /// then an interactive (not echoed) passphrase prompt.
    pub fn resolve(
        explicit_cert: Option<&Path>,
        explicit_key: Option<&Path>,
    ) -> Result<Self, AuthError> {
        let proxy = env::var_os(X509_USER_PROXY).map(PathBuf::from);
        let (cert, key) = resolve_paths(
            Uid::effective().as_raw(),
            proxy.as_deref(),
            explicit_cert,
            explicit_key,
        );
        // Validate before prompting so a bad path fails fast.
        if !cert.exists() {
            return Err(AuthError::InvalidPath {
                kind: CredentialKind::Certificate,
                path: cert,
            });
        }
        if !key.exists() {
            return Err(AuthError::InvalidPath {
                kind: CredentialKind::Key,
                path: key,
            });
        }
        let passphrase =
            rpassword::prompt_password("decryption password: ").map_err(AuthError::Prompt)?;
        Ok(Self {
            cert,
            key,
            passphrase,
        })
    }

    pub fn cert(&self) -> &Path {
        &self.cert
    }

    pub fn key(&self) -> &Path {
        &self.key
    }

    pub(crate) fn passphrase(&self) -> &str {
        &self.passphrase
    }
}

/// Pure precedence logic behind [`Credentials::resolve`].
///
/// Defaults depend on privilege: the fixed host pair for euid 0, otherwise
/// the per-user proxy file for both halves. A proxy override replaces both
/// defaults; explicit paths win last, independently for cert and key.
pub fn resolve_paths(
    euid: u32,
    proxy_override: Option<&Path>,
    explicit_cert: Option<&Path>,
    explicit_key: Option<&Path>,
) -> (PathBuf, PathBuf) {
    let (mut cert, mut key) = if euid == 0 {
        (PathBuf::from(HOST_CERT_PATH), PathBuf::from(HOST_KEY_PATH))
    } else {
        let proxy = PathBuf::from(format!("/tmp/x509up_u{euid}"));
        (proxy.clone(), proxy)
    };
    if let Some(proxy) = proxy_override {
        cert = proxy.to_path_buf();
        key = proxy.to_path_buf();
    }
    if let Some(explicit) = explicit_cert {
        cert = explicit.to_path_buf();
    }
    if let Some(explicit) = explicit_key {
        key = explicit.to_path_buf();
    }
    (cert, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privileged_caller_gets_host_pair() {
        let (cert, key) = resolve_paths(0, None, None, None);
        assert_eq!(cert, PathBuf::from(HOST_CERT_PATH));
        assert_eq!(key, PathBuf::from(HOST_KEY_PATH));
    }

    #[test]
    fn unprivileged_caller_gets_user_proxy_for_both() {
        let (cert, key) = resolve_paths(1000, None, None, None);
        assert_eq!(cert, PathBuf::from("/tmp/x509up_u1000"));
        assert_eq!(key, cert);
    }

    #[test]
    fn proxy_override_replaces_both_defaults() {
        let proxy = Path::new("/run/user/1000/proxy.pem");
        let (cert, key) = resolve_paths(1000, Some(proxy), None, None);
        assert_eq!(cert, proxy);
        assert_eq!(key, proxy);
    }

    #[test]
    fn explicit_paths_win_independently() {
        let proxy = Path::new("/run/user/1000/proxy.pem");
        let cert_arg = Path::new("/home/u/cert.pem");
        let (cert, key) = resolve_paths(1000, Some(proxy), Some(cert_arg), None);
        assert_eq!(cert, cert_arg);
        assert_eq!(key, proxy);

        let key_arg = Path::new("/home/u/key.pem");
        let (cert, key) = resolve_paths(0, None, None, Some(key_arg));
        assert_eq!(cert, PathBuf::from(HOST_CERT_PATH));
        assert_eq!(key, key_arg);
    }
}
