//! TLS material for pooled connections.
//!
//! Follows libpq's `sslmode` meanings: `require` encrypts without verifying the
//! server unless a root certificate is given, `verify-ca` checks the chain but not
//! the host name, `verify-full` checks both.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use native_tls::{Certificate, Identity, TlsConnector};
use postgres_native_tls::MakeTlsConnector;
use serde::Deserialize;
use tokio_postgres::config::SslMode;

use crate::error::StoreError;

/// File paths and mode for TLS, as configured or read from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TlsSettings {
    pub root_cert: Option<String>,
    pub cert: Option<String>,
    /// PKCS#8 private key, PEM or DER.
    pub key: Option<String>,
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verification {
    None,
    Chain,
    Full,
}

impl TlsSettings {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root_cert.is_none() && self.cert.is_none() && self.key.is_none() && self.mode.is_none()
    }

    /// The driver-level mode plus how strictly the server certificate is checked.
    fn parse_mode(&self) -> Result<(SslMode, Verification), StoreError> {
        let verify_if_rooted = if self.root_cert.is_some() {
            Verification::Chain
        } else {
            Verification::None
        };
        match self.mode.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("prefer" | "allow") => Ok((SslMode::Prefer, Verification::None)),
            Some("disable") => Ok((SslMode::Disable, Verification::None)),
            Some("require") => Ok((SslMode::Require, verify_if_rooted)),
            Some("verify-ca") => Ok((SslMode::Require, Verification::Chain)),
            Some("verify-full") => Ok((SslMode::Require, Verification::Full)),
            Some(other) => Err(StoreError::TlsError(format!("unknown sslmode '{other}'"))),
        }
    }

    /// Build the TLS connector and driver mode, or `None` when TLS is not configured.
    ///
    /// # Errors
    /// Returns `StoreError::TlsError` for unreadable files, malformed certificates or
    /// keys, an unknown mode, or a client certificate without its key (or the reverse).
    pub fn connector(&self) -> Result<Option<(SslMode, MakeTlsConnector)>, StoreError> {
        if self.is_empty() {
            return Ok(None);
        }
        let (mode, verification) = self.parse_mode()?;
        if mode == SslMode::Disable {
            return Ok(Some((mode, MakeTlsConnector::new(TlsConnector::new()?))));
        }

        let mut builder = TlsConnector::builder();
        if let Some(path) = &self.root_cert {
            let bytes = read_material(path, "root certificate")?;
            let cert = if is_pem(&bytes) {
                Certificate::from_pem(&bytes)?
            } else {
                Certificate::from_der(&bytes)?
            };
            builder.add_root_certificate(cert);
        }
        match (&self.cert, &self.key) {
            (Some(cert_path), Some(key_path)) => {
                let cert = to_pem(read_material(cert_path, "client certificate")?, "CERTIFICATE");
                let key = to_pem(read_material(key_path, "client key")?, "PRIVATE KEY");
                builder.identity(Identity::from_pkcs8(&cert, &key)?);
            }
            (None, None) => {}
            _ => {
                return Err(StoreError::TlsError(
                    "client certificate and client key must be configured together".into(),
                ));
            }
        }
        match verification {
            Verification::None => {
                builder.danger_accept_invalid_certs(true);
                builder.danger_accept_invalid_hostnames(true);
            }
            Verification::Chain => {
                builder.danger_accept_invalid_hostnames(true);
            }
            Verification::Full => {}
        }

        Ok(Some((mode, MakeTlsConnector::new(builder.build()?))))
    }
}

fn read_material(path: &str, what: &str) -> Result<Vec<u8>, StoreError> {
    std::fs::read(path).map_err(|e| StoreError::TlsError(format!("could not read {what} '{path}': {e}")))
}

fn is_pem(bytes: &[u8]) -> bool {
    bytes.trim_ascii_start().starts_with(b"-----BEGIN")
}

/// Wrap DER bytes in a PEM envelope; PEM input is returned unchanged.
fn to_pem(bytes: Vec<u8>, label: &str) -> Vec<u8> {
    if is_pem(&bytes) {
        return bytes;
    }
    let encoded = STANDARD.encode(&bytes);
    let mut pem = format!("-----BEGIN {label}-----\n");
    for chunk in encoded.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(chunk));
        pem.push('\n');
    }
    pem.push_str(&format!("-----END {label}-----\n"));
    pem.into_bytes()
}
