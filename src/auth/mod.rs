//! # Authentication Gate
//!
//! Every HTTP request must carry `Authorization: Basic base64(user:password)`.
//! The credential store holds one `user:hex-hash` line per operator, where
//! the hash is `SHA-224("arcom" + user + password)` in lowercase hex. The
//! password never leaves this module and is never logged.
//!
//! The [`Rejection`] reason carries the user id when one could be decoded;
//! the router reports it to the `security` log target. Clients only ever
//! see a generic 401.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::{debug, error, info, warn};
use sha2::{Digest, Sha224};
use thiserror::Error;

use crate::logutil::escape_log;

/// Salt prepended to every credential hash.
pub const SALT_PREFIX: &str = "arcom";

/// Hex encoded `SHA-224(SALT_PREFIX + user + password)`.
pub fn credential_hash(user: &str, password: &str) -> String {
    let mut hasher = Sha224::new();
    hasher.update(SALT_PREFIX.as_bytes());
    hasher.update(user.as_bytes());
    hasher.update(password.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Why a request was refused. Internal only; clients see the same 401.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("no Authorization header")]
    Missing,
    #[error("unsupported authorization scheme")]
    Scheme,
    #[error("malformed Basic credentials")]
    Malformed,
    #[error("unknown user {}", escape_log(.0))]
    UnknownUser(String),
    #[error("bad password for {}", escape_log(.0))]
    Mismatch(String),
}

/// Users and their salted hashes.
#[derive(Debug, Default, Clone)]
pub struct CredentialTable {
    users: HashMap<String, String>,
}

impl CredentialTable {
    /// Parse `user:hash` lines. Blank lines and `#` comments are skipped;
    /// lines without a colon are ignored with a warning.
    pub fn parse(text: &str) -> Self {
        let mut table = Self::default();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once(':') {
                Some((user, hash)) if !user.is_empty() => {
                    table.insert(user, &hash.trim().to_ascii_lowercase());
                }
                _ => warn!("Skipping malformed credential line {}", lineno + 1),
            }
        }
        table
    }

    /// Read the credential store; a missing file yields an empty table that
    /// rejects everyone.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let table = Self::parse(&text);
                info!(
                    "Loaded {} credential(s) from {}",
                    table.len(),
                    path.display()
                );
                Ok(table)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                error!(
                    "Password file {} not found, all requests will be refused",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow!(
                "Failed to read password file {}: {}",
                path.display(),
                e
            )),
        }
    }

    pub fn insert(&mut self, user: &str, hash: &str) {
        self.users.insert(user.to_string(), hash.to_string());
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn hash_for(&self, user: &str) -> Option<&str> {
        self.users.get(user).map(String::as_str)
    }
}

pub struct AuthGate {
    table: CredentialTable,
}

impl AuthGate {
    pub fn new(table: CredentialTable) -> Self {
        Self { table }
    }

    /// True when `header` carries valid credentials.
    pub fn verify(&self, header: Option<&str>) -> bool {
        self.authenticate(header).is_ok()
    }

    /// Check an `Authorization` header value, returning the user id.
    ///
    /// Refusals are not logged here; the caller knows the peer and path.
    pub fn authenticate(&self, header: Option<&str>) -> Result<String, Rejection> {
        let user = self.check(header)?;
        debug!(target: "security", "Authenticated {}", escape_log(&user));
        Ok(user)
    }

    fn check(&self, header: Option<&str>) -> Result<String, Rejection> {
        let header = header.map(str::trim).ok_or(Rejection::Missing)?;
        let (scheme, encoded) = header.split_once(' ').ok_or(Rejection::Scheme)?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return Err(Rejection::Scheme);
        }

        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|_| Rejection::Malformed)?;
        let decoded = String::from_utf8(decoded).map_err(|_| Rejection::Malformed)?;
        let (user, password) = decoded.split_once(':').ok_or(Rejection::Malformed)?;

        let expected = self
            .table
            .hash_for(user)
            .ok_or_else(|| Rejection::UnknownUser(user.to_string()))?;
        let actual = credential_hash(user, password);
        if constant_time_eq(actual.as_bytes(), expected.as_bytes()) {
            Ok(user.to_string())
        } else {
            Err(Rejection::Mismatch(user.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const N0CALL_HASH: &str = "2b0ec4ec25af88956d87f35393cef44180f8e9048be50ad77d6265e2";

    fn gate() -> AuthGate {
        AuthGate::new(CredentialTable::parse(&format!(
            "# operators\n\nN0CALL:{N0CALL_HASH}\nKD7DK:99b2bd1ca90efea685471d766c51435dfab8763fabba86ab7e9743e5\n"
        )))
    }

    #[test]
    fn hash_is_salted_sha224_hex() {
        assert_eq!(credential_hash("N0CALL", "hunter2"), N0CALL_HASH);
        assert_eq!(
            credential_hash("W1ABC", "password"),
            "a286b6c2c14bc04ff9ac7d27ab62171f5d74d36c26a0459fa983d6a5"
        );
    }

    #[test]
    fn valid_credentials_pass() {
        let gate = gate();
        assert_eq!(
            gate.authenticate(Some("Basic TjBDQUxMOmh1bnRlcjI=")),
            Ok("N0CALL".to_string())
        );
        assert!(gate.verify(Some("basic TjBDQUxMOmh1bnRlcjI=")));
    }

    #[test]
    fn password_may_contain_colons() {
        assert_eq!(
            gate().authenticate(Some("Basic S0Q3REs6czNjcmV0OndpdGg6Y29sb25z")),
            Ok("KD7DK".to_string())
        );
    }

    #[test]
    fn rejections_do_not_panic() {
        let gate = gate();
        assert_eq!(gate.authenticate(None), Err(Rejection::Missing));
        assert_eq!(
            gate.authenticate(Some("Bearer TjBDQUxMOmh1bnRlcjI=")),
            Err(Rejection::Scheme)
        );
        assert_eq!(gate.authenticate(Some("Basic")), Err(Rejection::Scheme));
        assert_eq!(
            gate.authenticate(Some("Basic !!!not-base64")),
            Err(Rejection::Malformed)
        );
        assert_eq!(
            gate.authenticate(Some("Basic bm9jb2xvbg==")),
            Err(Rejection::Malformed)
        );
        assert_eq!(
            gate.authenticate(Some("Basic TjBDQUxMOndyb25n")),
            Err(Rejection::Mismatch("N0CALL".to_string()))
        );
        assert_eq!(
            gate.authenticate(Some("Basic Tk9CT0RZOmh1bnRlcjI=")),
            Err(Rejection::UnknownUser("NOBODY".to_string()))
        );
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let table = CredentialTable::parse("nocolon\n:orphan\nW1ABC:ABCDEF\n");
        assert_eq!(table.len(), 1);
        assert_eq!(table.hash_for("W1ABC"), Some("abcdef"));
    }

    #[test]
    fn missing_password_file_refuses_everyone() {
        let dir = TempDir::new().unwrap();
        let table = CredentialTable::load(&dir.path().join("arcom.passwd")).unwrap();
        assert!(table.is_empty());
        assert!(!AuthGate::new(table).verify(Some("Basic TjBDQUxMOmh1bnRlcjI=")));
    }

    #[test]
    fn password_file_loads_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("arcom.passwd");
        std::fs::write(&path, format!("N0CALL:{N0CALL_HASH}\n")).unwrap();
        let gate = AuthGate::new(CredentialTable::load(&path).unwrap());
        assert!(gate.verify(Some("Basic TjBDQUxMOmh1bnRlcjI=")));
    }
}
