//! Private key loading.
//!
//! The RSA key that signs assertions is read once, at construction, either
//! from a PEM file or from PEM bytes already in memory. Decoding goes through
//! the `KeyDecoder` trait so the file handling can be exercised without real
//! key material.

use std::fmt;
use std::path::{Path, PathBuf};

use jsonwebtoken::EncodingKey;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;

use crate::error::{AuthError, Result};

const PKCS1_PEM_LABEL: &str = "BEGIN RSA PRIVATE KEY";

/// Where the private key comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum PrivateKeySource {
    /// A PEM file on disk.
    Path(PathBuf),
    /// PEM bytes already in memory.
    Pem(Vec<u8>),
}

impl fmt::Debug for PrivateKeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Pem(bytes) => write!(f, "Pem({} bytes)", bytes.len()),
        }
    }
}

impl From<PathBuf> for PrivateKeySource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for PrivateKeySource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

/// A decoded key, ready for signing.
#[derive(Clone)]
pub struct SigningKey(EncodingKey);

impl SigningKey {
    /// Wrap an existing `EncodingKey`.
    #[must_use]
    pub const fn from_encoding_key(key: EncodingKey) -> Self {
        Self(key)
    }

    /// The underlying `jsonwebtoken` key.
    #[must_use]
    pub const fn encoding_key(&self) -> &EncodingKey {
        &self.0
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

/// Decodes PEM key material into a `SigningKey`.
pub trait KeyDecoder: Send + Sync {
    /// Decode `pem`, decrypting it with `passphrase` when one is given.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyDecode` if the key is malformed or the
    /// passphrase does not match.
    fn decode(&self, pem: &[u8], passphrase: Option<&[u8]>) -> Result<SigningKey>;
}

/// Decoder for RSA keys in PKCS#8 (plain or encrypted) or PKCS#1 PEM.
#[derive(Debug, Clone, Copy, Default)]
pub struct PemKeyDecoder;

impl KeyDecoder for PemKeyDecoder {
    fn decode(&self, pem: &[u8], passphrase: Option<&[u8]>) -> Result<SigningKey> {
        let pem = std::str::from_utf8(pem)
            .map_err(|e| AuthError::KeyDecode(format!("key is not PEM text: {e}")))?;

        let key = match passphrase {
            Some(passphrase) => RsaPrivateKey::from_pkcs8_encrypted_pem(pem, passphrase)
                .map_err(|e| AuthError::KeyDecode(format!("encrypted PKCS#8: {e}")))?,
            None if pem.contains(PKCS1_PEM_LABEL) => RsaPrivateKey::from_pkcs1_pem(pem)
                .map_err(|e| AuthError::KeyDecode(format!("PKCS#1: {e}")))?,
            None => RsaPrivateKey::from_pkcs8_pem(pem)
                .map_err(|e| AuthError::KeyDecode(format!("PKCS#8: {e}")))?,
        };

        let der = key
            .to_pkcs1_der()
            .map_err(|e| AuthError::KeyDecode(format!("re-encoding key: {e}")))?;

        Ok(SigningKey(EncodingKey::from_rsa_der(der.as_bytes())))
    }
}

/// Load the signing key from `source`.
///
/// A `Path` source is read once, in full, and decoded once with
/// `passphrase`. A `Pem` source skips the file read.
///
/// # Errors
///
/// Returns `AuthError::KeyRead` if the file cannot be read and
/// `AuthError::KeyDecode` if the key cannot be decoded.
pub fn load_private_key(
    source: &PrivateKeySource,
    passphrase: Option<&[u8]>,
    decoder: &dyn KeyDecoder,
) -> Result<SigningKey> {
    match source {
        PrivateKeySource::Path(path) => {
            tracing::debug!(path = %path.display(), "Reading private key");
            let pem = std::fs::read(path).map_err(|source| AuthError::KeyRead {
                path: path.clone(),
                source,
            })?;
            decoder.decode(&pem, passphrase)
        }
        PrivateKeySource::Pem(pem) => decoder.decode(pem, passphrase),
    }
}
