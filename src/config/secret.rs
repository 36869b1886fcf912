//! Secure credential handling using the secrecy crate
//!
//! Account keys and client secrets are held in [`SecretString`], which zeros
//! its memory on drop, redacts itself in `Debug` output and must be opened
//! with `expose_secret()`.
//!
//! # Example
//!
//! ```rust
//! use fhir_datastore::config::secret_string;
//! use secrecy::ExposeSecret;
//!
//! let key = secret_string("c2VjcmV0LWtleQ==".to_string());
//! assert_eq!(key.expose_secret().as_ref(), "c2VjcmV0LWtleQ==");
//! println!("{:?}", key); // Secret([REDACTED ...])
//! ```

use base64::{engine::general_purpose::STANDARD, Engine as _};
use secrecy::{CloneableSecret, DebugSecret, Secret, SerializableSecret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

/// Newtype wrapper for String that implements the required traits for Secret
#[derive(Clone, Debug, Zeroize)]
#[zeroize(drop)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}
impl SerializableSecret for SecretValue {}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        SecretValue(s)
    }
}

impl PartialEq<str> for SecretValue {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl AsRef<str> for SecretValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl SecretValue {
    /// Check if the secret value is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decodes a base64 account key into signing bytes
    ///
    /// The decoded buffer is zeroized when dropped.
    pub fn decode_base64(&self) -> Result<Zeroizing<Vec<u8>>, base64::DecodeError> {
        STANDARD.decode(self.0.trim()).map(Zeroizing::new)
    }

    /// Short non-reversible identifier, safe to log
    ///
    /// Lets operators tell which key is configured without exposing it.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        digest[..4].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl Serialize for SecretValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretValue)
    }
}

/// A string that is zeroized on drop and redacted in Debug output
pub type SecretString = Secret<SecretValue>;

/// Wraps a String as a [`SecretString`]
#[inline]
pub fn secret_string(value: String) -> SecretString {
    Secret::new(SecretValue::from(value))
}

/// Wraps an optional String as a [`SecretString`]
///
/// ```rust
/// use fhir_datastore::config::secret_string_opt;
///
/// assert!(secret_string_opt(Some("client-secret".to_string())).is_some());
/// assert!(secret_string_opt(None).is_none());
/// ```
#[inline]
pub fn secret_string_opt(value: Option<String>) -> Option<SecretString> {
    value.map(secret_string)
}
