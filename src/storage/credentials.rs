//! Credential lookup for provider descriptors
//!
//! Order: process environment (after `.env` loading), then a keyring entry
//! with the same name. A credential found nowhere resolves to an empty value.

use std::collections::HashMap;
use std::fmt;

use super::keyring::SecureStorage;

/// Where a credential value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialOrigin {
    Environment,
    Keychain,
    Fixed,
}

impl fmt::Display for CredentialOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CredentialOrigin::Environment => "environment",
            CredentialOrigin::Keychain => "keychain",
            CredentialOrigin::Fixed => "fixed",
        })
    }
}

enum CredentialSource {
    Environment { keychain: bool },
    Fixed(HashMap<String, String>),
}

pub struct CredentialResolver {
    source: CredentialSource,
}

impl CredentialResolver {
    /// Environment first, keychain as fallback
    pub fn from_env() -> Self {
        Self {
            source: CredentialSource::Environment { keychain: true },
        }
    }

    /// Resolve from a fixed map; nothing outside it is consulted
    pub fn fixed(values: HashMap<String, String>) -> Self {
        Self {
            source: CredentialSource::Fixed(values),
        }
    }

    /// Credential value for `key`, or an empty string when it is not set
    pub fn resolve(&self, key: &str) -> String {
        match self.lookup(key) {
            Some((value, origin)) => {
                tracing::trace!("Credential {} resolved from {}", key, origin);
                value
            }
            None => {
                tracing::warn!("Credential {} is not set; using an empty value", key);
                String::new()
            }
        }
    }

    pub fn lookup(&self, key: &str) -> Option<(String, CredentialOrigin)> {
        match &self.source {
            CredentialSource::Environment { keychain } => {
                let keychain = *keychain;
                Self::lookup_env_with(key, || {
                    if keychain {
                        Self::load_keychain_value(key)
                    } else {
                        None
                    }
                })
            }
            CredentialSource::Fixed(values) => values
                .get(key)
                .map(|value| clean_value(value))
                .filter(|value| !value.is_empty())
                .map(|value| (value, CredentialOrigin::Fixed)),
        }
    }

    fn lookup_env_with<F>(key: &str, load_keychain: F) -> Option<(String, CredentialOrigin)>
    where
        F: FnOnce() -> Option<String>,
    {
        if let Ok(value) = std::env::var(key) {
            let cleaned = clean_value(&value);
            if !cleaned.is_empty() {
                return Some((cleaned, CredentialOrigin::Environment));
            }
        }

        let keychain_value = load_keychain()?;
        let cleaned = clean_value(&keychain_value);
        if cleaned.is_empty() {
            None
        } else {
            Some((cleaned, CredentialOrigin::Keychain))
        }
    }

    fn load_keychain_value(key: &str) -> Option<String> {
        match SecureStorage::new().load(key) {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!("Failed to read {} from keychain: {}", key, err);
                None
            }
        }
    }
}

/// Trim whitespace and one pair of surrounding quotes
pub fn clean_value(value: &str) -> String {
    let mut value = value.trim().to_string();

    if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        value = value[1..value.len() - 1].to_string();
    }

    value.trim().to_string()
}
