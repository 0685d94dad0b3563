//! Provider credentials kept in the system keyring

use keyring::Entry;
use thiserror::Error;

use super::credentials::clean_value;

const SERVICE_NAME: &str = "org.sushi-stats.cli";

#[derive(Error, Debug)]
pub enum KeyringError {
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
    #[error("Credential not found")]
    NotFound,
    #[error("Credential names look like environment variables (A-Z, 0-9, _): {0:?}")]
    InvalidKey(String),
    #[error("Refusing to store an empty value for {0}")]
    EmptyValue(String),
}

/// Fallback store for provider credentials that are not in the environment.
///
/// Entries live under one service and are named after the environment
/// variable they stand in for, e.g. `EBSCO_CUSTOMER_ID`, so a value can move
/// between `.env` and the keyring without touching the provider table.
/// Values are stored cleaned the same way environment values are read.
pub struct SecureStorage {
    service: &'static str,
}

impl SecureStorage {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME,
        }
    }

    pub fn store(&self, key: &str, value: &str) -> Result<(), KeyringError> {
        validate_key(key)?;
        let value = clean_value(value);
        if value.is_empty() {
            return Err(KeyringError::EmptyValue(key.to_string()));
        }
        Entry::new(self.service, key)?.set_password(&value)?;
        tracing::debug!("Stored credential {} in keyring", key);
        Ok(())
    }

    /// Stored value for `key`, `None` when there is no entry
    pub fn load(&self, key: &str) -> Result<Option<String>, KeyringError> {
        validate_key(key)?;
        match Entry::new(self.service, key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(KeyringError::Keyring(e)),
        }
    }

    pub fn delete(&self, key: &str) -> Result<(), KeyringError> {
        validate_key(key)?;
        match Entry::new(self.service, key)?.delete_credential() {
            Ok(()) => {
                tracing::debug!("Deleted credential {} from keyring", key);
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Err(KeyringError::NotFound),
            Err(e) => Err(KeyringError::Keyring(e)),
        }
    }
}

impl Default for SecureStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_key(key: &str) -> Result<(), KeyringError> {
    let valid = !key.is_empty()
        && !key.starts_with(|c: char| c.is_ascii_digit())
        && key
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(KeyringError::InvalidKey(key.to_string()))
    }
}
