//! Storage utilities for provider credentials

pub mod credentials;
pub mod keyring;

// Re-export commonly used items
pub use self::credentials::{CredentialOrigin, CredentialResolver};
pub use self::keyring::SecureStorage;
