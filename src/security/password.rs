//! Admin credential verification.
//!
//! An Argon2 PHC hash is the preferred form. A plaintext password is still
//! accepted for small deployments and compared in constant time.

use std::fmt;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use subtle::ConstantTimeEq;

use crate::config::AdminConfig;
use crate::error::StartupError;

/// The configured admin credential.
#[derive(Clone)]
pub enum AdminCredential {
    /// Argon2 PHC string.
    Hashed(String),
    /// Plaintext password.
    Plain(String),
}

impl AdminCredential {
    /// Build from config. `Ok(None)` means admin commands are disabled.
    pub fn from_config(config: &AdminConfig) -> Result<Option<Self>, StartupError> {
        if let Some(hash) = config.password_hash.as_deref().filter(|h| !h.is_empty()) {
            PasswordHash::new(hash)
                .map_err(|e| StartupError::InvalidCredential(e.to_string()))?;
            return Ok(Some(AdminCredential::Hashed(hash.to_owned())));
        }
        if let Some(password) = config.password.as_deref().filter(|p| !p.is_empty()) {
            tracing::warn!("admin password is stored in plaintext; prefer admin.password_hash");
            return Ok(Some(AdminCredential::Plain(password.to_owned())));
        }
        Ok(None)
    }

    /// Check an attempt against the credential.
    pub fn verify(&self, attempt: &str) -> bool {
        match self {
            AdminCredential::Hashed(phc) => match PasswordHash::new(phc) {
                Ok(hash) => Argon2::default()
                    .verify_password(attempt.as_bytes(), &hash)
                    .is_ok(),
                Err(_) => false,
            },
            AdminCredential::Plain(password) => {
                attempt.as_bytes().ct_eq(password.as_bytes()).into()
            }
        }
    }
}

impl fmt::Debug for AdminCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminCredential::Hashed(_) => f.write_str("AdminCredential::Hashed(..)"),
            AdminCredential::Plain(_) => f.write_str("AdminCredential::Plain(..)"),
        }
    }
}
