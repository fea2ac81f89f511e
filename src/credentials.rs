// credentials.rs - API key selection
//! The pipeline only ever asks "is a key selected?". The raw key is read at
//! request time by the HTTP layer and nowhere else.

use std::fmt;
use std::io::{IsTerminal, Write};
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("No terminal available to prompt for an API key")]
    NoTerminal,
    #[error("Failed to read API key: {0}")]
    Io(#[from] std::io::Error),
}

pub trait CredentialProvider: Send + Sync {
    /// Whether a usable key has been selected
    fn has_key(&self) -> bool;

    /// Ask the user to select a key. Returns whether one is now present.
    fn select_key(&self) -> Result<bool, CredentialError>;

    /// Key injected into outgoing requests
    fn api_key(&self) -> Option<String>;
}

/// Process-local key holder seeded from the environment
pub struct Keyring {
    key: RwLock<Option<String>>,
}

impl Keyring {
    pub fn new(initial: Option<String>) -> Self {
        let key = initial.filter(|k| !k.trim().is_empty());
        Self { key: RwLock::new(key) }
    }

    pub fn empty() -> Self {
        Self::new(None)
    }
}

impl fmt::Debug for Keyring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyring")
            .field("has_key", &self.has_key())
            .finish()
    }
}

impl CredentialProvider for Keyring {
    fn has_key(&self) -> bool {
        self.key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn select_key(&self) -> Result<bool, CredentialError> {
        if !std::io::stdin().is_terminal() {
            return Err(CredentialError::NoTerminal);
        }

        println!("Veo generation requires a paid API key from a Google Cloud project.");
        println!("See https://ai.google.dev/gemini-api/docs/billing");
        print!("Gemini API key: ");
        std::io::stdout().flush()?;
        let entered = rpassword::read_password()?;
        let entered = entered.trim().to_string();

        let mut key = self.key.write().unwrap_or_else(PoisonError::into_inner);
        if !entered.is_empty() {
            *key = Some(entered);
            tracing::info!("🔑 API key selected");
        }
        Ok(key.is_some())
    }

    fn api_key(&self) -> Option<String> {
        self.key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_key_counts_as_missing() {
        assert!(!Keyring::new(Some("   ".into())).has_key());
        assert!(!Keyring::empty().has_key());
        assert!(Keyring::new(Some("abc".into())).has_key());
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let keyring = Keyring::new(Some("super-secret".into()));
        let printed = format!("{:?}", keyring);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("has_key: true"));
    }
}
