//! Secure data wrappers that are zeroized on drop.
//!
//! Access tokens, refresh tokens and the client secret are held in these so
//! they are cleared from memory and never show up in `Debug` output or logs.

use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A secure string wrapper that zeroizes its contents on drop.
#[derive(Clone, PartialEq, Eq, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SecureString(String);

impl SecureString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}
