//! Decoy Vault - Opaque Identifiers
//!
//! Stored files are named by random tokens that say nothing about the
//! original file name or its content.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{VaultError, VaultResult};

/// Opaque on-disk identifier of a vault entry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OpaqueId(String);

impl OpaqueId {
    /// Validate an identifier handed back by the UI.
    ///
    /// Identifiers double as file names, so anything that could escape the
    /// vault root or collide with staging files is rejected.
    pub fn parse(raw: &str) -> VaultResult<Self> {
        let valid = !raw.is_empty()
            && raw != "."
            && raw != ".."
            && !raw.starts_with('.')
            && !raw.contains(['/', '\\', '\0']);

        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(VaultError::NotFound(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OpaqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for OpaqueId {
    type Error = VaultError;

    fn try_from(raw: String) -> VaultResult<Self> {
        Self::parse(&raw)
    }
}

impl From<OpaqueId> for String {
    fn from(id: OpaqueId) -> Self {
        id.0
    }
}

impl AsRef<str> for OpaqueId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Source of fresh identifiers
pub trait IdentifierSource: Send + Sync {
    fn new_identifier(&self) -> OpaqueId;
}

/// 128-bit random identifiers (UUID v4, hyphenated lowercase)
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdentifierSource for UuidGenerator {
    fn new_identifier(&self) -> OpaqueId {
        OpaqueId(Uuid::new_v4().hyphenated().to_string())
    }
}
