//! Decoy Vault - Error Types

use thiserror::Error;

/// Result type for vault operations
pub type VaultResult<T> = Result<T, VaultError>;

/// Vault error types
#[derive(Error, Debug)]
pub enum VaultError {
    // ═══════════════════════════════════════════════════════════════
    // VAULT ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Source unreadable: {0}")]
    SourceUnreadable(String),

    #[error("Destination write failed: {0}")]
    DestinationWriteFailed(String),

    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    #[error("Entry not found: {0}")]
    NotFound(String),

    // ═══════════════════════════════════════════════════════════════
    // GATE ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Vault is hidden")]
    Hidden,

    #[error("Too many failed authentication attempts - retry in {0}s")]
    GateLockedOut(i64),

    // ═══════════════════════════════════════════════════════════════
    // GAME ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Invalid move: {0}")]
    InvalidMove(String),

    // ═══════════════════════════════════════════════════════════════
    // CONFIG ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Configuration error: {0}")]
    Config(String),
}

impl VaultError {
    /// Errors the user can act on (pick another file, free space, retry)
    pub fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            VaultError::SourceUnreadable(_)
                | VaultError::DestinationWriteFailed(_)
                | VaultError::NotFound(_)
                | VaultError::InvalidMove(_)
        )
    }

    /// Check if the mapping store backend failed
    pub fn is_persistence(&self) -> bool {
        matches!(self, VaultError::PersistenceUnavailable(_))
    }

    /// Check if this error comes from the presentation gate
    pub fn is_gate(&self) -> bool {
        matches!(self, VaultError::Hidden | VaultError::GateLockedOut(_))
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::PersistenceUnavailable(e.to_string())
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for VaultError {
    fn from(e: rusqlite::Error) -> Self {
        VaultError::PersistenceUnavailable(e.to_string())
    }
}
