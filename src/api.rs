//! Decoy Vault - Unified Public API
//!
//! Single entry point for the app shell: the game screen feeds title taps
//! in, and once the gate opens the file manager calls the vault operations.

use std::path::Path;

use parking_lot::RwLock;

use crate::config::VaultConfig;
use crate::directory::TemporaryHandle;
use crate::error::VaultResult;
use crate::gate::{BiometricAuthenticator, RevealGate};
use crate::ident::OpaqueId;
use crate::service::{VaultEntry, VaultService, VaultStats};
use crate::source::ImportSource;

/// Decoy Vault API
///
/// # Example
///
/// ```rust,ignore
/// use decoy_vault::{HiddenVaultApi, VaultConfig};
///
/// let api = HiddenVaultApi::open(&VaultConfig::with_root("./vault"))?;
///
/// // Three taps on the title reveal the file manager
/// api.tap_title()?;
/// api.tap_title()?;
/// assert!(api.tap_title()?);
///
/// let entry = api.import_path("/path/to/vacation.jpg")?;
/// let preview = api.materialize(&entry.id)?;
/// api.hide();
/// ```
pub struct HiddenVaultApi {
    service: VaultService,
    gate: RwLock<RevealGate>,
}

impl HiddenVaultApi {
    // ═══════════════════════════════════════════════════════════════════════
    // INITIALIZATION
    // ═══════════════════════════════════════════════════════════════════════

    pub fn new(service: VaultService, gate: RevealGate) -> Self {
        Self {
            service,
            gate: RwLock::new(gate),
        }
    }

    /// Open the vault with a tap-only gate
    pub fn open(config: &VaultConfig) -> VaultResult<Self> {
        let service = VaultService::open(config)?;
        Ok(Self::new(service, RevealGate::taps_only(config.gate.clone())))
    }

    /// Open the vault with a platform biometric check behind the taps
    pub fn open_with_biometrics(
        config: &VaultConfig,
        auth: Box<dyn BiometricAuthenticator>,
    ) -> VaultResult<Self> {
        let service = VaultService::open(config)?;
        Ok(Self::new(service, RevealGate::new(config.gate.clone(), auth)))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // GATE
    // ═══════════════════════════════════════════════════════════════════════

    /// Game title tapped; `true` once the vault is revealed
    pub fn tap_title(&self) -> VaultResult<bool> {
        self.gate.write().tap_title()
    }

    /// Reveal directly (e.g. after an external capability check)
    pub fn reveal_vault(&self) -> VaultResult<bool> {
        self.gate.write().reveal_vault()
    }

    /// Conceal the vault and drop materialized copies
    pub fn hide(&self) {
        self.gate.write().hide();
        if let Err(e) = self.service.clear_scratch() {
            log::warn!("Could not clear scratch copies: {}", e);
        }
    }

    pub fn is_revealed(&self) -> bool {
        self.gate.read().is_revealed()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // FILE OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn list(&self) -> VaultResult<Vec<VaultEntry>> {
        self.gate.read().ensure_revealed()?;
        self.service.list()
    }

    pub fn import(&self, source: &dyn ImportSource) -> VaultResult<VaultEntry> {
        self.gate.read().ensure_revealed()?;
        self.service.import(source)
    }

    pub fn import_path<P: AsRef<Path>>(&self, path: P) -> VaultResult<VaultEntry> {
        self.gate.read().ensure_revealed()?;
        self.service.import_path(path)
    }

    pub fn rename(&self, id: &OpaqueId, new_name: &str) -> VaultResult<()> {
        self.gate.read().ensure_revealed()?;
        self.service.rename(id, new_name)
    }

    pub fn delete(&self, id: &OpaqueId) -> VaultResult<()> {
        self.gate.read().ensure_revealed()?;
        self.service.delete(id)
    }

    pub fn materialize(&self, id: &OpaqueId) -> VaultResult<TemporaryHandle> {
        self.gate.read().ensure_revealed()?;
        self.service.materialize(id)
    }

    pub fn stats(&self) -> VaultResult<VaultStats> {
        self.gate.read().ensure_revealed()?;
        self.service.stats()
    }
}
