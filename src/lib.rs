//! # Decoy Vault
//!
//! Hidden file vault behind a Tic-Tac-Toe game.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      DECOY VAULT                         │
//! │  ┌─────────────┐  ┌─────────────────────────────────┐   │
//! │  │  GAME       │  │  GATE                           │   │
//! │  │  3x3 board  │─▶│  triple tap + biometric check   │   │
//! │  └─────────────┘  └────────────────┬────────────────┘   │
//! │                                    │ reveal              │
//! │  ┌─────────────────────────────────┴────────────────┐   │
//! │  │                 VAULT SERVICE                     │   │
//! │  │      import / list / rename / delete / preview    │   │
//! │  └──────┬──────────────────┬──────────────────┬──────┘   │
//! │  ┌──────┴──────┐  ┌────────┴────────┐  ┌──────┴──────┐  │
//! │  │  ID GEN     │  │  MAPPING STORE  │  │  DIRECTORY  │  │
//! │  │  UUID v4    │  │  json / sqlite  │  │  files/<id> │  │
//! │  └─────────────┘  └─────────────────┘  └─────────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Model
//!
//! - Files are stored under random identifiers, names live only in the mapping
//! - File contents are NOT encrypted; this hides files, it does not protect them
//! - The vault is unreachable until the gate opens

pub mod api;
pub mod config;
pub mod directory;
pub mod error;
pub mod game;
pub mod gate;
pub mod ident;
pub mod mapping;
pub mod service;
pub mod source;

pub use api::HiddenVaultApi;
pub use config::{BackendKind, VaultConfig};
pub use directory::{FsVaultDirectory, TemporaryHandle, VaultDirectory};
pub use error::{VaultError, VaultResult};
pub use game::{Board, Outcome, Player};
pub use gate::{BiometricAuthenticator, GateConfig, RevealGate};
pub use ident::{IdentifierSource, OpaqueId, UuidGenerator};
pub use mapping::{Mapping, MappingBackend, MappingStore};
pub use service::{VaultEntry, VaultService, VaultStats};
pub use source::{ImportSource, PathSource};

/// Decoy Vault version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
