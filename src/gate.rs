//! Decoy Vault - Presentation Gate
//!
//! Decides when the vault becomes reachable: a run of taps on the game title,
//! optionally confirmed by a platform biometric check. The gate never touches
//! vault state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};

/// Upper bound for lockout and reveal timeout (one year)
pub const MAX_GATE_SECONDS: u64 = 366 * 24 * 60 * 60;

/// Upper bound for the gap between title taps
pub const MAX_TAP_WINDOW_MS: u64 = 60_000;

/// Gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Title taps needed to reveal the vault
    pub taps_required: u8,
    /// Max gap between consecutive taps (milliseconds)
    pub tap_window_ms: u64,
    /// Ask the platform authenticator before revealing
    pub require_biometric: bool,
    /// Failed checks before lockout
    pub max_attempts: u8,
    /// Lockout length (seconds)
    pub lockout_seconds: u64,
    /// Hide again after this many seconds; 0 keeps it revealed
    pub timeout_seconds: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            taps_required: 3,
            tap_window_ms: 600,
            require_biometric: false,
            max_attempts: 5,
            lockout_seconds: 300, // 5 minutes
            timeout_seconds: 300,
        }
    }
}

impl GateConfig {
    /// Reject durations the gate cannot represent as deadlines
    pub fn validate(&self) -> VaultResult<()> {
        if self.lockout_seconds > MAX_GATE_SECONDS {
            return Err(VaultError::Config(format!(
                "gate.lockout_seconds {} exceeds {}",
                self.lockout_seconds, MAX_GATE_SECONDS
            )));
        }
        if self.timeout_seconds > MAX_GATE_SECONDS {
            return Err(VaultError::Config(format!(
                "gate.timeout_seconds {} exceeds {}",
                self.timeout_seconds, MAX_GATE_SECONDS
            )));
        }
        if self.tap_window_ms > MAX_TAP_WINDOW_MS {
            return Err(VaultError::Config(format!(
                "gate.tap_window_ms {} exceeds {}",
                self.tap_window_ms, MAX_TAP_WINDOW_MS
            )));
        }
        Ok(())
    }

    /// Lockout deadline from `now`; saturates instead of overflowing
    fn lockout_until(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        i64::try_from(self.lockout_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|lockout| now.checked_add_signed(lockout))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Platform biometric check (Face ID, Touch ID, fingerprint...)
pub trait BiometricAuthenticator: Send + Sync {
    /// Prompt the user; `true` means the check passed
    fn authenticate(&self, reason: &str) -> bool;
}

/// Authenticator for devices without biometrics
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysAllow;

impl BiometricAuthenticator for AlwaysAllow {
    fn authenticate(&self, _reason: &str) -> bool {
        true
    }
}

/// Counts rapid taps on the title
#[derive(Debug, Clone)]
pub struct TapDetector {
    required: u8,
    window: Duration,
    count: u8,
    last_tap: Option<DateTime<Utc>>,
}

impl TapDetector {
    pub fn new(required: u8, window_ms: u64) -> Self {
        Self {
            required: required.max(1),
            window: i64::try_from(window_ms)
                .ok()
                .and_then(Duration::try_milliseconds)
                .unwrap_or(Duration::MAX),
            count: 0,
            last_tap: None,
        }
    }

    /// Register a tap; `true` once the run is complete
    pub fn tap(&mut self) -> bool {
        self.tap_at(Utc::now())
    }

    pub fn tap_at(&mut self, now: DateTime<Utc>) -> bool {
        let in_run = self
            .last_tap
            .map(|last| now - last <= self.window)
            .unwrap_or(false);

        self.count = if in_run { self.count + 1 } else { 1 };
        self.last_tap = Some(now);

        if self.count >= self.required {
            self.reset();
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.last_tap = None;
    }
}

/// Gate state
#[derive(Debug, Clone, Default)]
pub struct GateState {
    /// When the vault was last revealed
    pub revealed_at: Option<DateTime<Utc>>,
    /// Failed biometric checks
    pub failed_attempts: u8,
    /// Locked until
    pub locked_until: Option<DateTime<Utc>>,
}

/// Reveal gate in front of the vault
pub struct RevealGate {
    config: GateConfig,
    auth: Box<dyn BiometricAuthenticator>,
    taps: TapDetector,
    state: GateState,
}

impl RevealGate {
    pub fn new(config: GateConfig, auth: Box<dyn BiometricAuthenticator>) -> Self {
        let taps = TapDetector::new(config.taps_required, config.tap_window_ms);
        Self {
            config,
            auth,
            taps,
            state: GateState::default(),
        }
    }

    /// Gate without biometric confirmation
    pub fn taps_only(config: GateConfig) -> Self {
        Self::new(
            GateConfig {
                require_biometric: false,
                ..config
            },
            Box::new(AlwaysAllow),
        )
    }

    /// Title tapped; reveals the vault when the tap run completes
    pub fn tap_title(&mut self) -> VaultResult<bool> {
        if self.taps.tap() {
            self.reveal_vault()
        } else {
            Ok(false)
        }
    }

    /// Try to reveal the vault; returns whether it is now visible
    pub fn reveal_vault(&mut self) -> VaultResult<bool> {
        self.reveal_at(Utc::now())
    }

    fn reveal_at(&mut self, now: DateTime<Utc>) -> VaultResult<bool> {
        if let Some(until) = self.state.locked_until {
            if now < until {
                return Err(VaultError::GateLockedOut((until - now).num_seconds().max(0)));
            }
            self.state.locked_until = None;
            self.state.failed_attempts = 0;
        }

        if !self.config.require_biometric || self.auth.authenticate("Unlock your files") {
            self.state.revealed_at = Some(now);
            self.state.failed_attempts = 0;
            log::info!("Vault revealed");
            return Ok(true);
        }

        self.state.failed_attempts += 1;
        log::warn!("Biometric check failed ({} attempt(s))", self.state.failed_attempts);

        if self.state.failed_attempts >= self.config.max_attempts {
            let until = self.config.lockout_until(now);
            self.state.locked_until = Some(until);
            return Err(VaultError::GateLockedOut((until - now).num_seconds().max(0)));
        }

        Ok(false)
    }

    /// Conceal the vault again
    pub fn hide(&mut self) {
        self.state.revealed_at = None;
        self.taps.reset();
    }

    pub fn is_revealed(&self) -> bool {
        self.is_revealed_at(Utc::now())
    }

    fn is_revealed_at(&self, now: DateTime<Utc>) -> bool {
        match self.state.revealed_at {
            Some(at) if self.config.timeout_seconds == 0 => at <= now,
            Some(at) => {
                let limit = i64::try_from(self.config.timeout_seconds).unwrap_or(i64::MAX);
                (now - at).num_seconds() < limit
            }
            None => false,
        }
    }

    /// `Hidden` unless the vault is currently revealed
    pub fn ensure_revealed(&self) -> VaultResult<()> {
        if self.is_revealed() {
            Ok(())
        } else {
            Err(VaultError::Hidden)
        }
    }

    /// Remaining checks before lockout
    pub fn remaining_attempts(&self) -> u8 {
        self.config.max_attempts.saturating_sub(self.state.failed_attempts)
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }
}
