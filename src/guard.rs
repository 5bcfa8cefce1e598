//! Unlock gating for system-namespace mutation.

use crate::error::{NvramError, Result};

/// Credential that unlocks mutation of the system namespace. Supplied
/// out-of-band by the caller's environment; reads are never gated.
pub const SYSTEM_UNLOCK_CREDENTIAL: &str = "16440";

/// Pure predicate over the credential the caller supplied. No I/O.
#[derive(Debug, Clone, Default)]
pub struct AccessGuard {
    credential: Option<String>,
}

impl AccessGuard {
    pub fn new(credential: Option<String>) -> Self {
        Self { credential }
    }

    /// True when the supplied credential matches the unlock value.
    pub fn unlocked(&self) -> bool {
        self.credential.as_deref() == Some(SYSTEM_UNLOCK_CREDENTIAL)
    }

    /// `Unauthorized` when the credential is missing or wrong.
    pub fn authorize(&self) -> Result<()> {
        if self.unlocked() {
            Ok(())
        } else {
            Err(NvramError::Unauthorized)
        }
    }
}
