//! Key-level operations with prefix policy, built on a copy store.

use tracing::debug;

use crate::codec::Entries;
use crate::error::{NvramError, Result};
use crate::store::CopyStore;

/// Reserved prefix carried by every system-namespace key. The prefix is part
/// of the key text; it is stored and listed, never stripped.
pub const SYS_PREFIX: &str = "SYS_";

/// How a namespace treats the reserved prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixPolicy {
    /// Keys must carry the reserved prefix (system namespace).
    Required,
    /// Keys must not carry the reserved prefix (user namespace).
    Forbidden,
}

pub struct Partition {
    store: CopyStore,
    policy: PrefixPolicy,
}

impl Partition {
    pub fn new(store: CopyStore, policy: PrefixPolicy) -> Self {
        Self { store, policy }
    }

    pub fn get(&self, key: &str) -> Result<String> {
        self.store
            .load()
            .entries
            .remove(key)
            .ok_or_else(|| NvramError::NotFound {
                key: key.to_string(),
            })
    }

    /// Insert or overwrite one entry. Keys and values are validated before
    /// any storage I/O; a key that violates this namespace's prefix policy
    /// never reaches the slots.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_policy(key)?;
        check_key_text(key)?;
        check_value_text(value)?;

        let mut state = self.store.load();
        if state.entries.get(key).map(String::as_str) == Some(value) {
            // Same value already persisted; don't burn a write cycle.
            debug!("set {}: unchanged, skipping write", key);
            return Ok(());
        }
        state.entries.insert(key.to_string(), value.to_string());
        self.store.commit(state)
    }

    /// Remove one entry. Deleting a key that was never set succeeds silently
    /// and does not bump the generation.
    pub fn delete(&self, key: &str) -> Result<()> {
        let mut state = self.store.load();
        if state.entries.remove(key).is_none() {
            debug!("delete {}: not present, nothing to do", key);
            return Ok(());
        }
        self.store.commit(state)
    }

    /// The full mapping, sorted by key.
    pub fn list(&self) -> Entries {
        self.store.load().entries
    }

    fn check_policy(&self, key: &str) -> Result<()> {
        let reason = match self.policy {
            PrefixPolicy::Required if !key.starts_with(SYS_PREFIX) => {
                format!("system keys must start with {SYS_PREFIX}")
            }
            PrefixPolicy::Forbidden if key.starts_with(SYS_PREFIX) => {
                format!("prefix {SYS_PREFIX} is reserved for the system namespace")
            }
            _ => return Ok(()),
        };
        Err(NvramError::InvalidKey {
            key: key.to_string(),
            reason,
        })
    }
}

/// The `list` wire format joins entries as `key=value` lines, so neither
/// side of an entry may contain `=` or whitespace. Enforced at `set` time;
/// rejected, not escaped.
fn check_key_text(key: &str) -> Result<()> {
    let reason = if key.is_empty() {
        "key is empty"
    } else if key.contains('=') {
        "key contains '='"
    } else if key.contains(char::is_whitespace) {
        "key contains whitespace"
    } else {
        return Ok(());
    };
    Err(NvramError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    })
}

fn check_value_text(value: &str) -> Result<()> {
    let reason = if value.contains('=') {
        "value contains '='"
    } else if value.contains(char::is_whitespace) {
        "value contains whitespace"
    } else {
        return Ok(());
    };
    Err(NvramError::InvalidValue {
        reason: reason.to_string(),
    })
}
