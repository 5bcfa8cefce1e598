//! Single entry point composing both namespaces.

use std::path::PathBuf;

use crate::codec::Entries;
use crate::error::Result;
use crate::guard::AccessGuard;
use crate::medium::{FileSlot, SlotMedium};
use crate::partition::{Partition, PrefixPolicy};
use crate::store::CopyStore;

/// Which namespace an invocation operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    User,
    System,
}

/// Resolved backing-store locations and credential. An unset slot path
/// disables that slot (single-copy mode for its namespace); a namespace with
/// both paths unset reads as empty and rejects mutation.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub system_a: Option<PathBuf>,
    pub system_b: Option<PathBuf>,
    pub user_a: Option<PathBuf>,
    pub user_b: Option<PathBuf>,
    pub system_unlock: Option<String>,
}

/// The logical key space the CLI talks to: a user partition and a guarded
/// system partition over disjoint key sets.
pub struct Nvram {
    user: Partition,
    system: Partition,
    guard: AccessGuard,
}

fn slot(path: Option<PathBuf>, label: &str) -> Option<Box<dyn SlotMedium>> {
    path.map(|p| Box::new(FileSlot::new(p, label)) as Box<dyn SlotMedium>)
}

impl Nvram {
    pub fn open(config: Config) -> Self {
        let system_store = CopyStore::new(
            slot(config.system_a, "system_a"),
            slot(config.system_b, "system_b"),
        );
        let user_store = CopyStore::new(
            slot(config.user_a, "user_a"),
            slot(config.user_b, "user_b"),
        );
        Self {
            user: Partition::new(user_store, PrefixPolicy::Forbidden),
            system: Partition::new(system_store, PrefixPolicy::Required),
            guard: AccessGuard::new(config.system_unlock),
        }
    }

    /// Read one value. User mode falls back to the system namespace so
    /// system values are visible without `--sys`; reads are never gated.
    pub fn get(&self, mode: Mode, key: &str) -> Result<String> {
        match mode {
            Mode::System => self.system.get(key),
            Mode::User => self.user.get(key).or_else(|_| self.system.get(key)),
        }
    }

    pub fn set(&self, mode: Mode, key: &str, value: &str) -> Result<()> {
        match mode {
            Mode::User => self.user.set(key, value),
            Mode::System => {
                self.guard.authorize()?;
                self.system.set(key, value)
            }
        }
    }

    pub fn delete(&self, mode: Mode, key: &str) -> Result<()> {
        match mode {
            Mode::User => self.user.delete(key),
            Mode::System => {
                self.guard.authorize()?;
                self.system.delete(key)
            }
        }
    }

    /// System mode lists only the system namespace; user mode is the
    /// combined view. The prefix policy keeps the key sets disjoint, so the
    /// merge is a plain union.
    pub fn list(&self, mode: Mode) -> Entries {
        match mode {
            Mode::System => self.system.list(),
            Mode::User => {
                let mut merged = self.system.list();
                merged.extend(self.user.list());
                merged
            }
        }
    }
}
