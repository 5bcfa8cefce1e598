//! Non-volatile key-value storage for embedded and router-class devices.
//!
//! Configuration must survive abrupt power loss on limited-endurance media,
//! so every namespace is persisted redundantly across two backing slots with
//! a generation-stamped, checksummed snapshot format. An interrupted write
//! never destroys the only valid copy: the engine writes the stale slot
//! first, confirms durability, and only then syncs the other slot.
//!
//! Two namespaces are exposed: `user`, and a `system` namespace whose keys
//! carry the `SYS_` prefix and whose mutation is gated behind an unlock
//! credential.

pub mod codec;
pub mod error;
pub mod facade;
pub mod guard;
pub mod medium;
pub mod partition;
pub mod store;

pub use codec::Entries;
pub use error::{NvramError, Result};
pub use facade::{Config, Mode, Nvram};
pub use guard::{AccessGuard, SYSTEM_UNLOCK_CREDENTIAL};
pub use medium::{FileSlot, SlotMedium};
pub use partition::{Partition, PrefixPolicy, SYS_PREFIX};
pub use store::{CopyStore, Loaded, Slot};
