//! Byte-level access to one backing slot.
//!
//! The engine never talks to the filesystem directly; it goes through
//! [`SlotMedium`] so tests can substitute media that corrupt, truncate, or
//! refuse writes. A medium holds one whole snapshot, read and written as a
//! unit.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::NvramError;

/// One backing location for a namespace snapshot.
pub trait SlotMedium {
    /// Short name used in logs (e.g. "user_a").
    fn label(&self) -> &str;

    /// Read the entire slot. `None` means the slot has never been written
    /// (or was deleted externally), which is distinct from an I/O failure.
    fn read(&self) -> Result<Option<Vec<u8>>, NvramError>;

    /// Replace the slot contents and flush them to durable storage before
    /// returning. On error the previous contents may be gone; the engine's
    /// write ordering accounts for that.
    fn write(&self, bytes: &[u8]) -> Result<(), NvramError>;
}

/// Slot stored as a regular file.
pub struct FileSlot {
    path: PathBuf,
    label: String,
}

impl FileSlot {
    pub fn new(path: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: label.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SlotMedium for FileSlot {
    fn label(&self) -> &str {
        &self.label
    }

    fn read(&self) -> Result<Option<Vec<u8>>, NvramError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, bytes: &[u8]) -> Result<(), NvramError> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;
        file.write_all(bytes)?;
        // Durability point: the snapshot only counts as written once the
        // medium has confirmed it.
        file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::{Cell, RefCell};

    use super::*;

    /// In-memory medium with failure injection for exercising the write
    /// ordering without a filesystem.
    pub struct MemSlot {
        label: String,
        bytes: RefCell<Option<Vec<u8>>>,
        fail_writes: Cell<bool>,
    }

    impl MemSlot {
        pub fn new(label: &str) -> Self {
            Self {
                label: label.to_string(),
                bytes: RefCell::new(None),
                fail_writes: Cell::new(false),
            }
        }

        pub fn with_bytes(label: &str, bytes: Vec<u8>) -> Self {
            let slot = Self::new(label);
            *slot.bytes.borrow_mut() = Some(bytes);
            slot
        }

        pub fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.set(fail);
        }

        pub fn contents(&self) -> Option<Vec<u8>> {
            self.bytes.borrow().clone()
        }

        pub fn corrupt(&self) {
            if let Some(bytes) = self.bytes.borrow_mut().as_mut() {
                let mid = bytes.len() / 2;
                bytes[mid] ^= 0xff;
            }
        }
    }

    impl SlotMedium for MemSlot {
        fn label(&self) -> &str {
            &self.label
        }

        fn read(&self) -> Result<Option<Vec<u8>>, NvramError> {
            Ok(self.bytes.borrow().clone())
        }

        fn write(&self, bytes: &[u8]) -> Result<(), NvramError> {
            if self.fail_writes.get() {
                return Err(NvramError::Io(io::Error::other("injected write failure")));
            }
            *self.bytes.borrow_mut() = Some(bytes.to_vec());
            Ok(())
        }
    }

    // Rc lets a test keep a handle on a medium after the store takes
    // ownership of it.
    impl SlotMedium for std::rc::Rc<MemSlot> {
        fn label(&self) -> &str {
            self.as_ref().label()
        }

        fn read(&self) -> Result<Option<Vec<u8>>, NvramError> {
            self.as_ref().read()
        }

        fn write(&self, bytes: &[u8]) -> Result<(), NvramError> {
            self.as_ref().write(bytes)
        }
    }
}
