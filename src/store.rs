//! Where animations come from.
//!
//! The player only needs "open this name, give me a byte reader". Firmware
//! serves files embedded in flash through [`MemoryStore`]; a filesystem
//! backed store can implement the same trait.

use core::fmt;

use embedded_io::Read;

pub trait AnimationStore {
    type Error: fmt::Debug;
    type File<'a>: Read
    where
        Self: 'a;

    fn open(&mut self, path: &str) -> Result<Self::File<'_>, Self::Error>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreError {
    NotFound,
    Full,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("no such file"),
            Self::Full => f.write_str("store is full"),
        }
    }
}

/// Up to `N` named byte slices.
pub struct MemoryStore<'d, const N: usize> {
    files: heapless::Vec<(&'d str, &'d [u8]), N>,
}

impl<'d, const N: usize> MemoryStore<'d, N> {
    pub const fn new() -> Self {
        Self { files: heapless::Vec::new() }
    }

    /// Add or replace a file.
    pub fn insert(&mut self, path: &'d str, data: &'d [u8]) -> Result<(), StoreError> {
        if let Some(entry) = self.files.iter_mut().find(|(p, _)| *p == path) {
            entry.1 = data;
            return Ok(());
        }
        self.files.push((path, data)).map_err(|_| StoreError::Full)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl<const N: usize> Default for MemoryStore<'_, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'d, const N: usize> AnimationStore for MemoryStore<'d, N> {
    type Error = StoreError;
    type File<'a>
        = &'d [u8]
    where
        Self: 'a;

    fn open(&mut self, path: &str) -> Result<&'d [u8], StoreError> {
        self.files
            .iter()
            .find(|(p, _)| *p == path)
            .map(|(_, data)| *data)
            .ok_or(StoreError::NotFound)
    }
}
