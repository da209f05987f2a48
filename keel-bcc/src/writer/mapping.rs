//! RAII wrapper over the output file mapping.
//!
//! The file is created at its final size and mapped writable; dropping the
//! wrapper unmaps the view and closes the handles on every exit path, so
//! an error between creation and flush never leaks the mapping.

#![allow(unsafe_code)]

use crate::error::WriteError;
use memmap::MmapMut;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

pub(super) struct OutputMapping {
    map: MmapMut,
    path: PathBuf,
}

impl OutputMapping {
    pub(super) fn create(path: &Path, size: u64) -> Result<Self, WriteError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|source| WriteError::Create {
                path: path.to_owned(),
                source,
            })?;
        let map_err = |source| WriteError::Map {
            path: path.to_owned(),
            source,
        };
        file.set_len(size).map_err(map_err)?;
        // Safety: the file was just created and sized by us; no other view
        // of it exists while the mapping is alive.
        let map = unsafe { MmapMut::map_mut(&file) }.map_err(map_err)?;
        Ok(Self {
            map,
            path: path.to_owned(),
        })
    }

    pub(super) fn bytes(&mut self) -> &mut [u8] {
        &mut self.map
    }

    /// Flush pages back to disk, then release the view and handles.
    pub(super) fn finish(self) -> Result<(), WriteError> {
        self.map.flush().map_err(|source| WriteError::Flush {
            path: self.path.clone(),
            source,
        })
    }
}
