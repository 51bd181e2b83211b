//! Raw mmap-backed byte region, shared by the slot array and the cursor
//! pair. Grounded on the mmap-plus-`#[repr(C)]` technique in
//! `other_examples/050dbfda_dawsh2-AlphaPulse__...event_driven_shm.rs`.

use crate::domain::errors::ShmError;
use memmap2::MmapMut;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

pub struct ShmRegion {
    path: PathBuf,
    mmap: MmapMut,
    created: bool,
}

impl ShmRegion {
    pub fn create(base_dir: &Path, name: &str, size_bytes: usize) -> Result<Self, ShmError> {
        let path = base_dir.join(name);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| ShmError::AllocationFailed {
                name: name.to_string(),
                source: e,
            })?;
        file.set_len(size_bytes as u64)
            .map_err(|e| ShmError::AllocationFailed {
                name: name.to_string(),
                source: e,
            })?;
        let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|e| ShmError::AllocationFailed {
            name: name.to_string(),
            source: e,
        })?;
        Ok(Self {
            path,
            mmap,
            created: true,
        })
    }

    pub fn attach(base_dir: &Path, name: &str, size_bytes: usize) -> Result<Self, ShmError> {
        let path = base_dir.join(name);
        if !path.exists() {
            return Err(ShmError::MissingOnAttach {
                name: name.to_string(),
            });
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| ShmError::AllocationFailed {
                name: name.to_string(),
                source: e,
            })?;
        let found = file
            .metadata()
            .map_err(|e| ShmError::AllocationFailed {
                name: name.to_string(),
                source: e,
            })?
            .len() as usize;
        if found != size_bytes {
            return Err(ShmError::SizeMismatch {
                name: name.to_string(),
                expected: size_bytes,
                found,
            });
        }
        let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|e| ShmError::AllocationFailed {
            name: name.to_string(),
            source: e,
        })?;
        Ok(Self {
            path,
            mmap,
            created: false,
        })
    }

    pub fn unlink(&self) {
        if self.created {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.mmap[..]
    }

    pub fn bytes(&self) -> &[u8] {
        &self.mmap[..]
    }
}

impl ShmRegion {
    pub fn store_slot(&mut self, index: usize, slot: &super::RawSlot) {
        let offset = index * super::SLOT_BYTES;
        let dst = &mut self.bytes_mut()[offset..offset + super::SLOT_BYTES];
        // SAFETY: RawSlot is #[repr(C)] and exactly SLOT_BYTES long; dst has
        // the same length, so this is a plain byte copy of the slot's
        // f64 array, little-endian per the host platform (spec.md §6
        // specifies little-endian IEEE-754 doubles, which matches every
        // platform this crate targets).
        unsafe {
            std::ptr::copy_nonoverlapping(
                slot as *const super::RawSlot as *const u8,
                dst.as_mut_ptr(),
                super::SLOT_BYTES,
            );
        }
    }

    pub fn load_slot(&self, index: usize) -> super::RawSlot {
        let offset = index * super::SLOT_BYTES;
        let src = &self.bytes()[offset..offset + super::SLOT_BYTES];
        let mut slot = super::RawSlot([0.0; super::FLOATS_PER_SLOT]);
        unsafe {
            std::ptr::copy_nonoverlapping(
                src.as_ptr(),
                &mut slot as *mut super::RawSlot as *mut u8,
                super::SLOT_BYTES,
            );
        }
        slot
    }
}
