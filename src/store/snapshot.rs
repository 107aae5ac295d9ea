//! # Collection Snapshot Format
//!
//! Each collection persists as one file:
//!
//! - [Magic 8 bytes] "SNPSTOR1"
//! - [Format version u32 LE]
//! - [Payload length u64 LE]
//! - [Payload] (collection documents as JSON)
//!
//! Writes go to a sibling temp file first and land with a rename, so a
//! snapshot on disk is always either the old one or the new one, never a
//! torn mix. Reads memory-map the file and validate the envelope before
//! touching the payload.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use memmap2::Mmap;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StoreError};

const MAGIC: &[u8; 8] = b"SNPSTOR1";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 8 + 4 + 8;

/// Serialize `value` into the snapshot file at `path`
pub fn write_snapshot<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let payload = serde_json::to_vec(value)
        .map_err(|e| StoreError::corrupt(path, format!("serialize failed: {e}")))?;

    let tmp = path.with_extension("tmp");
    {
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(MAGIC)?;
        writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
        writer.write_all(&(payload.len() as u64).to_le_bytes())?;
        writer.write_all(&payload)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Read and validate the snapshot file at `path`
pub fn read_snapshot<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    // Safety: the store owns its directory; snapshot files are replaced
    // atomically by rename and never written in place.
    let mmap = unsafe { Mmap::map(&file)? };

    if mmap.len() < HEADER_LEN {
        return Err(StoreError::corrupt(path, "truncated header"));
    }
    if &mmap[..8] != MAGIC {
        return Err(StoreError::corrupt(path, "bad magic"));
    }

    let mut version_bytes = [0u8; 4];
    version_bytes.copy_from_slice(&mmap[8..12]);
    let version = u32::from_le_bytes(version_bytes);
    if version != FORMAT_VERSION {
        return Err(StoreError::corrupt(
            path,
            format!("unsupported snapshot format version {version}"),
        ));
    }

    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&mmap[12..20]);
    let payload_len = u64::from_le_bytes(len_bytes) as usize;
    let end = HEADER_LEN
        .checked_add(payload_len)
        .ok_or_else(|| StoreError::corrupt(path, "payload length overflow"))?;
    let payload = mmap
        .get(HEADER_LEN..end)
        .ok_or_else(|| StoreError::corrupt(path, "truncated payload"))?;

    serde_json::from_slice(payload)
        .map_err(|e| StoreError::corrupt(path, format!("payload decode failed: {e}")))
}
