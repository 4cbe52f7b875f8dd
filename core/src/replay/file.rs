//! Replay slot files (`.hlrp`)
//!
//! Layout, little-endian:
//!
//! ```text
//! magic         [u8; 4]   "HLRP"
//! version       u8
//! flags         u8        SlotFileFlags
//! reserved      [u8; 2]
//! arena_len     u64       uncompressed snapshot size
//! sample_count  u64
//! checksum      u64       xxh3 of the uncompressed snapshot
//! blob_len      u64       stored snapshot bytes that follow
//! blob          [u8; blob_len]
//! samples       [InputSample; sample_count]   16 bytes each, raw
//! ```

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use bitflags::bitflags;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use lz4_flex::{compress_prepend_size, decompress_into};

use super::ReplayError;
use super::slot::ReplaySlot;
use crate::input::{INPUT_SAMPLE_SIZE, InputSample};
use crate::snapshot::{Snapshot, SnapshotError};

pub const SLOT_FILE_MAGIC: [u8; 4] = *b"HLRP";
pub const SLOT_FILE_VERSION: u8 = 1;
pub const SLOT_FILE_EXTENSION: &str = "hlrp";

bitflags! {
    /// Slot file feature flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SlotFileFlags: u8 {
        /// Snapshot blob is LZ4 compressed with its size prepended
        const COMPRESSED_SNAPSHOT = 0b0000_0001;
    }
}

/// `<dir>/slot_<n>.hlrp`
pub fn slot_path(dir: &Path, slot: u8) -> PathBuf {
    dir.join(format!("slot_{}.{}", slot, SLOT_FILE_EXTENSION))
}

/// Write a completed slot to `path`
pub fn save(path: &Path, slot: &ReplaySlot) -> Result<(), ReplayError> {
    let mut writer = SlotWriter::new(BufWriter::new(File::create(path)?));
    writer.write_slot(slot)?;
    writer.into_inner().flush()?;
    Ok(())
}

/// Read a slot file recorded against an arena of `arena_len` bytes
pub fn load(path: &Path, arena_len: usize) -> Result<ReplaySlot, ReplayError> {
    let mut reader = SlotReader::new(BufReader::new(File::open(path)?));
    reader.read_slot(arena_len)
}

/// Writer for the slot file format
pub struct SlotWriter<W: Write> {
    writer: W,
}

impl<W: Write> SlotWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Write a slot that holds a snapshot
    pub fn write_slot(&mut self, slot: &ReplaySlot) -> io::Result<()> {
        let snapshot = slot.snapshot().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "slot has no snapshot")
        })?;
        let blob = compress_prepend_size(snapshot.data());

        self.writer.write_all(&SLOT_FILE_MAGIC)?;
        self.writer.write_u8(SLOT_FILE_VERSION)?;
        self.writer
            .write_u8(SlotFileFlags::COMPRESSED_SNAPSHOT.bits())?;
        self.writer.write_all(&[0; 2])?;
        self.writer.write_u64::<LittleEndian>(snapshot.len() as u64)?;
        self.writer
            .write_u64::<LittleEndian>(slot.samples().len() as u64)?;
        self.writer.write_u64::<LittleEndian>(snapshot.checksum())?;
        self.writer.write_u64::<LittleEndian>(blob.len() as u64)?;
        self.writer.write_all(&blob)?;
        self.writer
            .write_all(bytemuck::cast_slice(slot.samples()))?;
        Ok(())
    }
}

/// Reader for the slot file format
pub struct SlotReader<R: Read> {
    reader: R,
}

impl<R: Read> SlotReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Read a slot, checking its snapshot against the live arena size and checksum
    pub fn read_slot(&mut self, arena_len: usize) -> Result<ReplaySlot, ReplayError> {
        let mut magic = [0u8; 4];
        self.reader.read_exact(&mut magic)?;
        if magic != SLOT_FILE_MAGIC {
            return Err(invalid_data("not a replay slot file").into());
        }
        let version = self.reader.read_u8()?;
        if version != SLOT_FILE_VERSION {
            return Err(invalid_data(format!("unsupported slot file version {}", version)).into());
        }
        let flags = SlotFileFlags::from_bits_truncate(self.reader.read_u8()?);
        let mut reserved = [0u8; 2];
        self.reader.read_exact(&mut reserved)?;

        let stored_len = self.reader.read_u64::<LittleEndian>()? as usize;
        if stored_len != arena_len {
            return Err(SnapshotError::SizeMismatch {
                blob: stored_len,
                arena: arena_len,
            }
            .into());
        }
        let sample_count = self.reader.read_u64::<LittleEndian>()? as usize;
        let checksum = self.reader.read_u64::<LittleEndian>()?;
        let blob_len = self.reader.read_u64::<LittleEndian>()? as usize;

        let mut blob = Vec::new();
        (&mut self.reader)
            .take(blob_len as u64)
            .read_to_end(&mut blob)?;
        if blob.len() != blob_len {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        let data = if flags.contains(SlotFileFlags::COMPRESSED_SNAPSHOT) {
            decompress_snapshot(&blob, arena_len)?
        } else {
            blob
        };
        if data.len() != arena_len {
            return Err(SnapshotError::SizeMismatch {
                blob: data.len(),
                arena: arena_len,
            }
            .into());
        }
        let snapshot = Snapshot::from_parts(data, checksum)?;

        let raw_len = sample_count.saturating_mul(INPUT_SAMPLE_SIZE);
        let mut raw = Vec::new();
        (&mut self.reader)
            .take(raw_len as u64)
            .read_to_end(&mut raw)?;
        if raw.len() != raw_len {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        let samples = raw
            .chunks_exact(INPUT_SAMPLE_SIZE)
            .map(bytemuck::pod_read_unaligned::<InputSample>)
            .collect();

        Ok(ReplaySlot::from_recording(snapshot, samples))
    }
}

/// Decompress a size-prepended blob into exactly `arena_len` bytes
///
/// The prefix is checked before anything is allocated.
fn decompress_snapshot(blob: &[u8], arena_len: usize) -> Result<Vec<u8>, ReplayError> {
    let Some((prefix, compressed)) = blob.split_first_chunk::<4>() else {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    };
    let declared = u32::from_le_bytes(*prefix) as usize;
    if declared != arena_len {
        return Err(SnapshotError::SizeMismatch {
            blob: declared,
            arena: arena_len,
        }
        .into());
    }
    let mut data = vec![0u8; arena_len];
    let written = decompress_into(compressed, &mut data).map_err(invalid_data)?;
    if written != arena_len {
        return Err(SnapshotError::SizeMismatch {
            blob: written,
            arena: arena_len,
        }
        .into());
    }
    Ok(data)
}

fn invalid_data<E>(error: E) -> io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    io::Error::new(io::ErrorKind::InvalidData, error)
}
