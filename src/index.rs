// dam: Dessicated archives of SAM/BAM alignment data.
//
// Copyright 2025 Tommi Mäklin [tommi@maklin.fi].
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//

//! Sparse block index: one `(first_read_id, byte_offset)` pair per block
//! plus a terminal sentinel whose offset marks the end of the block region.
//!
//! The decompressed payload is a repetition of a zero-terminated read id
//! followed by a little-endian u64 file offset.

use std::io::Cursor;
use std::io::Read;

use byteorder::LittleEndian;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;

use crate::error::DamError;
use crate::error::Result;
use crate::format::SENTINEL_ID;

/// One indexed block: the read id of its first record and its absolute
/// byte offset in the archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub id: String,
    pub offset: u64,
}

/// In-memory block index, sentinel entry included. Loaded once when the
/// archive is opened and read-only afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockIndex {
    entries: Vec<IndexEntry>,
}

impl BlockIndex {
    /// Parses a decompressed index payload.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut conn = Cursor::new(bytes);
        let mut entries: Vec<IndexEntry> = Vec::new();

        while (conn.position() as usize) < bytes.len() {
            let id = read_terminated_id(&mut conn)?;
            let offset = conn
                .read_u64::<LittleEndian>()
                .map_err(|_| DamError::MalformedArchive(format!("index entry for {} has no offset", id)))?;
            entries.push(IndexEntry { id, offset });
        }

        match entries.last() {
            Some(last) if last.id == SENTINEL_ID => Ok(BlockIndex { entries }),
            Some(last) => Err(DamError::MalformedArchive(format!(
                "index ends with {} instead of the sentinel",
                last.id
            ))),
            None => Err(DamError::MalformedArchive("index is empty".to_string())),
        }
    }

    /// Number of blocks in the archive, sentinel excluded.
    pub fn n_blocks(&self) -> usize {
        self.entries.len() - 1
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Byte extent `(offset, length)` of block `pos`, or None for the
    /// sentinel position and beyond.
    pub fn block_extent(&self, pos: usize) -> Option<(u64, u64)> {
        if pos + 1 >= self.entries.len() {
            return None;
        }
        let offset = self.entries[pos].offset;
        let length = self.entries[pos + 1].offset.saturating_sub(offset);
        Some((offset, length))
    }

    /// Position of the only block that can contain `read_id`, or None when
    /// the id sorts outside every block. The block still has to be searched
    /// to confirm the id is present.
    pub fn candidate_block(&self, read_id: &str) -> Option<usize> {
        let insert = self.entries.partition_point(|entry| entry.id.as_str() < read_id);
        if insert < self.n_blocks() && self.entries[insert].id == read_id {
            return Some(insert);
        }
        if insert == 0 {
            return None;
        }
        let candidate = insert - 1;
        if candidate >= self.n_blocks() {
            return None;
        }
        Some(candidate)
    }

    /// Block to begin a range scan from: like [candidate_block] but an id
    /// sorting before the first block starts the scan at block 0.
    pub fn start_block(&self, read_id: &str) -> Option<usize> {
        if self.n_blocks() == 0 {
            return None;
        }
        match self.candidate_block(read_id) {
            Some(pos) => Some(pos),
            None => {
                let insert = self.entries.partition_point(|entry| entry.id.as_str() < read_id);
                if insert == 0 { Some(0) } else { None }
            }
        }
    }
}

/// Incrementally built index payload for archive creation.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    bytes: Vec<u8>,
}

impl IndexBuilder {
    pub fn new() -> Self {
        IndexBuilder { bytes: Vec::new() }
    }

    /// Records the first read id and starting offset of the next block.
    pub fn push(&mut self, id: &str, offset: u64) {
        self.bytes.extend_from_slice(id.as_bytes());
        self.bytes.push(0);
        // Writing into a Vec cannot fail.
        let _ = self.bytes.write_u64::<LittleEndian>(offset);
    }

    /// Appends the sentinel and returns the uncompressed payload.
    /// `end_offset` is the byte position where the block region ends.
    pub fn finish(mut self, end_offset: u64) -> Vec<u8> {
        self.push(SENTINEL_ID, end_offset);
        self.bytes
    }
}

fn read_terminated_id(conn: &mut Cursor<&[u8]>) -> Result<String> {
    let mut id_bytes: Vec<u8> = Vec::new();
    let mut byte = [0_u8; 1];
    loop {
        conn.read_exact(&mut byte)
            .map_err(|_| DamError::MalformedArchive("index read id is not zero-terminated".to_string()))?;
        if byte[0] == 0 {
            break;
        }
        id_bytes.push(byte[0]);
    }
    Ok(String::from_utf8_lossy(&id_bytes).to_string())
}
