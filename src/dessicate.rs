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

//! Archive creation: stream sorted alignment records into compressed
//! blocks of dessicated lines.
//!
//! Records arrive sorted by read id, so every block holds a contiguous run
//! of ids and the index needs one entry per block. Rollover to a new block
//! is deferred while the read id is unchanged, which keeps all records of
//! one id inside a single block at the cost of letting that block run over
//! the size cap.

use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use crate::block;
use crate::error::DamError;
use crate::error::Result;
use crate::format::AlignmentFormat;
use crate::format::BLOCKSIZE;
use crate::format::HEADER_SIZE;
use crate::headers;
use crate::headers::FileHeader;
use crate::index::IndexBuilder;
use crate::stream;

/// Creates the archive `output` from the alignment file `input`.
///
/// `tmpdirs` are passed through to the external sort as temporary
/// directory hints. A failed run leaves the partial archive on disk.
pub fn dessicate(
    input: &Path,
    output: &Path,
    tmpdirs: &[PathBuf],
) -> Result<()> {
    let format = AlignmentFormat::from_path(input)?;
    let source_path = std::fs::canonicalize(input)?;

    let header = FileHeader::new(&source_path.to_string_lossy());
    let header_bytes = headers::encode_file_header(&header)?;

    let mut writer = BufWriter::new(File::create(output)?);
    writer.write_all(&header_bytes)?;

    let sam_header = stream::sam_text_header(input, format)?;
    writer.write_all(&sam_header)?;
    let block_offset = (HEADER_SIZE + sam_header.len()) as u64;

    let mut records = stream::sorted_alignments(input, format, tmpdirs)?;
    let mut packer = BlockPacker::new(block_offset);

    while let Some(line) = records.next_line()? {
        packer.push(&line, &mut writer)?;
    }
    records.finish()?;

    let index_offset = packer.finish(&mut writer)?;
    writer.flush()?;

    let mut file = writer
        .into_inner()
        .map_err(|err| DamError::Io(err.into_error()))?;
    headers::patch_offsets(&mut file, HEADER_SIZE as u64, block_offset, index_offset)?;

    log::info!(
        "dessicated {} records into {} blocks from {}",
        packer.n_records,
        packer.n_blocks,
        input.display()
    );

    Ok(())
}

/// Accumulates dessicated lines into size-bounded blocks and grows the
/// index payload as blocks are flushed.
struct BlockPacker {
    buffer: Vec<u8>,
    first_id: Option<String>,
    index: IndexBuilder,
    offset: u64,
    n_records: u64,
    n_blocks: u64,
}

impl BlockPacker {
    fn new(block_offset: u64) -> Self {
        BlockPacker {
            buffer: Vec::with_capacity(BLOCKSIZE),
            first_id: None,
            index: IndexBuilder::new(),
            offset: block_offset,
            n_records: 0,
            n_blocks: 0,
        }
    }

    fn push<W: Write>(
        &mut self,
        line: &str,
        conn: &mut W,
    ) -> Result<()> {
        let dessicated = block::dessicate_line(line);
        let id = block::read_id(&dessicated);
        self.n_records += 1;

        match &self.first_id {
            None => {
                self.first_id = Some(id.to_string());
            },
            Some(first) => {
                // Rollover only between id groups, never inside one.
                if first != id && self.buffer.len() + dessicated.len() > BLOCKSIZE {
                    self.flush(conn)?;
                    self.first_id = Some(id.to_string());
                }
            },
        }

        self.buffer.extend_from_slice(dessicated.as_bytes());
        self.buffer.push(b'\n');
        Ok(())
    }

    fn flush<W: Write>(
        &mut self,
        conn: &mut W,
    ) -> Result<()> {
        if let Some(first) = &self.first_id {
            self.index.push(first, self.offset);
        }
        let deflated = block::compress(&self.buffer)?;
        conn.write_all(&deflated)?;
        self.offset += deflated.len() as u64;
        self.n_blocks += 1;
        log::debug!(
            "flushed block {} ({} bytes deflated from {})",
            self.n_blocks - 1,
            deflated.len(),
            self.buffer.len()
        );
        self.buffer.clear();
        Ok(())
    }

    /// Flushes the final block, writes the compressed index, and returns
    /// the index offset for the header patch.
    fn finish<W: Write>(
        &mut self,
        conn: &mut W,
    ) -> Result<u64> {
        if !self.buffer.is_empty() {
            self.flush(conn)?;
        }
        let index_offset = self.offset;
        let payload = std::mem::take(&mut self.index).finish(index_offset);
        conn.write_all(&block::compress(&payload)?)?;
        Ok(index_offset)
    }
}
