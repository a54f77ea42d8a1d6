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

//! Read-side archive facade.

use std::fs::File;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use crate::block;
use crate::cache::BlockCache;
use crate::cache::BlockLines;
use crate::error::DamError;
use crate::error::Result;
use crate::format::DEFAULT_CACHE_BYTES;
use crate::headers::FileHeader;
use crate::headers::read_file_header;
use crate::index::BlockIndex;
use crate::iter::RangeState;
use crate::iter::Records;

/// Handle to a .dam archive.
///
/// The file is opened and the header and block index are loaded on the
/// first accessor call; afterwards everything except block contents is
/// served from memory. A Reader is single-threaded; open several Readers
/// on the same file for independent use, each carries its own block cache.
pub struct Reader {
    path: PathBuf,
    archive: Option<Archive>,
    walk: Option<RangeState>,
}

impl Reader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Reader {
            path: path.as_ref().to_path_buf(),
            archive: None,
            walk: None,
        }
    }

    /// Parsed fixed header.
    pub fn header(&mut self) -> Result<&FileHeader> {
        Ok(&self.archive()?.header)
    }

    /// Raw SAM text header bytes copied from the source alignment file.
    pub fn sam_header(&mut self) -> Result<&[u8]> {
        Ok(&self.archive()?.sam_header)
    }

    /// All records for `read_id`, with `*` placeholders reinserted for the
    /// sequence and quality columns. Fails with
    /// [NotFound](DamError::NotFound) when the archive has no such id.
    pub fn fetch_read(&mut self, read_id: &str) -> Result<Vec<String>> {
        self.archive()?.lookup_record(read_id)
    }

    /// Iterator over dessicated record lines in the inclusive
    /// `[start, end]` read id range. Both bounds optional.
    pub fn records(
        &mut self,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Records<'_>> {
        Records::new(self.archive()?, start, end)
    }

    /// One dessicated record line per call, from a hidden cursor over the
    /// `[start, end]` range. The cursor is created on first call and
    /// dropped once exhausted, so the call after a None starts over.
    pub fn next_read(
        &mut self,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Option<String>> {
        if self.walk.is_none() {
            let archive = self.archive()?;
            let state = match start {
                Some(start) => RangeState::seek(archive, start, end)?,
                None => RangeState::scan(end),
            };
            self.walk = Some(state);
        }

        let mut state = match self.walk.take() {
            Some(state) => state,
            None => return Ok(None),
        };
        let item = state.advance(self.archive()?)?;
        if item.is_some() {
            self.walk = Some(state);
        }
        Ok(item)
    }

    pub(crate) fn archive(&mut self) -> Result<&mut Archive> {
        match self.archive {
            Some(ref mut archive) => Ok(archive),
            None => {
                let archive = Archive::open(&self.path)?;
                Ok(self.archive.insert(archive))
            },
        }
    }
}

/// Opened archive: file handle, parsed header, SAM header bytes, block
/// index, and the block cache.
pub(crate) struct Archive {
    file: File,
    header: FileHeader,
    sam_header: Vec<u8>,
    index: BlockIndex,
    cache: BlockCache,
}

impl Archive {
    fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let header = read_file_header(&mut file)?;

        if header.block_offset < header.header_offset || header.index_offset < header.block_offset {
            return Err(DamError::MalformedArchive(
                "header offsets are not ascending".to_string(),
            ));
        }
        let file_size = file.seek(SeekFrom::End(0))?;
        if file_size < header.index_offset {
            return Err(DamError::MalformedArchive(
                "index offset points past the end of the file".to_string(),
            ));
        }

        file.seek(SeekFrom::Start(header.header_offset))?;
        let mut sam_header = vec![0; (header.block_offset - header.header_offset) as usize];
        read_fully(&mut file, &mut sam_header, "SAM header")?;

        file.seek(SeekFrom::Start(header.index_offset))?;
        let mut index_bytes = vec![0; (file_size - header.index_offset) as usize];
        read_fully(&mut file, &mut index_bytes, "block index")?;
        let index = BlockIndex::parse(&block::decompress(&index_bytes)?)?;

        Ok(Archive {
            file,
            header,
            sam_header,
            index,
            cache: BlockCache::new(DEFAULT_CACHE_BYTES),
        })
    }

    pub(crate) fn index(&self) -> &BlockIndex {
        &self.index
    }

    /// Decompressed lines of block `pos`, from cache when possible.
    pub(crate) fn fetch_block(&mut self, pos: usize) -> Result<BlockLines> {
        if let Some(lines) = self.cache.get(pos) {
            return Ok(lines);
        }

        let (offset, length) = match self.index.block_extent(pos) {
            Some(extent) => extent,
            None => return Ok(Arc::new(Vec::new())),
        };
        if length == 0 {
            return Ok(Arc::new(Vec::new()));
        }

        self.file.seek(SeekFrom::Start(offset))?;
        let mut deflated = vec![0; length as usize];
        read_fully(&mut self.file, &mut deflated, "block")?;

        let plain = block::decompress(&deflated)?;
        let text = String::from_utf8_lossy(&plain);
        // The trailing newline splits into one empty element, drop it.
        let lines: Vec<String> = text
            .split('\n')
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        let lines = Arc::new(lines);
        self.cache.put(pos, Arc::clone(&lines));
        Ok(lines)
    }

    /// All record lines for `read_id` in its candidate block, reinflated
    /// to SAM shape.
    pub(crate) fn lookup_record(&mut self, read_id: &str) -> Result<Vec<String>> {
        let pos = self
            .index
            .candidate_block(read_id)
            .ok_or_else(|| DamError::NotFound(read_id.to_string()))?;
        let lines = self.fetch_block(pos)?;

        let key = format!("{}\t", read_id);
        let first = lines.partition_point(|line| line.as_str() < key.as_str());

        let mut records: Vec<String> = Vec::new();
        for line in lines.iter().skip(first) {
            if !line.starts_with(&key) {
                break;
            }
            records.push(block::reinflate_line(line));
        }

        if records.is_empty() {
            return Err(DamError::NotFound(read_id.to_string()));
        }
        Ok(records)
    }
}

fn read_fully(file: &mut File, buf: &mut [u8], what: &str) -> Result<()> {
    file.read_exact(buf).map_err(|err| {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            DamError::MalformedArchive(format!("truncated {}", what))
        } else {
            DamError::Io(err)
        }
    })
}
