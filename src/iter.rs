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

//! Forward-only iteration over a read id range of an archive.
//!
//! Iteration yields lines in their on-disk dessicated form, without the
//! `*` placeholders that [fetch_read](crate::Reader::fetch_read) inserts.
//! Single-record fetches hand out well-formed SAM because that is the shape
//! lookups feed into downstream tools; range scans reproduce the archive
//! contents byte for byte.

use crate::block;
use crate::cache::BlockLines;
use crate::error::Result;
use crate::reader::Archive;

/// Cursor state of a range scan: the current block, the line inside it,
/// the block's decompressed lines, and the inclusive end bound.
#[derive(Debug, Default)]
pub(crate) struct RangeState {
    block_index: usize,
    line_index: usize,
    lines: Option<BlockLines>,
    end_id: Option<String>,
}

impl RangeState {
    /// Scan from the first record of the archive.
    pub(crate) fn scan(end: Option<&str>) -> Self {
        RangeState {
            block_index: 0,
            line_index: 0,
            lines: None,
            end_id: end.map(str::to_string),
        }
    }

    /// Scan from the first record whose id is not less than `start`.
    pub(crate) fn seek(
        archive: &mut Archive,
        start: &str,
        end: Option<&str>,
    ) -> Result<Self> {
        let end_id = end.map(str::to_string);

        let pos = match archive.index().start_block(start) {
            Some(pos) => pos,
            None => {
                // Start id sorts after every block.
                return Ok(RangeState {
                    block_index: archive.index().n_blocks(),
                    line_index: 0,
                    lines: None,
                    end_id,
                });
            },
        };

        let lines = archive.fetch_block(pos)?;
        let key = format!("{}\t", start);
        let line_index = lines.partition_point(|line| line.as_str() < key.as_str());

        Ok(RangeState {
            block_index: pos,
            line_index,
            lines: Some(lines),
            end_id,
        })
    }

    /// Restart from the beginning of the archive, keeping the end bound.
    pub(crate) fn reset(&mut self) {
        self.block_index = 0;
        self.line_index = 0;
        self.lines = None;
    }

    /// Next line in block order, or None once the range is exhausted.
    pub(crate) fn advance(
        &mut self,
        archive: &mut Archive,
    ) -> Result<Option<String>> {
        loop {
            if self.lines.is_none() {
                if self.block_index >= archive.index().n_blocks() {
                    return Ok(None);
                }
                let fetched = archive.fetch_block(self.block_index)?;
                if fetched.is_empty() {
                    return Ok(None);
                }
                self.lines = Some(fetched);
            }

            if let Some(lines) = &self.lines {
                if self.line_index < lines.len() {
                    let line = &lines[self.line_index];
                    if let Some(end_id) = &self.end_id {
                        if block::read_id(line) > end_id.as_str() {
                            return Ok(None);
                        }
                    }
                    let line = line.clone();
                    self.line_index += 1;
                    return Ok(Some(line));
                }
            }

            self.block_index += 1;
            self.line_index = 0;
            self.lines = None;
        }
    }
}

/// Iterator over the dessicated record lines in an inclusive
/// `[start, end]` read id range.
pub struct Records<'a> {
    archive: &'a mut Archive,
    state: RangeState,
}

impl<'a> Records<'a> {
    pub(crate) fn new(
        archive: &'a mut Archive,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Self> {
        let state = match start {
            Some(start) => RangeState::seek(archive, start, end)?,
            None => RangeState::scan(end),
        };
        Ok(Records { archive, state })
    }

    /// Restart the scan from the beginning of the archive.
    pub fn reset(&mut self) {
        self.state.reset();
    }
}

impl Iterator for Records<'_> {
    type Item = Result<String>;

    fn next(
        &mut self,
    ) -> Option<Self::Item> {
        match self.state.advance(self.archive) {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}
