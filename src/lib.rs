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

//! dam is a library and a command-line client for storing the mapping and
//! annotation columns of SAM/BAM alignment files in compact .dam archives
//! ("dessicated BAM") and reconstructing the full data by combining an
//! archive with any file that still carries the read sequences and base
//! qualities.
//!
//! dam supports the following three operations:
//!   - `dam dessicate` create an archive from a SAM or BAM file.
//!   - `dam hydrate` rebuild a BAM file from an archive and a sequence
//!     source (SAM, BAM, or FASTQ, possibly gzip or bzip2 compressed).
//!   - `dam view` print the SAM header and the archive records in a read
//!     id range.
//!
//! An archive stores records sorted by read id in bzip2-compressed blocks
//! behind a fixed 512-byte header, with a compressed sparse index at the
//! tail mapping each block's first read id to its byte offset. Lookups
//! binary search the index for the block, then the decompressed block for
//! the record; decompressed blocks are kept in a byte-budgeted LRU cache.
//! Records sharing a read id always live in one block, so a single block
//! search finds all of them.
//!
//! The external toolchain is expected on PATH: `samtools` for BAM decoding
//! and encoding, and `sort` for the read-id ordering of creation and
//! hydration inputs.

pub mod block;
pub mod cache;
pub mod dessicate;
pub mod error;
pub mod format;
pub mod headers;
pub mod hydrate;
pub mod index;
pub mod iter;
pub mod reader;
pub mod stream;

use std::io::Write;
use std::path::Path;

pub use crate::dessicate::dessicate;
pub use crate::error::DamError;
pub use crate::error::Result;
pub use crate::hydrate::hydrate;
pub use crate::iter::Records;
pub use crate::reader::Reader;

/// Writes the archive's SAM header and the dessicated records in the
/// inclusive `[start, end]` read id range to `conn`.
pub fn view<W: Write>(
    archive: &Path,
    start: Option<&str>,
    end: Option<&str>,
    conn: &mut W,
) -> Result<()> {
    let mut reader = Reader::new(archive);
    conn.write_all(reader.sam_header()?)?;
    for line in reader.records(start, end)? {
        writeln!(conn, "{}", line?)?;
    }
    Ok(())
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn dessicate_single_record_and_fetch() {
        use crate::Reader;
        use crate::dessicate;

        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("input.sam");
        let archive = dir.path().join("input.dam");
        std::fs::write(
            &input,
            "r1\t0\tchrA\t100\t60\t10M\t*\t0\t0\tACGTACGTAC\tIIIIIIIIII\n",
        )
        .unwrap();

        dessicate(&input, &archive, &[]).unwrap();

        let mut reader = Reader::new(&archive);
        let got = reader.fetch_read("r1").unwrap();

        assert_eq!(got, vec!["r1\t0\tchrA\t100\t60\t10M\t*\t0\t0\t*\t*".to_string()]);
    }

    #[test]
    fn dessicate_groups_shared_ids_in_one_block() {
        use crate::Reader;
        use crate::dessicate;

        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("input.sam");
        let archive = dir.path().join("input.dam");
        std::fs::write(
            &input,
            "r1\t0\tchrA\t100\t60\t4M\t*\t0\t0\tAAAA\tIIII\n\
             r1\t256\tchrB\t40\t0\t4M\t*\t0\t0\tAAAA\tIIII\n\
             r2\t0\tchrA\t200\t60\t4M\t*\t0\t0\tCCCC\tJJJJ\n",
        )
        .unwrap();

        dessicate(&input, &archive, &[]).unwrap();

        let mut reader = Reader::new(&archive);

        assert_eq!(reader.fetch_read("r1").unwrap().len(), 2);

        let got: Vec<String> = reader
            .records(None, None)
            .unwrap()
            .collect::<crate::Result<Vec<String>>>()
            .unwrap();
        let ids: Vec<&str> = got.iter().map(|line| crate::block::read_id(line)).collect();
        assert_eq!(ids, vec!["r1", "r1", "r2"]);
    }

    #[test]
    fn created_archive_honors_header_layout() {
        use crate::Reader;
        use crate::dessicate;
        use crate::format::HEADER_SIZE;

        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("input.sam");
        let archive = dir.path().join("input.dam");
        std::fs::write(
            &input,
            "@HD\tVN:1.6\n\
             @SQ\tSN:chrA\tLN:1000\n\
             r1\t0\tchrA\t100\t60\t4M\t*\t0\t0\tAAAA\tIIII\n",
        )
        .unwrap();

        dessicate(&input, &archive, &[]).unwrap();

        let file_size = std::fs::metadata(&archive).unwrap().len();
        let mut reader = Reader::new(&archive);
        let sam_header_len = reader.sam_header().unwrap().len() as u64;
        let header = reader.header().unwrap();

        assert_eq!(header.magic, *b"DAM1");
        assert_eq!(header.version, 101);
        assert_eq!(header.header_offset, HEADER_SIZE as u64);
        assert_eq!(header.block_offset, HEADER_SIZE as u64 + sam_header_len);
        assert!(header.block_offset < header.index_offset);
        assert!(header.index_offset < file_size);
        assert!(header.source_path.ends_with("input.sam"));
    }

    #[test]
    fn view_prints_header_and_range() {
        use crate::dessicate;
        use crate::view;

        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("input.sam");
        let archive = dir.path().join("input.dam");
        std::fs::write(
            &input,
            "@HD\tVN:1.6\n\
             r1\t0\tchrA\t1\t60\t4M\t*\t0\t0\tAAAA\tIIII\n\
             r2\t0\tchrA\t2\t60\t4M\t*\t0\t0\tAAAA\tIIII\n\
             r3\t0\tchrA\t3\t60\t4M\t*\t0\t0\tAAAA\tIIII\n\
             r4\t0\tchrA\t4\t60\t4M\t*\t0\t0\tAAAA\tIIII\n\
             r5\t0\tchrA\t5\t60\t4M\t*\t0\t0\tAAAA\tIIII\n",
        )
        .unwrap();

        dessicate(&input, &archive, &[]).unwrap();

        let mut out: Vec<u8> = Vec::new();
        view(&archive, Some("r2"), Some("r4"), &mut out).unwrap();

        let got = String::from_utf8(out).unwrap();
        let expected = "@HD\tVN:1.6\n\
                        r2\t0\tchrA\t2\t60\t4M\t*\t0\t0\n\
                        r3\t0\tchrA\t3\t60\t4M\t*\t0\t0\n\
                        r4\t0\tchrA\t4\t60\t4M\t*\t0\t0\n";
        assert_eq!(got, expected);
    }

    #[test]
    fn dessicate_sorts_unsorted_input() {
        use crate::Reader;
        use crate::dessicate;

        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("input.sam");
        let archive = dir.path().join("input.dam");
        std::fs::write(
            &input,
            "r3\t0\tchrA\t3\t60\t4M\t*\t0\t0\tAAAA\tIIII\n\
             r1\t0\tchrA\t1\t60\t4M\t*\t0\t0\tAAAA\tIIII\n\
             r2\t0\tchrA\t2\t60\t4M\t*\t0\t0\tAAAA\tIIII\n",
        )
        .unwrap();

        dessicate(&input, &archive, &[]).unwrap();

        let mut reader = Reader::new(&archive);
        let mut got: Vec<String> = Vec::new();
        while let Some(line) = reader.next_read(None, None).unwrap() {
            got.push(line);
        }

        let ids: Vec<&str> = got.iter().map(|line| crate::block::read_id(line)).collect();
        assert_eq!(ids, vec!["r1", "r2", "r3"]);
    }

    #[test]
    fn dessicate_empty_input_yields_valid_archive() {
        use crate::Reader;
        use crate::dessicate;
        use crate::error::DamError;

        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("input.sam");
        let archive = dir.path().join("input.dam");
        std::fs::write(&input, "@HD\tVN:1.6\n").unwrap();

        dessicate(&input, &archive, &[]).unwrap();

        let mut reader = Reader::new(&archive);
        assert_eq!(reader.sam_header().unwrap(), b"@HD\tVN:1.6\n");
        assert_eq!(reader.records(None, None).unwrap().count(), 0);
        assert!(matches!(reader.fetch_read("r1"), Err(DamError::NotFound(_))));

        let header = reader.header().unwrap();
        assert_eq!(header.block_offset, header.index_offset);
    }

    #[test]
    fn dessicate_honors_tmpdir_hints() {
        use crate::Reader;
        use crate::dessicate;

        let dir = tempfile::TempDir::new().unwrap();
        let tmp = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("input.sam");
        let archive = dir.path().join("input.dam");
        std::fs::write(&input, "r1\t0\tchrA\t1\t60\t4M\t*\t0\t0\tAAAA\tIIII\n").unwrap();

        dessicate(&input, &archive, &[tmp.path().to_path_buf()]).unwrap();

        let mut reader = Reader::new(&archive);
        assert_eq!(reader.fetch_read("r1").unwrap().len(), 1);
    }
}
