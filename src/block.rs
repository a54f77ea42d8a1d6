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

//! bzip2 block codec and dessicated line helpers.
//!
//! Blocks and the index payload are plain single-stream bzip2; no framing
//! beyond what bzip2 itself writes.

use std::io::Read;
use std::io::Write;

use bzip2::Compression;
use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;

use crate::error::DamError;
use crate::error::Result;

pub fn compress(
    bytes: &[u8],
) -> Result<Vec<u8>> {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

pub fn decompress(
    bytes: &[u8],
) -> Result<Vec<u8>> {
    let mut decoder = BzDecoder::new(bytes);
    let mut inflated: Vec<u8> = Vec::new();
    decoder
        .read_to_end(&mut inflated)
        .map_err(|err| DamError::MalformedArchive(format!("bzip2 decode failed: {}", err)))?;
    Ok(inflated)
}

/// First tab-delimited field of a record line, the read id.
pub fn read_id(line: &str) -> &str {
    line.split('\t').next().unwrap_or(line)
}

/// Drops the sequence and quality columns (9 and 10) from a SAM record
/// line. Columns 0 to 8 and any trailing tag columns pass through verbatim.
pub fn dessicate_line(line: &str) -> String {
    let fields: Vec<&str> = line.split('\t').collect();
    let mut kept: Vec<&str> = Vec::with_capacity(fields.len().saturating_sub(2));
    kept.extend(fields.iter().take(9));
    kept.extend(fields.iter().skip(11));
    kept.join("\t")
}

/// Reinserts `*` placeholders for the missing sequence and quality columns
/// so a dessicated line is well-formed SAM again.
pub fn reinflate_line(line: &str) -> String {
    let fields: Vec<&str> = line.split('\t').collect();
    let mut out: Vec<&str> = Vec::with_capacity(fields.len() + 2);
    out.extend(fields.iter().take(9));
    out.push("*");
    out.push("*");
    out.extend(fields.iter().skip(9));
    out.join("\t")
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn compress_decompress_roundtrip() {
        use super::compress;
        use super::decompress;

        let data = b"r1\t0\tchrA\t100\t60\t10M\t*\t0\t0\nr2\t0\tchrA\t200\t60\t10M\t*\t0\t0\n";

        let deflated = compress(data).unwrap();
        let got = decompress(&deflated).unwrap();

        assert_eq!(got, data);
    }

    #[test]
    fn decompress_rejects_garbage() {
        use super::decompress;
        use crate::error::DamError;

        let got = decompress(b"this is not a bzip2 stream");

        assert!(matches!(got, Err(DamError::MalformedArchive(_))));
    }

    #[test]
    fn dessicate_line_drops_seq_and_qual() {
        use super::dessicate_line;

        let line = "r1\t0\tchrA\t100\t60\t10M\t*\t0\t0\tACGTACGTAC\tIIIIIIIIII\tNM:i:0\tAS:i:10";
        let expected = "r1\t0\tchrA\t100\t60\t10M\t*\t0\t0\tNM:i:0\tAS:i:10";

        let got = dessicate_line(line);

        assert_eq!(got, expected);
    }

    #[test]
    fn dessicate_line_without_tags() {
        use super::dessicate_line;

        let line = "r1\t0\tchrA\t100\t60\t10M\t*\t0\t0\tACGTACGTAC\tIIIIIIIIII";
        let expected = "r1\t0\tchrA\t100\t60\t10M\t*\t0\t0";

        let got = dessicate_line(line);

        assert_eq!(got, expected);
    }

    #[test]
    fn reinflate_line_restores_sam_shape() {
        use super::reinflate_line;

        let line = "r1\t0\tchrA\t100\t60\t10M\t*\t0\t0\tNM:i:0";
        let expected = "r1\t0\tchrA\t100\t60\t10M\t*\t0\t0\t*\t*\tNM:i:0";

        let got = reinflate_line(line);

        assert_eq!(got, expected);
    }

    #[test]
    fn read_id_is_first_field() {
        use super::read_id;

        assert_eq!(read_id("r1\t0\tchrA"), "r1");
        assert_eq!(read_id("lone"), "lone");
    }
}
