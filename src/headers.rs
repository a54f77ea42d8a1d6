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

//! Codec for the fixed 512-byte file header.

use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;

use byteorder::ByteOrder;
use byteorder::LittleEndian;
use byteorder::WriteBytesExt;

use crate::error::DamError;
use crate::error::Result;
use crate::format::FORMAT_VERSION;
use crate::format::HEADER_SIZE;
use crate::format::MAGIC;

/// Byte offset of the three offset fields inside the fixed header.
const OFFSET_FIELDS_AT: u64 = 8;

/// Byte offset where the zero-terminated source path starts.
const PATH_AT: usize = 32;

/// File header for a .dam archive
///
/// Always the first 512 bytes of the file. Layout, little-endian:
/// magic (4 bytes) | version x 100 (u32) | header_offset (u64) |
/// block_offset (u64) | index_offset (u64) | source_path (zero-terminated) |
/// zero padding up to 512 bytes.
///
#[derive(Clone, Debug, PartialEq)]
pub struct FileHeader {
    /// Magic bytes, always `DAM1`.
    pub magic: [u8; 4],
    /// Format version times 100.
    pub version: u32,
    /// Byte offset of the SAM text header, always 512.
    pub header_offset: u64,
    /// Byte offset of the first compressed block.
    pub block_offset: u64,
    /// Byte offset of the compressed block index.
    pub index_offset: u64,
    /// Absolute path of the source alignment file.
    pub source_path: String,
}

impl FileHeader {
    /// Preliminary header for a new archive: offsets other than
    /// `header_offset` stay zero until the body has been written.
    pub fn new(source_path: &str) -> Self {
        FileHeader {
            magic: MAGIC,
            version: FORMAT_VERSION,
            header_offset: HEADER_SIZE as u64,
            block_offset: 0,
            index_offset: 0,
            source_path: source_path.to_string(),
        }
    }

    /// Format version as a decimal number, 101 reads as 1.01.
    pub fn format_version(&self) -> f64 {
        self.version as f64 / 100.0
    }
}

pub fn encode_file_header(
    header: &FileHeader,
) -> Result<Vec<u8>> {
    let path_bytes = header.source_path.as_bytes();
    if PATH_AT + path_bytes.len() + 1 > HEADER_SIZE {
        return Err(DamError::PathTooLong(header.source_path.clone()));
    }

    let mut bytes: Vec<u8> = vec![0; HEADER_SIZE];
    bytes[0..4].copy_from_slice(&header.magic);
    LittleEndian::write_u32(&mut bytes[4..8], header.version);
    LittleEndian::write_u64(&mut bytes[8..16], header.header_offset);
    LittleEndian::write_u64(&mut bytes[16..24], header.block_offset);
    LittleEndian::write_u64(&mut bytes[24..32], header.index_offset);
    bytes[PATH_AT..PATH_AT + path_bytes.len()].copy_from_slice(path_bytes);

    Ok(bytes)
}

pub fn decode_file_header(
    header_bytes: &[u8],
) -> Result<FileHeader> {
    if header_bytes.len() < HEADER_SIZE {
        return Err(DamError::MalformedArchive(format!(
            "file header is {} bytes, expected {}",
            header_bytes.len(),
            HEADER_SIZE
        )));
    }

    let mut magic = [0_u8; 4];
    magic.copy_from_slice(&header_bytes[0..4]);
    if magic != MAGIC {
        return Err(DamError::BadMagic { found: magic });
    }

    let version = LittleEndian::read_u32(&header_bytes[4..8]);
    if version != FORMAT_VERSION {
        return Err(DamError::UnsupportedVersion {
            found: version,
            expected: FORMAT_VERSION,
        });
    }

    let header_offset = LittleEndian::read_u64(&header_bytes[8..16]);
    let block_offset = LittleEndian::read_u64(&header_bytes[16..24]);
    let index_offset = LittleEndian::read_u64(&header_bytes[24..32]);

    let path_region = &header_bytes[PATH_AT..HEADER_SIZE];
    let path_len = path_region
        .iter()
        .position(|byte| *byte == 0)
        .ok_or_else(|| DamError::MalformedArchive("source path is not zero-terminated".to_string()))?;
    let source_path = String::from_utf8_lossy(&path_region[0..path_len]).to_string();

    Ok(FileHeader {
        magic,
        version,
        header_offset,
        block_offset,
        index_offset,
        source_path,
    })
}

pub fn read_file_header<R: Read>(
    conn: &mut R,
) -> Result<FileHeader> {
    let mut header_bytes = [0_u8; HEADER_SIZE];
    conn.read_exact(&mut header_bytes).map_err(|err| {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            DamError::MalformedArchive("file is shorter than the fixed header".to_string())
        } else {
            DamError::Io(err)
        }
    })?;
    decode_file_header(&header_bytes)
}

/// Patches the three offset fields of an already-written header in place.
pub fn patch_offsets<W: Write + Seek>(
    conn: &mut W,
    header_offset: u64,
    block_offset: u64,
    index_offset: u64,
) -> Result<()> {
    conn.seek(SeekFrom::Start(OFFSET_FIELDS_AT))?;
    conn.write_u64::<LittleEndian>(header_offset)?;
    conn.write_u64::<LittleEndian>(block_offset)?;
    conn.write_u64::<LittleEndian>(index_offset)?;
    Ok(())
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn encode_file_header() {
        use super::FileHeader;
        use super::encode_file_header;

        let header = FileHeader {
            magic: *b"DAM1",
            version: 101,
            header_offset: 512,
            block_offset: 600,
            index_offset: 1000,
            source_path: "/data/sample.bam".to_string(),
        };

        let got = encode_file_header(&header).unwrap();

        assert_eq!(got.len(), 512);
        assert_eq!(&got[0..4], b"DAM1");
        assert_eq!(&got[4..8], &[101, 0, 0, 0]);
        assert_eq!(&got[8..16], &[0, 2, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&got[16..24], &[88, 2, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&got[24..32], &[232, 3, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&got[32..48], b"/data/sample.bam");
        assert!(got[48..].iter().all(|byte| *byte == 0));
    }

    #[test]
    fn decode_file_header() {
        use super::FileHeader;
        use super::decode_file_header;
        use super::encode_file_header;

        let expected = FileHeader {
            magic: *b"DAM1",
            version: 101,
            header_offset: 512,
            block_offset: 600,
            index_offset: 1000,
            source_path: "/data/sample.bam".to_string(),
        };

        let bytes = encode_file_header(&expected).unwrap();
        let got = decode_file_header(&bytes).unwrap();

        assert_eq!(got, expected);
    }

    #[test]
    fn decode_rejects_bad_magic() {
        use super::decode_file_header;
        use crate::error::DamError;

        let mut bytes: Vec<u8> = vec![0; 512];
        bytes[0..4].copy_from_slice(b"BAM1");

        let got = decode_file_header(&bytes);

        assert!(matches!(got, Err(DamError::BadMagic { found: [b'B', b'A', b'M', b'1'] })));
    }

    #[test]
    fn decode_rejects_unsupported_version() {
        use super::FileHeader;
        use super::decode_file_header;
        use super::encode_file_header;
        use crate::error::DamError;

        let mut header = FileHeader::new("/data/sample.bam");
        header.version = 200;
        let bytes = encode_file_header(&header).unwrap();

        let got = decode_file_header(&bytes);

        assert!(matches!(
            got,
            Err(DamError::UnsupportedVersion { found: 200, expected: 101 })
        ));
    }

    #[test]
    fn encode_rejects_long_source_path() {
        use super::FileHeader;
        use super::encode_file_header;
        use crate::error::DamError;

        let header = FileHeader::new(&"x".repeat(480));

        let got = encode_file_header(&header);

        assert!(matches!(got, Err(DamError::PathTooLong(_))));
    }

    #[test]
    fn longest_source_path_that_fits() {
        use super::FileHeader;
        use super::decode_file_header;
        use super::encode_file_header;

        let path = "x".repeat(479);
        let header = FileHeader::new(&path);

        let bytes = encode_file_header(&header).unwrap();
        let got = decode_file_header(&bytes).unwrap();

        assert_eq!(got.source_path, path);
    }

    #[test]
    fn read_file_header() {
        use super::FileHeader;
        use super::encode_file_header;
        use super::read_file_header;
        use std::io::Cursor;

        let expected = FileHeader::new("/data/sample.sam");
        let mut data = Cursor::new(encode_file_header(&expected).unwrap());

        let got = read_file_header(&mut data).unwrap();

        assert_eq!(got, expected);
    }

    #[test]
    fn patch_offsets_rewrites_fields() {
        use super::FileHeader;
        use super::decode_file_header;
        use super::encode_file_header;
        use super::patch_offsets;
        use std::io::Cursor;

        let header = FileHeader::new("/data/sample.sam");
        let mut conn = Cursor::new(encode_file_header(&header).unwrap());

        patch_offsets(&mut conn, 512, 700, 4096).unwrap();

        let got = decode_file_header(conn.get_ref()).unwrap();
        assert_eq!(got.header_offset, 512);
        assert_eq!(got.block_offset, 700);
        assert_eq!(got.index_offset, 4096);
        assert_eq!(got.source_path, "/data/sample.sam");
    }
}
