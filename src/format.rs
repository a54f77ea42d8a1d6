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

//! On-disk format constants and file type detection.
//!
//! A .dam archive is laid out as a 512-byte fixed header, the uncompressed
//! SAM text header copied from the source file, a run of bzip2-compressed
//! blocks of dessicated records, and a bzip2-compressed block index. All
//! integer fields in the fixed header and the index are little-endian;
//! archives are not portable to producers that pack big-endian.

use std::path::Path;

use crate::error::DamError;
use crate::error::Result;

/// Magic bytes at the start of every archive.
pub const MAGIC: [u8; 4] = *b"DAM1";

/// Archive format version, stored in the header as the version number
/// times 100.
pub const FORMAT_VERSION: u32 = 101;

/// Size of the fixed file header in bytes.
pub const HEADER_SIZE: usize = 512;

/// Decompressed block size cap in bytes.
///
/// A block may run over by the record that triggered the rollover, and by
/// any amount when every record in it shares one read id.
pub const BLOCKSIZE: usize = 1_048_576;

/// Default block cache budget in bytes.
pub const DEFAULT_CACHE_BYTES: usize = 100 * BLOCKSIZE;

/// Read id of the terminal index entry.
///
/// `~` (0x7e) sorts after every printable-ASCII read id; ids containing
/// bytes above 0x7e are not supported.
pub const SENTINEL_ID: &str = "~";

/// Alignment input formats accepted by dessication.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlignmentFormat {
    Bam,
    Sam,
}

impl AlignmentFormat {
    /// Detect the input format from a file extension.
    ///
    /// `.tam` files are plain SAM text under another name.
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path.file_name().unwrap_or(path.as_os_str()).to_string_lossy();
        if name.ends_with(".bam") {
            Ok(AlignmentFormat::Bam)
        } else if name.ends_with(".sam") || name.ends_with(".tam") {
            Ok(AlignmentFormat::Sam)
        } else {
            Err(DamError::UnknownExtension(name.to_string()))
        }
    }
}

/// Sequence sources accepted by hydration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeqFormat {
    Bam,
    Sam,
    Fastq,
    FastqGz,
    FastqBz2,
}

impl SeqFormat {
    /// Detect the sequence source format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path.file_name().unwrap_or(path.as_os_str()).to_string_lossy();
        if name.ends_with(".fastq.gz") {
            Ok(SeqFormat::FastqGz)
        } else if name.ends_with(".fastq.bz2") {
            Ok(SeqFormat::FastqBz2)
        } else if name.ends_with(".fastq") {
            Ok(SeqFormat::Fastq)
        } else if name.ends_with(".bam") {
            Ok(SeqFormat::Bam)
        } else if name.ends_with(".sam") || name.ends_with(".tam") {
            Ok(SeqFormat::Sam)
        } else {
            Err(DamError::UnknownExtension(name.to_string()))
        }
    }
}
