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

//! Error types for dam.

use thiserror::Error;

/// Result type alias for dam operations.
pub type Result<T> = std::result::Result<T, DamError>;

/// Errors surfaced by archive creation, lookup, and hydration.
#[derive(Debug, Error)]
pub enum DamError {
    /// Filesystem or pipe failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not start with the archive magic bytes.
    #[error("not a dam archive: expected magic \"DAM1\", found {found:?}")]
    BadMagic {
        /// First four bytes of the file.
        found: [u8; 4],
    },

    /// The archive was written by an incompatible format version.
    #[error("unsupported archive version {found} (this build reads {expected})")]
    UnsupportedVersion {
        /// Version field from the archive header, times 100.
        found: u32,
        /// Version this build reads, times 100.
        expected: u32,
    },

    /// The source path does not fit in the fixed-size header.
    #[error("source path does not fit in the archive header: {0}")]
    PathTooLong(String),

    /// Single-read fetch for a read id the archive does not contain.
    #[error("read id not in archive: {0}")]
    NotFound(String),

    /// A spawned child process was missing or exited nonzero.
    #[error("external tool failed: {0}")]
    ExternalTool(String),

    /// Index parse failure, truncated block, or bzip2 decode failure.
    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    /// A sequence source with an extension hydration does not recognize.
    #[error("cannot determine sequence format from extension: {0}")]
    UnknownExtension(String),
}
