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

//! Rehydration: merge archive records with an external sequence source.
//!
//! Both sides are sorted by read id, so one forward pass suffices. Archive
//! records whose id is missing from the sequence source are written in
//! their dessicated form, without placeholder columns; this mirrors the
//! tool the format comes from, so hydrated output stays byte-comparable
//! with it.

use std::io::Write;
use std::path::Path;

use crate::block;
use crate::error::Result;
use crate::format::SeqFormat;
use crate::reader::Reader;
use crate::stream;
use crate::stream::SortedLines;

/// Reconstructs SAM text from `reader` and the sequence source `seqs`,
/// writing the archive's SAM header followed by one record line per
/// archive record. Pipe the output through a SAM-to-BAM converter to get
/// BAM back.
pub fn hydrate<W: Write>(
    reader: &mut Reader,
    seqs: &Path,
    conn: &mut W,
) -> Result<()> {
    let format = SeqFormat::from_path(seqs)?;

    conn.write_all(reader.sam_header()?)?;

    let mut seq_stream = stream::sorted_sequences(seqs, format, &[])?;
    let mut pending = next_seq_fields(&mut seq_stream)?;

    let mut n_merged: u64 = 0;
    let mut n_dry: u64 = 0;

    for line in reader.records(None, None)? {
        let dam_line = line?;
        let dam_id = block::read_id(&dam_line);

        while let Some(fields) = &pending {
            if fields[0].as_str() < dam_id {
                pending = next_seq_fields(&mut seq_stream)?;
            } else {
                break;
            }
        }

        match &pending {
            Some(fields) if fields[0] == dam_id && fields.len() > 10 => {
                writeln!(conn, "{}", reinject(&dam_line, &fields[9], &fields[10]))?;
                n_merged += 1;
            },
            _ => {
                // No sequence for this id: the record keeps its
                // dessicated shape.
                writeln!(conn, "{}", dam_line)?;
                n_dry += 1;
            },
        }
    }

    if pending.is_none() {
        seq_stream.finish()?;
    }

    log::info!(
        "hydrated {} records with sequences, {} without, from {}",
        n_merged,
        n_dry,
        seqs.display()
    );

    Ok(())
}

/// Splices sequence and quality back in as columns 9 and 10 of a
/// dessicated line.
fn reinject(dam_line: &str, seq: &str, qual: &str) -> String {
    let fields: Vec<&str> = dam_line.split('\t').collect();
    let mut out: Vec<&str> = Vec::with_capacity(fields.len() + 2);
    out.extend(fields.iter().take(9));
    out.push(seq);
    out.push(qual);
    out.extend(fields.iter().skip(9));
    out.join("\t")
}

fn next_seq_fields(stream: &mut SortedLines) -> Result<Option<Vec<String>>> {
    Ok(stream
        .next_line()?
        .map(|line| line.split('\t').map(str::to_string).collect()))
}
