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

//! Sorted record streams over alignment and sequence source files.
//!
//! Both archive creation and hydration consume their input as a stream of
//! tab-delimited lines sorted byte-lexicographically by the read id in
//! column 0. Sorting is delegated to the external `sort` with `LC_ALL=C`;
//! BAM decoding is delegated to `samtools view`. FASTQ sources are
//! decompressed in process and rewritten as synthetic tab-delimited lines
//! carrying the sequence and quality in columns 9 and 10.

use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Lines;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::Child;
use std::process::ChildStdin;
use std::process::ChildStdout;
use std::process::Command;
use std::process::Stdio;
use std::thread::JoinHandle;

use bzip2::read::BzDecoder;
use flate2::read::MultiGzDecoder;

use crate::error::DamError;
use crate::error::Result;
use crate::format::AlignmentFormat;
use crate::format::SeqFormat;

/// A running pipeline of child processes emitting sorted record lines.
///
/// Dropping the stream kills any children that are still running, so an
/// early stop does not leave a blocked `sort` behind. Call [finish] after
/// reading to end of stream to surface nonzero child exits.
pub struct SortedLines {
    children: Vec<(&'static str, Child)>,
    feeder: Option<JoinHandle<std::io::Result<()>>>,
    lines: Lines<BufReader<ChildStdout>>,
}

impl SortedLines {
    pub fn next_line(
        &mut self,
    ) -> Result<Option<String>> {
        match self.lines.next() {
            Some(Ok(line)) => Ok(Some(line)),
            Some(Err(err)) => Err(err.into()),
            None => Ok(None),
        }
    }

    /// Awaits the feeder thread and every child, failing on nonzero exit.
    pub fn finish(
        mut self,
    ) -> Result<()> {
        if let Some(handle) = self.feeder.take() {
            match handle.join() {
                Ok(result) => result?,
                Err(_) => {
                    return Err(DamError::ExternalTool("stream feeder thread panicked".to_string()));
                },
            }
        }
        for (name, mut child) in std::mem::take(&mut self.children) {
            let status = child.wait()?;
            if !status.success() {
                return Err(DamError::ExternalTool(format!("{} exited with {}", name, status)));
            }
        }
        Ok(())
    }
}

impl Drop for SortedLines {
    fn drop(&mut self) {
        for (_, child) in &mut self.children {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Sorted dessication input: alignment records of `path` without the SAM
/// header, ordered by read id.
pub fn sorted_alignments(
    path: &Path,
    format: AlignmentFormat,
    tmpdirs: &[PathBuf],
) -> Result<SortedLines> {
    match format {
        AlignmentFormat::Bam => sorted_bam(path, tmpdirs),
        AlignmentFormat::Sam => {
            let file = File::open(path)?;
            sorted_from_feeder(tmpdirs, move |sink| feed_sam(file, sink))
        },
    }
}

/// Sorted hydration input: lines with the read id in column 0 and the
/// sequence and quality in columns 9 and 10, ordered by read id.
pub fn sorted_sequences(
    path: &Path,
    format: SeqFormat,
    tmpdirs: &[PathBuf],
) -> Result<SortedLines> {
    match format {
        SeqFormat::Bam => sorted_bam(path, tmpdirs),
        SeqFormat::Sam => {
            let file = File::open(path)?;
            sorted_from_feeder(tmpdirs, move |sink| feed_sam(file, sink))
        },
        SeqFormat::Fastq => {
            let file = File::open(path)?;
            sorted_from_feeder(tmpdirs, move |sink| feed_fastq(file, sink))
        },
        SeqFormat::FastqGz => {
            let file = MultiGzDecoder::new(File::open(path)?);
            sorted_from_feeder(tmpdirs, move |sink| feed_fastq(file, sink))
        },
        SeqFormat::FastqBz2 => {
            let file = BzDecoder::new(File::open(path)?);
            sorted_from_feeder(tmpdirs, move |sink| feed_fastq(file, sink))
        },
    }
}

/// SAM text header of an alignment file: `samtools view -H` for BAM, the
/// leading `@` lines for SAM. Bytes are returned verbatim.
pub fn sam_text_header(
    path: &Path,
    format: AlignmentFormat,
) -> Result<Vec<u8>> {
    match format {
        AlignmentFormat::Bam => {
            let output = Command::new("samtools")
                .arg("view")
                .arg("-H")
                .arg(path)
                .output()
                .map_err(|err| DamError::ExternalTool(format!("failed to run samtools view -H: {}", err)))?;
            if !output.status.success() {
                return Err(DamError::ExternalTool(format!(
                    "samtools view -H exited with {}",
                    output.status
                )));
            }
            Ok(output.stdout)
        },
        AlignmentFormat::Sam => {
            let mut reader = BufReader::new(File::open(path)?);
            let mut header: Vec<u8> = Vec::new();
            let mut line: Vec<u8> = Vec::new();
            loop {
                line.clear();
                let nread = reader.read_until(b'\n', &mut line)?;
                if nread == 0 || !line.starts_with(b"@") {
                    break;
                }
                header.extend_from_slice(&line);
            }
            Ok(header)
        },
    }
}

/// `samtools view` piped straight into `sort`.
fn sorted_bam(
    path: &Path,
    tmpdirs: &[PathBuf],
) -> Result<SortedLines> {
    let mut samtools = Command::new("samtools")
        .arg("view")
        .arg(path)
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|err| DamError::ExternalTool(format!("failed to spawn samtools view: {}", err)))?;
    let sam_out = samtools
        .stdout
        .take()
        .ok_or_else(|| DamError::ExternalTool("samtools view has no stdout".to_string()))?;

    let mut sort = sort_command(tmpdirs)
        .stdin(Stdio::from(sam_out))
        .spawn()
        .map_err(|err| DamError::ExternalTool(format!("failed to spawn sort: {}", err)))?;
    let sort_out = sort
        .stdout
        .take()
        .ok_or_else(|| DamError::ExternalTool("sort has no stdout".to_string()))?;

    Ok(SortedLines {
        children: vec![("samtools view", samtools), ("sort", sort)],
        feeder: None,
        lines: BufReader::new(sort_out).lines(),
    })
}

/// `sort` fed from an in-process reader thread.
fn sorted_from_feeder<F>(
    tmpdirs: &[PathBuf],
    feed: F,
) -> Result<SortedLines>
where
    F: FnOnce(ChildStdin) -> std::io::Result<()> + Send + 'static,
{
    let mut sort = sort_command(tmpdirs)
        .stdin(Stdio::piped())
        .spawn()
        .map_err(|err| DamError::ExternalTool(format!("failed to spawn sort: {}", err)))?;
    let sink = sort
        .stdin
        .take()
        .ok_or_else(|| DamError::ExternalTool("sort has no stdin".to_string()))?;
    let sort_out = sort
        .stdout
        .take()
        .ok_or_else(|| DamError::ExternalTool("sort has no stdout".to_string()))?;

    let feeder = std::thread::spawn(move || feed(sink));

    Ok(SortedLines {
        children: vec![("sort", sort)],
        feeder: Some(feeder),
        lines: BufReader::new(sort_out).lines(),
    })
}

/// Byte-lexicographic stable sort on the read id column. Stability keeps
/// records sharing an id in their input order.
fn sort_command(tmpdirs: &[PathBuf]) -> Command {
    let mut cmd = Command::new("sort");
    cmd.arg("-t").arg("\t").arg("-k1,1").arg("-s");
    for dir in tmpdirs {
        cmd.arg("-T").arg(dir);
    }
    cmd.env("LC_ALL", "C");
    cmd.stdout(Stdio::piped());
    cmd
}

fn feed_sam<R: Read>(
    source: R,
    sink: ChildStdin,
) -> std::io::Result<()> {
    let reader = BufReader::new(source);
    let mut sink = std::io::BufWriter::new(sink);
    for line in reader.lines() {
        let line = line?;
        if line.starts_with('@') {
            continue;
        }
        if write_or_eof(&mut sink, &line)? {
            return Ok(());
        }
    }
    flush_or_eof(&mut sink)
}

/// Rewrites 4-line FASTQ records as tab-delimited lines with eight empty
/// columns between the read id and the sequence, so the sequence and
/// quality land in columns 9 and 10.
fn feed_fastq<R: Read>(
    source: R,
    sink: ChildStdin,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(source);
    let mut sink = std::io::BufWriter::new(sink);
    loop {
        let header = match read_trimmed_line(&mut reader)? {
            Some(line) => line,
            None => break,
        };
        let seq = read_trimmed_line(&mut reader)?;
        let _plus = read_trimmed_line(&mut reader)?;
        let qual = read_trimmed_line(&mut reader)?;
        let (seq, qual) = match (seq, qual) {
            (Some(seq), Some(qual)) => (seq, qual),
            _ => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "truncated FASTQ record",
                ));
            },
        };

        let id = header
            .trim_start_matches('@')
            .split_ascii_whitespace()
            .next()
            .unwrap_or("");
        let line = format!("{}\t\t\t\t\t\t\t\t\t{}\t{}", id, seq, qual);
        if write_or_eof(&mut sink, &line)? {
            return Ok(());
        }
    }
    flush_or_eof(&mut sink)
}

/// Writes one line; a closed pipe reports true so the feeder stops quietly
/// and the child's exit status tells the real story.
fn write_or_eof<W: Write>(
    sink: &mut W,
    line: &str,
) -> std::io::Result<bool> {
    match writeln!(sink, "{}", line) {
        Ok(()) => Ok(false),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(true),
        Err(err) => Err(err),
    }
}

fn flush_or_eof<W: Write>(sink: &mut W) -> std::io::Result<()> {
    match sink.flush() {
        Err(err) if err.kind() != std::io::ErrorKind::BrokenPipe => Err(err),
        _ => Ok(()),
    }
}

fn read_trimmed_line<R: BufRead>(
    reader: &mut R,
) -> std::io::Result<Option<String>> {
    let mut line = String::new();
    let nread = reader.read_line(&mut line)?;
    if nread == 0 {
        return Ok(None);
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(Some(line))
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn sorted_sam_stream_skips_header_and_sorts() {
        use super::sorted_alignments;
        use crate::format::AlignmentFormat;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("input.sam");
        std::fs::write(
            &path,
            "@HD\tVN:1.6\n\
             @SQ\tSN:chrA\tLN:1000\n\
             r2\t0\tchrA\t200\t60\t10M\t*\t0\t0\tACGTACGTAC\tIIIIIIIIII\n\
             r1\t0\tchrA\t100\t60\t10M\t*\t0\t0\tACGTACGTAC\tIIIIIIIIII\n",
        )
        .unwrap();

        let mut stream = sorted_alignments(&path, AlignmentFormat::Sam, &[]).unwrap();

        let mut got: Vec<String> = Vec::new();
        while let Some(line) = stream.next_line().unwrap() {
            got.push(line);
        }
        stream.finish().unwrap();

        assert_eq!(got.len(), 2);
        assert!(got[0].starts_with("r1\t"));
        assert!(got[1].starts_with("r2\t"));
    }

    #[test]
    fn sorted_fastq_stream_builds_synthetic_columns() {
        use super::sorted_sequences;
        use crate::format::SeqFormat;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("reads.fastq");
        std::fs::write(
            &path,
            "@r2 extra words\nACGT\n+\nIIII\n\
             @r1\nTTTT\n+\nJJJJ\n",
        )
        .unwrap();

        let mut stream = sorted_sequences(&path, SeqFormat::Fastq, &[]).unwrap();

        let mut got: Vec<String> = Vec::new();
        while let Some(line) = stream.next_line().unwrap() {
            got.push(line);
        }
        stream.finish().unwrap();

        assert_eq!(got[0], "r1\t\t\t\t\t\t\t\t\tTTTT\tJJJJ");
        assert_eq!(got[1], "r2\t\t\t\t\t\t\t\t\tACGT\tIIII");

        let fields: Vec<&str> = got[0].split('\t').collect();
        assert_eq!(fields.len(), 11);
        assert_eq!(fields[9], "TTTT");
        assert_eq!(fields[10], "JJJJ");
    }

    #[test]
    fn sorted_fastq_bz2_stream_decompresses_in_process() {
        use super::sorted_sequences;
        use crate::format::SeqFormat;
        use bzip2::Compression;
        use bzip2::write::BzEncoder;
        use std::io::Write;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("reads.fastq.bz2");
        let mut encoder = BzEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(b"@r1\nACGT\n+\nIIII\n").unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let mut stream = sorted_sequences(&path, SeqFormat::FastqBz2, &[]).unwrap();

        let got = stream.next_line().unwrap().unwrap();
        assert_eq!(got, "r1\t\t\t\t\t\t\t\t\tACGT\tIIII");
        assert!(stream.next_line().unwrap().is_none());
        stream.finish().unwrap();
    }

    #[test]
    fn sam_text_header_reads_leading_at_lines() {
        use super::sam_text_header;
        use crate::format::AlignmentFormat;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("input.sam");
        std::fs::write(
            &path,
            "@HD\tVN:1.6\n@SQ\tSN:chrA\tLN:1000\nr1\t0\tchrA\t100\t60\t10M\t*\t0\t0\tACGT\tIIII\n",
        )
        .unwrap();

        let got = sam_text_header(&path, AlignmentFormat::Sam).unwrap();

        assert_eq!(got, b"@HD\tVN:1.6\n@SQ\tSN:chrA\tLN:1000\n");
    }

    #[test]
    fn truncated_fastq_is_an_error() {
        use super::sorted_sequences;
        use crate::format::SeqFormat;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("reads.fastq");
        std::fs::write(&path, "@r1\nACGT\n").unwrap();

        let mut stream = sorted_sequences(&path, SeqFormat::Fastq, &[]).unwrap();
        while let Ok(Some(_)) = stream.next_line() {}

        let got = stream.finish();
        assert!(got.is_err());
    }
}
