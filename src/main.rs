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
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::process::Stdio;

use clap::Parser;

use dam::DamError;

mod cli;

/// Initializes the logger with verbosity given in `log_max_level`.
fn init_log(log_max_level: usize) {
    stderrlog::new()
    .module(module_path!())
    .module("dam")
    .quiet(false)
    .verbosity(log_max_level)
    .timestamp(stderrlog::Timestamp::Off)
    .init()
    .unwrap();
}

fn main() {
    let cli = cli::Cli::parse();

    // Subcommands:
    let result = match &cli.command {
        // Dessicate
        Some(cli::Commands::Dessicate {
            input_file,
            output_file,
            tmpdirs,
            verbose,
        }) => {
            init_log(if *verbose { 3 } else { 2 });
            dam::dessicate(input_file, output_file, tmpdirs)
        },

        // Hydrate
        Some(cli::Commands::Hydrate {
            input_file,
            reads_file,
            output_file,
            verbose,
        }) => {
            init_log(if *verbose { 3 } else { 2 });
            hydrate_to_bam(input_file, reads_file, output_file)
        },

        // View
        Some(cli::Commands::View {
            input_file,
            start_id,
            end_id,
        }) => {
            init_log(2);
            view_to_stdout(input_file, start_id.as_deref(), end_id.as_deref())
        },

        None => {
            let _ = <cli::Cli as clap::CommandFactory>::command().print_help();
            std::process::exit(2);
        },
    };

    if let Err(err) = result {
        log::error!("{}", err);
        std::process::exit(1);
    }
}

/// Hydrates to SAM text piped through `samtools view -bS` to write BAM.
fn hydrate_to_bam(
    archive: &Path,
    reads: &Path,
    output: &Path,
) -> dam::Result<()> {
    let mut reader = dam::Reader::new(archive);

    let mut samtools = Command::new("samtools")
        .arg("view")
        .arg("-bS")
        .arg("-o")
        .arg(output)
        .arg("-")
        .stdin(Stdio::piped())
        .spawn()
        .map_err(|err| DamError::ExternalTool(format!("failed to spawn samtools view -bS: {}", err)))?;
    let stdin = samtools
        .stdin
        .take()
        .ok_or_else(|| DamError::ExternalTool("samtools view -bS has no stdin".to_string()))?;

    let mut conn = BufWriter::new(stdin);
    dam::hydrate(&mut reader, reads, &mut conn)?;
    conn.flush()?;
    drop(conn);

    let status = samtools.wait()?;
    if !status.success() {
        return Err(DamError::ExternalTool(format!(
            "samtools view -bS exited with {}",
            status
        )));
    }
    Ok(())
}

fn view_to_stdout(
    archive: &Path,
    start_id: Option<&str>,
    end_id: Option<&str>,
) -> dam::Result<()> {
    let stdout = std::io::stdout();
    let mut conn = BufWriter::new(stdout.lock());
    dam::view(archive, start_id, end_id, &mut conn)?;
    conn.flush()?;
    Ok(())
}
