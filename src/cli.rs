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
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    // Create a .dam archive from an alignment file
    Dessicate {
        #[arg(help = "Input alignment file (.bam, .sam, or .tam)")]
        input_file: PathBuf,

        #[arg(help = "Output archive")]
        output_file: PathBuf,

        // Passed through to the external sort
        #[arg(long = "tmpdir", help = "Temporary directory hint(s) for sorting")]
        tmpdirs: Vec<PathBuf>,

        // Verbosity
        #[arg(long = "verbose", default_value_t = false)]
        verbose: bool,
    },

    // Rebuild a BAM file from an archive and a sequence source
    Hydrate {
        #[arg(help = "Input archive")]
        input_file: PathBuf,

        #[arg(help = "Sequence source (.bam, .sam, .tam, .fastq, .fastq.gz, or .fastq.bz2)")]
        reads_file: PathBuf,

        #[arg(help = "Output BAM file")]
        output_file: PathBuf,

        // Verbosity
        #[arg(long = "verbose", default_value_t = false)]
        verbose: bool,
    },

    // Print the SAM header and records in a read id range
    View {
        #[arg(help = "Input archive")]
        input_file: PathBuf,

        #[arg(help = "First read id to print")]
        start_id: Option<String>,

        #[arg(help = "Last read id to print")]
        end_id: Option<String>,
    },
}
