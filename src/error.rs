// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Errors raised while demultiplexing reads and while building or
//! consolidating genotyping matches. Every variant names the offending
//! sample index, file, match or allele so the message alone is enough to
//! diagnose the problem.

use itertools::Itertools;
use std::path::PathBuf;

use crate::model::{AnalysisId, MatchId, SampleId, SequenceId};
use crate::read_header::SampleTag;

#[derive(Debug, thiserror::Error)]
pub enum GenotypingError {
    #[error("Improperly formatted read header '{header}': {reason}")]
    HeaderFormat { header: String, reason: String },

    #[error(
        "Sample {sample} in {file:?} has no entry in the sample index map. Known indices: {known}"
    )]
    UnresolvedSample {
        sample: SampleTag,
        file: PathBuf,
        known: String,
    },

    #[error(
        "Only one sample and pair number is allowed per FASTQ file, but {file:?} contains reads for \
         sample {first_sample} pair {first_pair} and sample {sample} pair {pair}"
    )]
    HeterogeneousFile {
        file: PathBuf,
        first_sample: SampleTag,
        first_pair: u8,
        sample: SampleTag,
        pair: u8,
    },

    #[error(
        "Forward and reverse reads disagree: {left:?} has {left_reads} reads but {right:?} has {right_reads} reads"
    )]
    PairingMismatch {
        left: PathBuf,
        left_reads: u64,
        right: PathBuf,
        right_reads: u64,
    },

    #[error("Multiple FASTQ files would be renamed to {target:?}: {}", format_paths(.sources))]
    DuplicateTarget {
        target: PathBuf,
        sources: Vec<PathBuf>,
    },

    #[error("Output files already exist: {}", format_paths(.paths))]
    TargetExists { paths: Vec<PathBuf> },

    #[error("Error in sample sheet {path:?}: {msg}")]
    SampleSheet { path: PathBuf, msg: String },

    #[error("No FASTQ files{} were found in {dir:?}", prefix_clause(.prefix))]
    NoFastqFiles { dir: PathBuf, prefix: Option<String> },

    #[error("Demultiplexing was cancelled before processing {file:?}")]
    Cancelled { file: PathBuf },

    #[error("No {what} were selected")]
    EmptySelection { what: &'static str },

    #[error(
        "Selected match{} been modified: found {found} of {requested} live matches in analysis {analysis}",
        if_plural(.requested, " has", "es have")
    )]
    StaleSelection {
        analysis: AnalysisId,
        requested: usize,
        found: usize,
    },

    #[error("Selected matches belong to more than one sample: {}", .samples.iter().join(", "))]
    CrossSample { samples: Vec<SampleId> },

    #[error("Allele {allele} is not associated with any of the selected matches")]
    UnownedAllele { allele: SequenceId },

    #[error(
        "Matches were modified concurrently: expected to update {expected} matches but updated {updated}"
    )]
    ConcurrentModification { expected: usize, updated: usize },

    #[error(
        "Allele name \"{allele}\" not found in reference sequences dictionary {dictionary}, view \"{view}\""
    )]
    UnknownAllele {
        allele: String,
        dictionary: u32,
        view: String,
    },

    #[error("Sample \"{sample}\" in the match export is not one of the samples in this analysis")]
    UnknownSampleKey { sample: String },

    #[error("Match {0} does not exist")]
    MissingMatch(MatchId),

    #[error("Run {0} has already been imported")]
    RunAlreadyImported(u32),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u32 },

    #[error("Illegal state: {0}")]
    IllegalState(String),
}

fn prefix_clause(prefix: &Option<String>) -> String {
    match prefix {
        Some(p) => format!(" matching the prefix '{}'", p),
        None => String::new(),
    }
}

fn if_plural(n: &usize, one: &'static str, many: &'static str) -> &'static str {
    if *n == 1 {
        one
    } else {
        many
    }
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths.iter().map(|p| format!("{:?}", p)).join(", ")
}
