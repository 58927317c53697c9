// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Rows stored for genotyping runs, analyses, matches and their
//! allele / read junctions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

macro_rules! row_id {
    ($name:ident) => {
        #[derive(
            Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash,
        )]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

row_id!(RunId);
row_id!(AnalysisId);
row_id!(MatchId);
row_id!(ReadId);
row_id!(SampleId);
row_id!(SequenceId);

/// Lifecycle of a run or an analysis. Statuses only ever advance one step at
/// a time, and only through `status::update_status`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    NotSubmitted = 0,
    Submitted = 1,
    Importing = 2,
    Complete = 3,
}

impl Status {
    pub fn id(self) -> i32 {
        self as i32
    }

    pub fn from_id(id: i32) -> Option<Status> {
        match id {
            0 => Some(Status::NotSubmitted),
            1 => Some(Status::Submitted),
            2 => Some(Status::Importing),
            3 => Some(Status::Complete),
            _ => None,
        }
    }

    /// The status that follows this one, `None` for `Complete`.
    pub fn successor(self) -> Option<Status> {
        Status::from_id(self.id() + 1)
    }
}

/// Sequencing platform of a run. Missing or unrecognized tags are Illumina.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Platform {
    Ls454,
    Illumina,
    PacBio,
}

impl Platform {
    pub fn from_tag(tag: Option<&str>) -> Platform {
        match tag {
            Some("LS454") => Platform::Ls454,
            Some("PACBIO") => Platform::PacBio,
            _ => Platform::Illumina,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Platform::Ls454 => "LS454",
            Platform::Illumina => "ILLUMINA",
            Platform::PacBio => "PACBIO",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewRun {
    pub container: String,
    pub created_by: String,
    /// Run number from the run metadata list. Unique across runs.
    pub meta_data_id: Option<u32>,
    pub path: PathBuf,
    pub platform: Platform,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Run {
    pub id: RunId,
    pub container: String,
    pub created_by: String,
    pub created_at: u64,
    pub meta_data_id: Option<u32>,
    pub path: PathBuf,
    pub platform: Platform,
    pub status: Status,
}

impl Run {
    /// Base name of the reads file, used as the default demultiplexing output prefix.
    pub fn file_base_name(&self) -> Option<String> {
        let name = self.path.file_name()?.to_str()?;
        Some(name.split('.').next().unwrap_or(name).to_string())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewAnalysis {
    pub run: RunId,
    pub description: Option<String>,
    pub sequences_view: Option<String>,
    pub sequence_dictionary: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Analysis {
    pub id: AnalysisId,
    pub run: RunId,
    pub description: Option<String>,
    pub sequences_view: Option<String>,
    pub sequence_dictionary: u32,
    pub status: Status,
}

/// Aggregate read statistics for one sample within one analysis.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct MatchStats {
    pub reads: i64,
    pub percent: f64,
    pub average_length: f64,
    pub pos_reads: i64,
    pub neg_reads: i64,
    pub pos_ext_reads: i64,
    pub neg_ext_reads: i64,
}

/// Why a match is no longer live.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MatchParent {
    /// Superseded by the combined match with this id.
    Combined(MatchId),
    /// Removed from the analysis by an analyst.
    Removed,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Match {
    pub id: MatchId,
    pub analysis: AnalysisId,
    pub sample: SampleId,
    pub stats: MatchStats,
    pub parent: Option<MatchParent>,
}

impl Match {
    pub fn is_live(&self) -> bool {
        self.parent.is_none()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AlleleJunction {
    pub analysis: AnalysisId,
    pub match_id: MatchId,
    pub sequence: SequenceId,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReadJunction {
    pub match_id: MatchId,
    pub read: ReadId,
}

/// One stored sequencing read.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ReadRow {
    pub id: ReadId,
    pub run: RunId,
    pub sample: Option<SampleId>,
    pub name: String,
    pub sequence: String,
    pub quality: String,
}

/// One demultiplexed FASTQ file recorded against a run. `sample` is `None`
/// for the control / unassigned reads.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SequenceFile {
    pub run: RunId,
    pub sample: Option<SampleId>,
    pub pair: u8,
    pub path: PathBuf,
    pub read_count: u64,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AnalysisSample {
    pub analysis: AnalysisId,
    pub sample: SampleId,
}
