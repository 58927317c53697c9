//! Persistence capabilities the genotyping services rely on. The storage
//! engine itself is external; `Tables` lists the typed row operations,
//! and `Store` adds transactions and the atomic status compare-and-set.
//! `MemoryStore` is an in-process implementation.

pub mod memory;

use anyhow::Error;
use serde::{Deserialize, Serialize};

use crate::model::{
    AlleleJunction, Analysis, AnalysisId, AnalysisSample, Match, MatchId, MatchParent, MatchStats,
    NewAnalysis, NewRun, ReadId, ReadJunction, ReadRow, Run, RunId, SampleId, SequenceFile,
};

pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Duplicate value {value} for unique column {table}.{column}")]
    UniqueViolation {
        table: &'static str,
        column: &'static str,
        value: String,
    },

    #[error("{table} row {id} not found")]
    MissingRow { table: &'static str, id: u32 },

    #[error("The store is unavailable: {0}")]
    Unavailable(String),
}

/// The row that owns a status column.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusEntity {
    Run(RunId),
    Analysis(AnalysisId),
}

/// One step of a cascading delete. Steps are executed in the order given,
/// children before parents.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum DeleteStep {
    AlleleJunctions(Vec<AnalysisId>),
    ReadJunctions(Vec<AnalysisId>),
    Matches(Vec<AnalysisId>),
    AnalysisSamples(Vec<AnalysisId>),
    Analyses(Vec<AnalysisId>),
    Reads(RunId),
    SequenceFiles(RunId),
    Run(RunId),
}

/// Typed row operations. Every mutation made through a `Tables` handle
/// obtained from `Store::transaction` is applied atomically with the rest of
/// the transaction, or not at all.
pub trait Tables {
    fn insert_run(&mut self, run: NewRun, created_at: u64) -> Result<Run, StoreError>;
    fn run(&self, id: RunId) -> Option<Run>;
    fn runs(&self, container: &str) -> Vec<Run>;

    fn insert_analysis(&mut self, analysis: NewAnalysis) -> Result<Analysis, StoreError>;
    fn analysis(&self, id: AnalysisId) -> Option<Analysis>;
    fn analyses_of_run(&self, run: RunId) -> Vec<Analysis>;

    fn insert_match(&mut self, analysis: AnalysisId, sample: SampleId, stats: MatchStats)
        -> MatchId;
    /// Every match of the analysis, including superseded ones.
    fn matches(&self, analysis: AnalysisId) -> Vec<Match>;
    /// The live matches of `analysis` among `ids`.
    fn live_matches(&self, analysis: AnalysisId, ids: &[MatchId]) -> Vec<Match>;
    /// Set the parent of each listed match that is still live. Returns the
    /// number of rows updated.
    fn set_parent(&mut self, ids: &[MatchId], parent: MatchParent) -> usize;

    fn insert_allele_junction(&mut self, junction: AlleleJunction);
    fn allele_junctions(&self, matches: &[MatchId]) -> Vec<AlleleJunction>;
    fn insert_read_junction(&mut self, junction: ReadJunction);
    fn read_junctions(&self, matches: &[MatchId]) -> Vec<ReadJunction>;

    /// Insert one sequenced read. Read ids are what analysis exports list in
    /// their read junctions.
    fn insert_read(
        &mut self,
        run: RunId,
        sample: Option<SampleId>,
        name: &str,
        sequence: &str,
        quality: &str,
    ) -> ReadId;
    fn reads(&self, run: RunId) -> Vec<ReadRow>;

    fn insert_sequence_file(&mut self, file: SequenceFile);
    fn sequence_files(&self, run: RunId) -> Vec<SequenceFile>;

    fn insert_analysis_sample(&mut self, sample: AnalysisSample);
    fn analysis_samples(&self, analysis: AnalysisId) -> Vec<AnalysisSample>;

    /// Delete the rows selected by `step`, returning how many were removed.
    fn delete(&mut self, step: &DeleteStep) -> usize;

    fn run_count(&self, container: &str) -> usize {
        self.runs(container).len()
    }

    fn read_count(&self, run: RunId) -> usize {
        self.reads(run).len()
    }

    fn analysis_count(&self, run: RunId) -> usize {
        self.analyses_of_run(run).len()
    }

    /// Number of live matches, the count shown in the normal result view.
    fn match_count(&self, analysis: AnalysisId) -> usize {
        self.matches(analysis).iter().filter(|m| m.is_live()).count()
    }
}

pub trait Store: Send + Sync {
    /// Run `f` inside one transaction. If `f` returns an error nothing it
    /// wrote is visible to anyone; otherwise all of it is committed at once.
    fn transaction<T, F>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut dyn Tables) -> Result<T, Error>;

    /// Read-only access to the committed state.
    fn query<T, F>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&dyn Tables) -> T;

    /// Atomically set the status column of `entity` to `update` if it
    /// currently holds `expected`. Returns whether the write happened.
    fn compare_and_set_status(
        &self,
        entity: StatusEntity,
        expected: i32,
        update: i32,
    ) -> Result<bool, StoreError>;
}
