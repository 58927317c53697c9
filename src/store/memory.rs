//! In-process `Store`. Each transaction works on a private copy of the
//! tables and swaps it in on success, so a failed transaction leaves no
//! trace and concurrent transactions are serialized by the lock.

use anyhow::Error;
use log::debug;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::{DeleteStep, StatusEntity, Store, StoreError, Tables};
use crate::model::{
    AlleleJunction, Analysis, AnalysisId, AnalysisSample, Match, MatchId, MatchParent, MatchStats,
    NewAnalysis, NewRun, ReadId, ReadJunction, ReadRow, Run, RunId, SampleId, SequenceFile, Status,
};

#[derive(Clone, Debug, Default)]
pub struct MemoryTables {
    next_id: u32,
    runs: BTreeMap<RunId, Run>,
    analyses: BTreeMap<AnalysisId, Analysis>,
    matches: BTreeMap<MatchId, Match>,
    allele_junctions: Vec<AlleleJunction>,
    read_junctions: Vec<ReadJunction>,
    reads: BTreeMap<ReadId, ReadRow>,
    sequence_files: Vec<SequenceFile>,
    analysis_samples: Vec<AnalysisSample>,
}

impl MemoryTables {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn match_ids_of(&self, analyses: &[AnalysisId]) -> HashSet<MatchId> {
        self.matches
            .values()
            .filter(|m| analyses.contains(&m.analysis))
            .map(|m| m.id)
            .collect()
    }
}

fn retain_counting<T>(rows: &mut Vec<T>, keep: impl Fn(&T) -> bool) -> usize {
    let before = rows.len();
    rows.retain(keep);
    before - rows.len()
}

fn retain_map_counting<K: Ord, V>(
    rows: &mut BTreeMap<K, V>,
    keep: impl Fn(&V) -> bool,
) -> usize {
    let before = rows.len();
    rows.retain(|_, v| keep(v));
    before - rows.len()
}

impl Tables for MemoryTables {
    fn insert_run(&mut self, run: NewRun, created_at: u64) -> Result<Run, StoreError> {
        if let Some(meta) = run.meta_data_id {
            if self.runs.values().any(|r| r.meta_data_id == Some(meta)) {
                return Err(StoreError::UniqueViolation {
                    table: "runs",
                    column: "meta_data_id",
                    value: meta.to_string(),
                });
            }
        }

        let row = Run {
            id: RunId(self.next_id()),
            container: run.container,
            created_by: run.created_by,
            created_at,
            meta_data_id: run.meta_data_id,
            path: run.path,
            platform: run.platform,
            status: Status::NotSubmitted,
        };
        self.runs.insert(row.id, row.clone());
        Ok(row)
    }

    fn run(&self, id: RunId) -> Option<Run> {
        self.runs.get(&id).cloned()
    }

    fn runs(&self, container: &str) -> Vec<Run> {
        self.runs
            .values()
            .filter(|r| r.container == container)
            .cloned()
            .collect()
    }

    fn insert_analysis(&mut self, analysis: NewAnalysis) -> Result<Analysis, StoreError> {
        if !self.runs.contains_key(&analysis.run) {
            return Err(StoreError::MissingRow {
                table: "runs",
                id: analysis.run.0,
            });
        }

        let row = Analysis {
            id: AnalysisId(self.next_id()),
            run: analysis.run,
            description: analysis.description,
            sequences_view: analysis.sequences_view,
            sequence_dictionary: analysis.sequence_dictionary,
            status: Status::NotSubmitted,
        };
        self.analyses.insert(row.id, row.clone());
        Ok(row)
    }

    fn analysis(&self, id: AnalysisId) -> Option<Analysis> {
        self.analyses.get(&id).cloned()
    }

    fn analyses_of_run(&self, run: RunId) -> Vec<Analysis> {
        self.analyses
            .values()
            .filter(|a| a.run == run)
            .cloned()
            .collect()
    }

    fn insert_match(
        &mut self,
        analysis: AnalysisId,
        sample: SampleId,
        stats: MatchStats,
    ) -> MatchId {
        let id = MatchId(self.next_id());
        self.matches.insert(
            id,
            Match {
                id,
                analysis,
                sample,
                stats,
                parent: None,
            },
        );
        id
    }

    fn matches(&self, analysis: AnalysisId) -> Vec<Match> {
        self.matches
            .values()
            .filter(|m| m.analysis == analysis)
            .cloned()
            .collect()
    }

    fn live_matches(&self, analysis: AnalysisId, ids: &[MatchId]) -> Vec<Match> {
        let wanted: HashSet<&MatchId> = ids.iter().collect();
        self.matches
            .values()
            .filter(|m| m.analysis == analysis && m.is_live() && wanted.contains(&m.id))
            .cloned()
            .collect()
    }

    fn set_parent(&mut self, ids: &[MatchId], parent: MatchParent) -> usize {
        let mut updated = 0;
        for id in ids {
            if let Some(m) = self.matches.get_mut(id) {
                if m.is_live() {
                    m.parent = Some(parent);
                    updated += 1;
                }
            }
        }
        updated
    }

    fn insert_allele_junction(&mut self, junction: AlleleJunction) {
        self.allele_junctions.push(junction);
    }

    fn allele_junctions(&self, matches: &[MatchId]) -> Vec<AlleleJunction> {
        self.allele_junctions
            .iter()
            .filter(|j| matches.contains(&j.match_id))
            .copied()
            .collect()
    }

    fn insert_read_junction(&mut self, junction: ReadJunction) {
        self.read_junctions.push(junction);
    }

    fn read_junctions(&self, matches: &[MatchId]) -> Vec<ReadJunction> {
        self.read_junctions
            .iter()
            .filter(|j| matches.contains(&j.match_id))
            .copied()
            .collect()
    }

    fn insert_read(
        &mut self,
        run: RunId,
        sample: Option<SampleId>,
        name: &str,
        sequence: &str,
        quality: &str,
    ) -> ReadId {
        let id = ReadId(self.next_id());
        self.reads.insert(
            id,
            ReadRow {
                id,
                run,
                sample,
                name: name.to_string(),
                sequence: sequence.to_string(),
                quality: quality.to_string(),
            },
        );
        id
    }

    fn reads(&self, run: RunId) -> Vec<ReadRow> {
        self.reads
            .values()
            .filter(|r| r.run == run)
            .cloned()
            .collect()
    }

    fn insert_sequence_file(&mut self, file: SequenceFile) {
        self.sequence_files.push(file);
    }

    fn sequence_files(&self, run: RunId) -> Vec<SequenceFile> {
        self.sequence_files
            .iter()
            .filter(|f| f.run == run)
            .cloned()
            .collect()
    }

    fn insert_analysis_sample(&mut self, sample: AnalysisSample) {
        self.analysis_samples.push(sample);
    }

    fn analysis_samples(&self, analysis: AnalysisId) -> Vec<AnalysisSample> {
        self.analysis_samples
            .iter()
            .filter(|s| s.analysis == analysis)
            .copied()
            .collect()
    }

    fn delete(&mut self, step: &DeleteStep) -> usize {
        let removed = match step {
            DeleteStep::AlleleJunctions(analyses) => {
                retain_counting(&mut self.allele_junctions, |j| {
                    !analyses.contains(&j.analysis)
                })
            }
            DeleteStep::ReadJunctions(analyses) => {
                let ids = self.match_ids_of(analyses);
                retain_counting(&mut self.read_junctions, |j| !ids.contains(&j.match_id))
            }
            DeleteStep::Matches(analyses) => {
                retain_map_counting(&mut self.matches, |m| !analyses.contains(&m.analysis))
            }
            DeleteStep::AnalysisSamples(analyses) => {
                retain_counting(&mut self.analysis_samples, |s| {
                    !analyses.contains(&s.analysis)
                })
            }
            DeleteStep::Analyses(analyses) => {
                retain_map_counting(&mut self.analyses, |a| !analyses.contains(&a.id))
            }
            DeleteStep::Reads(run) => retain_map_counting(&mut self.reads, |r| r.run != *run),
            DeleteStep::SequenceFiles(run) => {
                retain_counting(&mut self.sequence_files, |f| f.run != *run)
            }
            DeleteStep::Run(run) => retain_map_counting(&mut self.runs, |r| r.id != *run),
        };
        debug!("{:?} removed {} rows", step, removed);
        removed
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<MemoryTables>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryTables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("table lock poisoned".to_string()))
    }
}

impl Store for MemoryStore {
    fn transaction<T, F>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut dyn Tables) -> Result<T, Error>,
    {
        let mut guard = self.lock()?;
        let mut working = guard.clone();
        let value = f(&mut working)?;
        *guard = working;
        Ok(value)
    }

    fn query<T, F>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&dyn Tables) -> T,
    {
        let guard = self.lock()?;
        Ok(f(&*guard))
    }

    fn compare_and_set_status(
        &self,
        entity: StatusEntity,
        expected: i32,
        update: i32,
    ) -> Result<bool, StoreError> {
        let update = Status::from_id(update)
            .ok_or_else(|| StoreError::Unavailable(format!("invalid status id {}", update)))?;
        let mut tables = self.lock()?;

        let current = match entity {
            StatusEntity::Run(id) => tables.runs.get_mut(&id).map(|r| &mut r.status),
            StatusEntity::Analysis(id) => tables.analyses.get_mut(&id).map(|a| &mut a.status),
        };

        match current {
            Some(status) if status.id() == expected => {
                *status = update;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => {
                let (table, id) = match entity {
                    StatusEntity::Run(id) => ("runs", id.0),
                    StatusEntity::Analysis(id) => ("analyses", id.0),
                };
                Err(StoreError::MissingRow { table, id })
            }
        }
    }
}
