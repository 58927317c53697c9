//! Cascading deletes for runs and analyses, expressed as an explicit
//! ordered plan of child-first delete steps executed in one transaction.

use anyhow::Error;
use log::info;

use crate::error::GenotypingError;
use crate::model::{AnalysisId, RunId};
use crate::store::{DeleteStep, Store, Tables};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeletionPlan {
    pub steps: Vec<DeleteStep>,
}

impl DeletionPlan {
    fn analysis_steps(analyses: &[AnalysisId]) -> Vec<DeleteStep> {
        vec![
            DeleteStep::AlleleJunctions(analyses.to_vec()),
            DeleteStep::ReadJunctions(analyses.to_vec()),
            DeleteStep::Matches(analyses.to_vec()),
            DeleteStep::AnalysisSamples(analyses.to_vec()),
            DeleteStep::Analyses(analyses.to_vec()),
        ]
    }

    pub fn for_analyses(analyses: &[AnalysisId]) -> DeletionPlan {
        DeletionPlan {
            steps: DeletionPlan::analysis_steps(analyses),
        }
    }

    /// Everything owned by `run`: its analyses and their rows, then its
    /// reads, sequence files and finally the run itself.
    pub fn for_run(run: RunId, analyses: &[AnalysisId]) -> DeletionPlan {
        let mut steps = DeletionPlan::analysis_steps(analyses);
        steps.push(DeleteStep::Reads(run));
        steps.push(DeleteStep::SequenceFiles(run));
        steps.push(DeleteStep::Run(run));
        DeletionPlan { steps }
    }

    /// Execute every step in order, returning the total number of rows deleted.
    pub fn execute(&self, tables: &mut dyn Tables) -> usize {
        self.steps.iter().map(|step| tables.delete(step)).sum()
    }
}

pub fn delete_run<S: Store>(store: &S, run: RunId) -> Result<usize, Error> {
    let removed = store.transaction(|t| {
        if t.run(run).is_none() {
            return Err(GenotypingError::NotFound {
                entity: "Run",
                id: run.0,
            }
            .into());
        }
        let analyses: Vec<AnalysisId> = t.analyses_of_run(run).iter().map(|a| a.id).collect();
        Ok(DeletionPlan::for_run(run, &analyses).execute(t))
    })?;
    info!("Deleted run {} ({} rows)", run, removed);
    Ok(removed)
}

pub fn delete_analysis<S: Store>(store: &S, analysis: AnalysisId) -> Result<usize, Error> {
    let removed = store.transaction(|t| {
        if t.analysis(analysis).is_none() {
            return Err(GenotypingError::NotFound {
                entity: "Analysis",
                id: analysis.0,
            }
            .into());
        }
        Ok(DeletionPlan::for_analyses(&[analysis]).execute(t))
    })?;
    info!("Deleted analysis {} ({} rows)", analysis, removed);
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AlleleJunction, AnalysisSample, MatchStats, NewAnalysis, NewRun, Platform, ReadJunction,
        SampleId, SequenceFile, SequenceId,
    };
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn populate(t: &mut dyn Tables, meta: u32) -> Result<(RunId, AnalysisId), Error> {
        let run = t.insert_run(
            NewRun {
                container: "lab".to_string(),
                created_by: "tech".to_string(),
                meta_data_id: Some(meta),
                path: PathBuf::from("/runs/run1"),
                platform: Platform::Illumina,
            },
            0,
        )?;
        let read = t.insert_read(run.id, Some(SampleId(7)), "r1", "ACGT", "IIII");
        t.insert_sequence_file(SequenceFile {
            run: run.id,
            sample: Some(SampleId(7)),
            pair: 1,
            path: PathBuf::from("/runs/run1/Reads-R1-7.fastq.gz"),
            read_count: 1,
        });

        let analysis = t.insert_analysis(NewAnalysis {
            run: run.id,
            description: None,
            sequences_view: None,
            sequence_dictionary: 1,
        })?;
        t.insert_analysis_sample(AnalysisSample {
            analysis: analysis.id,
            sample: SampleId(7),
        });
        let m = t.insert_match(analysis.id, SampleId(7), MatchStats::default());
        t.insert_allele_junction(AlleleJunction {
            analysis: analysis.id,
            match_id: m,
            sequence: SequenceId(1),
        });
        t.insert_read_junction(ReadJunction { match_id: m, read });
        Ok((run.id, analysis.id))
    }

    #[test]
    fn test_plan_order() {
        let plan = DeletionPlan::for_run(RunId(1), &[AnalysisId(2)]);
        let names: Vec<String> = plan
            .steps
            .iter()
            .map(|s| format!("{:?}", s).split('(').next().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "AlleleJunctions",
                "ReadJunctions",
                "Matches",
                "AnalysisSamples",
                "Analyses",
                "Reads",
                "SequenceFiles",
                "Run"
            ]
        );
    }

    #[test]
    fn test_delete_run_leaves_other_runs() -> Result<(), Error> {
        let store = MemoryStore::new();
        let (run, _) = store.transaction(|t| populate(t, 1))?;
        let (other, other_analysis) = store.transaction(|t| populate(t, 2))?;

        // run, read, sequence file, analysis, analysis sample, match, two junctions
        assert_eq!(delete_run(&store, run)?, 8);

        store.query(|t| {
            assert!(t.run(run).is_none());
            assert_eq!(t.read_count(run), 0);
            assert!(t.sequence_files(run).is_empty());
            assert_eq!(t.read_count(other), 1);
            assert_eq!(t.match_count(other_analysis), 1);
            assert_eq!(t.run_count("lab"), 1);
        })?;

        assert!(delete_run(&store, run).is_err());
        Ok(())
    }

    #[test]
    fn test_delete_analysis_keeps_run() -> Result<(), Error> {
        let store = MemoryStore::new();
        let (run, analysis) = store.transaction(|t| populate(t, 1))?;

        assert_eq!(delete_analysis(&store, analysis)?, 5);
        store.query(|t| {
            assert!(t.analysis(analysis).is_none());
            assert_eq!(t.analysis_count(run), 0);
            assert_eq!(t.read_count(run), 1);
            assert!(t.analysis_samples(analysis).is_empty());
        })?;
        Ok(())
    }
}
