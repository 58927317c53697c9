//! Background import jobs. Each job claims its run or analysis with a status
//! compare-and-set, does its work, and marks the row complete. A failed job
//! deletes the row it was importing so that a retry starts from scratch.

use anyhow::{Context, Error};
use fastq::Record;
use log::{error, info};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::cascade;
use crate::config::GenotypingSettings;
use crate::demux::{CancelToken, DemuxOutputs, Demultiplexer};
use crate::error::GenotypingError;
use crate::filenames::{FindFastqs, IlluminaRunDef};
use crate::match_builder::{self, MatchBuilder};
use crate::model::{
    AnalysisId, AnalysisSample, MatchId, NewRun, Run, RunId, SampleId, SequenceFile, Status,
};
use crate::sample_sheet::SampleSheet;
use crate::sequences::SequenceDictionary;
use crate::status::update_status;
use crate::store::{StatusEntity, Store, StoreError, Tables};
use crate::utils;

const READ_ROW_PROGRESS_INTERVAL: usize = 10_000;

#[derive(Clone, Debug, PartialEq)]
pub enum JobOutcome<T> {
    Complete(T),
    /// Another worker already claimed the row.
    AlreadyClaimed,
    Cancelled,
}

/// Insert a new run. A run number that was already imported is reported as
/// `RunAlreadyImported`.
pub fn create_run<S: Store>(store: &S, run: NewRun) -> Result<Run, Error> {
    let created_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let meta = run.meta_data_id;

    store.transaction(|t| match t.insert_run(run, created_at) {
        Ok(run) => Ok(run),
        Err(StoreError::UniqueViolation { .. }) => {
            Err(GenotypingError::RunAlreadyImported(meta.unwrap_or_default()).into())
        }
        Err(e) => Err(e.into()),
    })
}

/// Insert one read row per FASTQ record of `path`. Returns the number of rows.
fn record_reads(
    tables: &mut dyn Tables,
    run: RunId,
    sample: Option<SampleId>,
    path: &Path,
) -> Result<usize, Error> {
    let mut iter = fastq::Parser::new(utils::open_with_gz(path)?).ref_iter();
    let mut rows = 0;

    loop {
        iter.advance()
            .with_context(|| format!("error reading FASTQ record from {:?}", path))?;
        let rec = match iter.get() {
            Some(rec) => rec,
            None => break,
        };

        tables.insert_read(
            run,
            sample,
            &String::from_utf8_lossy(rec.head()),
            &String::from_utf8_lossy(rec.seq()),
            &String::from_utf8_lossy(rec.qual()),
        );
        rows += 1;
        if rows % READ_ROW_PROGRESS_INTERVAL == 0 {
            info!("{} reads imported", rows);
        }
    }

    Ok(rows)
}

/// Import the reads of an Illumina run: demultiplex the FASTQ files next to
/// the sample sheet and record the resulting per-sample files, and the reads
/// themselves when `store_reads` is set.
pub struct ImportReadsJob<'a, S: Store> {
    store: &'a S,
    settings: &'a GenotypingSettings,
    run: RunId,
    sample_sheet: PathBuf,
    known_samples: Option<HashSet<SampleId>>,
    cancel: CancelToken,
}

impl<'a, S: Store> ImportReadsJob<'a, S> {
    pub fn new(
        store: &'a S,
        settings: &'a GenotypingSettings,
        run: RunId,
        sample_sheet: impl AsRef<Path>,
    ) -> ImportReadsJob<'a, S> {
        ImportReadsJob {
            store,
            settings,
            run,
            sample_sheet: sample_sheet.as_ref().to_path_buf(),
            known_samples: None,
            cancel: CancelToken::new(),
        }
    }

    /// Restrict the sample sheet to these sample ids.
    pub fn known_samples(mut self, samples: HashSet<SampleId>) -> Self {
        self.known_samples = Some(samples);
        self
    }

    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn run(&self) -> Result<JobOutcome<DemuxOutputs>, Error> {
        match self.import() {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                if let Some(GenotypingError::Cancelled { .. }) = e.downcast_ref::<GenotypingError>() {
                    info!("Import of run {} was cancelled", self.run);
                    return Ok(JobOutcome::Cancelled);
                }

                error!("Processing Illumina reads failed: {:#}", e);
                info!("Deleting run {}", self.run);
                if let Err(del) = cascade::delete_run(self.store, self.run) {
                    error!("Unable to delete run {}: {:#}", self.run, del);
                }
                Err(e)
            }
        }
    }

    fn import(&self) -> Result<JobOutcome<DemuxOutputs>, Error> {
        let entity = StatusEntity::Run(self.run);
        if !update_status(self.store, entity, Status::Submitted, Status::Importing)? {
            info!("Run {} is already being imported", self.run);
            return Ok(JobOutcome::AlreadyClaimed);
        }

        let run = self
            .store
            .query(|t| t.run(self.run))?
            .ok_or(GenotypingError::NotFound {
                entity: "Run",
                id: self.run.0,
            })?;

        info!("Processing run from file: {:?}", self.sample_sheet);
        let sheet = SampleSheet::from_path(&self.sample_sheet, self.known_samples.as_ref())?;

        let dir = self
            .sample_sheet
            .parent()
            .unwrap_or_else(|| Path::new("."));
        let files = IlluminaRunDef::new(dir, self.settings.fastq_prefix.clone()).find_fastqs()?;
        info!("Found {} FASTQ files in {:?}", files.len(), dir);

        let prefix = self
            .settings
            .output_prefix
            .clone()
            .or_else(|| run.file_base_name());
        let parser = self.settings.header_parser();
        let outputs = Demultiplexer::new(&parser, &sheet.index_map)
            .prefix(prefix)
            .compress(self.settings.compress_outputs)
            .cancel_token(self.cancel.clone())
            .run(&files)?;

        self.store.transaction(|t| {
            for (key, path) in &outputs.outputs {
                if self.settings.store_reads {
                    let rows = record_reads(t, self.run, key.sample.sample_id(), path)?;
                    info!("Imported {} reads from {:?}", rows, path);
                }
                t.insert_sequence_file(SequenceFile {
                    run: self.run,
                    sample: key.sample.sample_id(),
                    pair: key.pair,
                    path: path.clone(),
                    read_count: outputs.read_counts.get(key).copied().unwrap_or(0),
                });
            }
            Ok(())
        })?;

        if !update_status(self.store, entity, Status::Importing, Status::Complete)? {
            return Err(
                GenotypingError::IllegalState("run status should be Importing".to_string()).into(),
            );
        }
        info!("Processing Illumina reads complete");
        Ok(JobOutcome::Complete(outputs))
    }
}

/// Import the match export of an external genotyping analysis.
pub struct ImportAnalysisJob<'a, S: Store> {
    store: &'a S,
    analysis: AnalysisId,
    export: PathBuf,
    /// Sample names selected for the analysis, with their sample ids.
    samples: BTreeMap<String, SampleId>,
    sequences: &'a SequenceDictionary,
}

impl<'a, S: Store> ImportAnalysisJob<'a, S> {
    pub fn new(
        store: &'a S,
        analysis: AnalysisId,
        export: impl AsRef<Path>,
        samples: BTreeMap<String, SampleId>,
        sequences: &'a SequenceDictionary,
    ) -> ImportAnalysisJob<'a, S> {
        ImportAnalysisJob {
            store,
            analysis,
            export: export.as_ref().to_path_buf(),
            samples,
            sequences,
        }
    }

    pub fn run(&self) -> Result<JobOutcome<Vec<MatchId>>, Error> {
        self.import().map_err(|e| {
            error!("Import of analysis {} failed: {:#}", self.analysis, e);
            info!("Deleting analysis {}", self.analysis);
            if let Err(del) = cascade::delete_analysis(self.store, self.analysis) {
                error!("Unable to delete analysis {}: {:#}", self.analysis, del);
            }
            e
        })
    }

    fn import(&self) -> Result<JobOutcome<Vec<MatchId>>, Error> {
        let entity = StatusEntity::Analysis(self.analysis);
        if !update_status(self.store, entity, Status::Submitted, Status::Importing)? {
            info!("Analysis {} is already being imported", self.analysis);
            return Ok(JobOutcome::AlreadyClaimed);
        }

        info!("Importing matches from {:?}", self.export);
        let rows = match_builder::read_export_file(&self.export)?;
        let builder = MatchBuilder::new(self.analysis, &self.samples, self.sequences);

        let ids = self.store.transaction(|t| {
            for &sample in self.samples.values() {
                t.insert_analysis_sample(AnalysisSample {
                    analysis: self.analysis,
                    sample,
                });
            }
            builder.insert_all(t, &rows)
        })?;

        if !update_status(self.store, entity, Status::Importing, Status::Complete)? {
            return Err(GenotypingError::IllegalState(
                "analysis status should be Importing".to_string(),
            )
            .into());
        }
        Ok(JobOutcome::Complete(ids))
    }
}
