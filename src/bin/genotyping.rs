//! Command-line driver for the reads and analysis imports. Each invocation
//! runs against a fresh in-memory store and prints what was recorded as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use genotyping::jobs::{create_run, ImportAnalysisJob, ImportReadsJob, JobOutcome};
use genotyping::model::{Match, NewAnalysis, NewRun, Platform, RunId, SequenceFile, Status};
use genotyping::sample_sheet::SampleSheet;
use genotyping::sequences::SequenceDictionary;
use genotyping::store::{MemoryStore, StatusEntity, Store};
use genotyping::{update_status, GenotypingSettings};

#[derive(Debug, Parser)]
#[clap(name = "genotyping", about = "Genotyping read and match imports")]
enum Args {
    /// Demultiplex the FASTQ files next to a sample sheet into per-sample files.
    Demux {
        /// Illumina sample sheet; FASTQ files are read from its directory.
        #[clap(long)]
        sample_sheet: PathBuf,
        /// JSON settings file.
        #[clap(long)]
        settings: Option<PathBuf>,
        /// Run number from the run metadata list.
        #[clap(long)]
        run_number: Option<u32>,
        #[clap(long)]
        platform: Option<String>,
    },
    /// Load the match export of a genotyping analysis.
    ImportAnalysis {
        /// Tab-delimited match export.
        #[clap(long)]
        export: PathBuf,
        /// Sample sheet naming the samples of the analysis.
        #[clap(long)]
        sample_sheet: PathBuf,
        /// Reference FASTA whose record names are the allele names.
        #[clap(long)]
        reference: PathBuf,
        #[clap(long)]
        settings: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct DemuxReport {
    status: String,
    files: Vec<SequenceFile>,
}

#[derive(Serialize)]
struct AnalysisReport {
    status: String,
    matches: Vec<Match>,
}

fn load_settings(path: &Option<PathBuf>) -> Result<GenotypingSettings> {
    match path {
        Some(p) => GenotypingSettings::load(p),
        None => Ok(GenotypingSettings::default()),
    }
}

fn submitted_run(
    store: &MemoryStore,
    path: PathBuf,
    run_number: Option<u32>,
    platform: Option<&str>,
) -> Result<RunId> {
    let run = create_run(
        store,
        NewRun {
            container: "default".to_string(),
            created_by: std::env::var("USER").unwrap_or_default(),
            meta_data_id: run_number,
            path,
            platform: Platform::from_tag(platform),
        },
    )?;
    update_status(
        store,
        StatusEntity::Run(run.id),
        Status::NotSubmitted,
        Status::Submitted,
    )?;
    Ok(run.id)
}

fn outcome_name<T>(outcome: &JobOutcome<T>) -> String {
    match outcome {
        JobOutcome::Complete(_) => "complete",
        JobOutcome::AlreadyClaimed => "already claimed",
        JobOutcome::Cancelled => "cancelled",
    }
    .to_string()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let store = MemoryStore::new();

    match args {
        Args::Demux {
            sample_sheet,
            settings,
            run_number,
            platform,
        } => {
            let settings = load_settings(&settings)?;
            let run =
                submitted_run(&store, sample_sheet.clone(), run_number, platform.as_deref())?;

            let outcome = ImportReadsJob::new(&store, &settings, run, &sample_sheet).run()?;
            let report = DemuxReport {
                status: outcome_name(&outcome),
                files: store.query(|t| t.sequence_files(run))?,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Args::ImportAnalysis {
            export,
            sample_sheet,
            reference,
            settings,
        } => {
            let settings = load_settings(&settings)?;
            let sheet = SampleSheet::from_path(&sample_sheet, None)?;
            let dictionary = SequenceDictionary::from_fasta(
                settings.sequence_dictionary,
                &settings.sequences_view,
                &reference,
            )?;
            info!(
                "Loaded {} reference sequences from {:?}",
                dictionary.len(),
                reference
            );

            let run = submitted_run(&store, sample_sheet.clone(), None, None)?;
            let analysis = store.transaction(|t| {
                Ok(t.insert_analysis(NewAnalysis {
                    run,
                    description: None,
                    sequences_view: Some(settings.sequences_view.clone()),
                    sequence_dictionary: settings.sequence_dictionary,
                })?)
            })?;
            update_status(
                &store,
                StatusEntity::Analysis(analysis.id),
                Status::NotSubmitted,
                Status::Submitted,
            )?;

            let outcome =
                ImportAnalysisJob::new(&store, analysis.id, &export, sheet.names, &dictionary)
                    .run()
                    .with_context(|| format!("error importing analysis from {:?}", export))?;
            let report = AnalysisReport {
                status: outcome_name(&outcome),
                matches: store.query(|t| t.matches(analysis.id))?,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
