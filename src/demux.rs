// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Split the FASTQ files of one Illumina run into one file per
//! (sample, read pair). The instrument already writes one physical file per
//! sample index and pair, so demultiplexing streams every file once to
//! classify and count its reads, then renames it to the canonical output name.
//! Nothing on disk changes until the whole plan has been validated.

use anyhow::{Context, Error};
use fastq::Record;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::GenotypingError;
use crate::filenames;
use crate::read_header::{HeaderParser, SampleTag};
use crate::sample_index::{SampleIndexMap, SampleKey};
use crate::utils;
use crate::validate;

const PROGRESS_INTERVAL: u64 = 25_000;

/// The output file a read is written to.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DemuxOutputKey {
    pub sample: SampleKey,
    pub pair: u8,
}

/// What streaming one input file found.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FileSummary {
    pub path: PathBuf,
    pub reads: u64,
    /// `None` for files without reads.
    pub key: Option<DemuxOutputKey>,
}

/// Source file and the canonical path it should end up at. The two are equal
/// when the file is already correctly named.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct PlannedRename {
    pub source: PathBuf,
    pub target: PathBuf,
    pub key: DemuxOutputKey,
}

impl PlannedRename {
    pub fn is_move(&self) -> bool {
        self.source != self.target
    }

    /// Where the file ends up once the rename and any compression are done.
    pub fn final_path(&self, compress: bool) -> PathBuf {
        if compress && !utils::is_gzipped(&self.target) {
            utils::gz_path(&self.target)
        } else {
            self.target.clone()
        }
    }
}

/// A fully classified run, before anything has been renamed.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct DemuxPlan {
    pub files: Vec<FileSummary>,
    pub targets: Vec<PlannedRename>,
    /// Plain outputs are gzipped after the renames.
    #[serde(default)]
    pub compress: bool,
}

impl DemuxPlan {
    /// The planned renames that actually move a file.
    pub fn moves(&self) -> impl Iterator<Item = &PlannedRename> {
        self.targets.iter().filter(|t| t.is_move())
    }

    pub fn read_counts(&self) -> BTreeMap<DemuxOutputKey, u64> {
        let mut counts = BTreeMap::new();
        for f in &self.files {
            if let Some(key) = f.key {
                *counts.entry(key).or_insert(0) += f.reads;
            }
        }
        counts
    }
}

/// Final per-key output files and their read counts.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct DemuxOutputs {
    pub outputs: BTreeMap<DemuxOutputKey, PathBuf>,
    pub read_counts: BTreeMap<DemuxOutputKey, u64>,
    pub files: Vec<FileSummary>,
}

/// Cooperative cancellation flag, checked between input files.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Demultiplexer<'a> {
    parser: &'a HeaderParser,
    samples: &'a SampleIndexMap,
    prefix: Option<String>,
    compress: bool,
    cancel: CancelToken,
}

impl<'a> Demultiplexer<'a> {
    pub fn new(parser: &'a HeaderParser, samples: &'a SampleIndexMap) -> Demultiplexer<'a> {
        Demultiplexer {
            parser,
            samples,
            prefix: None,
            compress: false,
            cancel: CancelToken::new(),
        }
    }

    /// Prefix of the output filenames. Defaults to `Reads`.
    pub fn prefix(mut self, prefix: Option<String>) -> Self {
        self.prefix = prefix;
        self
    }

    /// Gzip outputs that are not already compressed after they are renamed.
    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Classify every input file, validate the resulting plan, then rename
    /// (and optionally compress) the files.
    pub fn run(&self, files: &[PathBuf]) -> Result<DemuxOutputs, Error> {
        let plan = self.plan(files)?;
        validate::validate_plan(&plan)?;
        let mut outputs = validate::commit(&plan)?;

        if plan.compress {
            for path in outputs.outputs.values_mut() {
                if !utils::is_gzipped(&path) {
                    info!("Compressing {:?}", path);
                    *path = utils::gzip_file(&path)?;
                }
            }
        }

        Ok(outputs)
    }

    /// Stream every input file once and build the rename plan.
    pub fn plan(&self, files: &[PathBuf]) -> Result<DemuxPlan, Error> {
        let mut plan = DemuxPlan {
            compress: self.compress,
            ..DemuxPlan::default()
        };

        for path in files {
            if self.cancel.is_cancelled() {
                return Err(GenotypingError::Cancelled { file: path.clone() }.into());
            }

            let summary = self.classify_file(path)?;

            if let Some(key) = summary.key {
                let name = filenames::canonical_output_name(
                    self.prefix.as_deref(),
                    key.pair,
                    key.sample,
                    utils::is_gzipped(path),
                );
                let target = path.parent().unwrap_or_else(|| Path::new("")).join(name);
                plan.targets.push(PlannedRename {
                    source: path.clone(),
                    target,
                    key,
                });
            }
            plan.files.push(summary);
        }

        Ok(plan)
    }

    /// Count the reads of one file, checking that they all belong to the
    /// same sample and pair.
    pub fn classify_file(&self, path: &Path) -> Result<FileSummary, Error> {
        info!("Beginning to parse file: {:?}", path);

        if utils::has_at_most_one_line(path)? {
            if filenames::is_null_placeholder(path) {
                debug!("Skipping placeholder file {:?}", path);
            } else {
                warn!("File {:?} contains no reads, skipping", path);
            }
            return Ok(FileSummary {
                path: path.to_path_buf(),
                reads: 0,
                key: None,
            });
        }

        let rdr = utils::open_with_gz(path)?;
        let mut iter = fastq::Parser::new(rdr).ref_iter();

        let mut first: Option<(SampleTag, u8)> = None;
        let mut key = None;
        let mut reads = 0u64;

        loop {
            iter.advance()
                .with_context(|| format!("error reading FASTQ record from {:?}", path))?;
            let rec = match iter.get() {
                Some(rec) => rec,
                None => break,
            };

            let head = String::from_utf8_lossy(rec.head());
            let header = self.parser.parse(&head)?;

            match first {
                None => {
                    first = Some((header.sample, header.pair));
                    key = Some(DemuxOutputKey {
                        sample: self.resolve(header.sample, path)?,
                        pair: header.pair,
                    });
                }
                Some((sample, pair)) if sample != header.sample || pair != header.pair => {
                    return Err(GenotypingError::HeterogeneousFile {
                        file: path.to_path_buf(),
                        first_sample: sample,
                        first_pair: pair,
                        sample: header.sample,
                        pair: header.pair,
                    }
                    .into());
                }
                Some(_) => (),
            }

            reads += 1;
            if reads % PROGRESS_INTERVAL == 0 {
                info!("{} reads processed", reads);
            }
        }

        if reads % PROGRESS_INTERVAL != 0 {
            info!("{} reads processed", reads);
        }
        info!("Finished parsing file: {:?}", path);

        Ok(FileSummary {
            path: path.to_path_buf(),
            reads,
            key,
        })
    }

    fn resolve(&self, tag: SampleTag, path: &Path) -> Result<SampleKey, GenotypingError> {
        let resolved = match tag {
            SampleTag::Index(idx) => self.samples.sample_key(idx),
            SampleTag::SampleName(id) => self.samples.index_of(id).map(|_| SampleKey::Sample(id)),
        };

        resolved.ok_or_else(|| GenotypingError::UnresolvedSample {
            sample: tag,
            file: path.to_path_buf(),
            known: self.samples.describe(),
        })
    }
}
