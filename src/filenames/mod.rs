//! Utilities for finding per-run FASTQ files on disk and for the naming
//! conventions of demultiplexed output files.

pub mod illumina;

use anyhow::Error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::GenotypingError;

pub use illumina::{canonical_output_name, is_null_placeholder, pairing_key, PairingKey};

/// A method to find the raw FASTQ files of one run based on
/// some configuration information held by `self`.
pub trait FindFastqs {
    fn find_fastqs(&self) -> Result<Vec<PathBuf>, Error>;
}

/// A pointer to the FASTQ files of one Illumina run: every `.fastq` / `.fq`
/// file (optionally gzipped) in `fastq_path`, restricted to names starting
/// with `prefix` when one is given.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq, Debug)]
pub struct IlluminaRunDef {
    pub fastq_path: PathBuf,
    pub prefix: Option<String>,
}

impl IlluminaRunDef {
    pub fn new(fastq_path: impl AsRef<Path>, prefix: Option<String>) -> IlluminaRunDef {
        IlluminaRunDef {
            fastq_path: fastq_path.as_ref().to_path_buf(),
            prefix,
        }
    }
}

impl FindFastqs for IlluminaRunDef {
    fn find_fastqs(&self) -> Result<Vec<PathBuf>, Error> {
        let mut res = Vec::new();

        for entry in std::fs::read_dir(&self.fastq_path)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) => n,
                None => continue,
            };
            if !illumina::is_fastq_name(name) {
                continue;
            }
            if let Some(ref prefix) = self.prefix {
                if !name.starts_with(prefix.as_str()) {
                    continue;
                }
            }
            res.push(path);
        }

        if res.is_empty() {
            return Err(GenotypingError::NoFastqFiles {
                dir: self.fastq_path.clone(),
                prefix: self.prefix.clone(),
            }
            .into());
        }

        res.sort();
        Ok(res)
    }
}
