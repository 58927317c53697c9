//! Per-folder genotyping settings, stored as JSON.

use anyhow::{Context, Error};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::filenames::illumina::DEFAULT_OUTPUT_PREFIX;
use crate::read_header::{HeaderParser, HeaderVariantKind};

fn default_sequences_view() -> String {
    "sequences".to_string()
}

fn default_header_variants() -> Vec<HeaderVariantKind> {
    HeaderVariantKind::all()
}

fn default_compress() -> bool {
    true
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GenotypingSettings {
    /// Name of the view listing the reference sequences alleles are resolved against.
    #[serde(default = "default_sequences_view")]
    pub sequences_view: String,
    #[serde(default)]
    pub sequence_dictionary: u32,
    /// Prefix of the demultiplexed file names. Defaults to `Reads`.
    #[serde(default)]
    pub output_prefix: Option<String>,
    #[serde(default = "default_compress")]
    pub compress_outputs: bool,
    /// Only FASTQ files whose name starts with this prefix are imported.
    #[serde(default)]
    pub fastq_prefix: Option<String>,
    #[serde(default = "default_header_variants")]
    pub header_variants: Vec<HeaderVariantKind>,
    /// Record every demultiplexed read in the reads table.
    #[serde(default)]
    pub store_reads: bool,
}

impl Default for GenotypingSettings {
    fn default() -> Self {
        GenotypingSettings {
            sequences_view: default_sequences_view(),
            sequence_dictionary: 0,
            output_prefix: None,
            compress_outputs: default_compress(),
            fastq_prefix: None,
            header_variants: default_header_variants(),
            store_reads: false,
        }
    }
}

impl GenotypingSettings {
    pub fn from_json(json: &str) -> Result<GenotypingSettings, Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<GenotypingSettings, Error> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("error reading settings {:?}", path))?;
        GenotypingSettings::from_json(&json)
            .with_context(|| format!("error parsing settings {:?}", path))
    }

    pub fn header_parser(&self) -> HeaderParser {
        HeaderParser::from_kinds(&self.header_variants)
    }

    pub fn output_prefix(&self) -> &str {
        self.output_prefix
            .as_deref()
            .unwrap_or(DEFAULT_OUTPUT_PREFIX)
    }
}
