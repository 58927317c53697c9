//! Read the `[Data]` section of an Illumina sample sheet. The 1-based row
//! order of the data section is the sample index the instrument writes into
//! each read header.

use anyhow::{Context, Error};
use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::path::Path;

use crate::error::GenotypingError;
use crate::model::SampleId;
use crate::sample_index::SampleIndexMap;
use crate::utils;

const DATA_SECTION: &str = "[Data]";
const SAMPLE_ID_HEADER: &str = "Sample_ID";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SampleSheet {
    pub index_map: SampleIndexMap,
    /// `Sample_Name` column to durable sample id, for rows that have a name.
    pub names: BTreeMap<String, SampleId>,
}

impl SampleSheet {
    /// Parse the sample sheet at `path`. When `known_samples` is given, every
    /// sample id must be one of them.
    pub fn from_path(
        path: impl AsRef<Path>,
        known_samples: Option<&HashSet<SampleId>>,
    ) -> Result<SampleSheet, Error> {
        let reader = utils::open_with_gz(path.as_ref())?;
        let sheet = SampleSheet::from_reader(reader, path.as_ref(), known_samples)
            .with_context(|| format!("error reading sample sheet {:?}", path.as_ref()))?;
        Ok(sheet)
    }

    pub fn from_reader<R: Read>(
        reader: R,
        path: &Path,
        known_samples: Option<&HashSet<SampleId>>,
    ) -> Result<SampleSheet, Error> {
        let err = |msg: String| GenotypingError::SampleSheet {
            path: path.to_path_buf(),
            msg,
        };

        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut sheet = SampleSheet::default();
        let mut in_samples = false;
        let mut sample_idx = 0u32;

        for record in csv_reader.records() {
            let record = record?;
            let first = record.get(0).map(str::trim).unwrap_or("");

            if first == DATA_SECTION {
                in_samples = true;
                continue;
            }
            if !in_samples {
                continue;
            }
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            if first.eq_ignore_ascii_case(SAMPLE_ID_HEADER) {
                continue;
            }

            sample_idx += 1;
            let id: u32 = first
                .parse()
                .map_err(|_| err(format!("the sample id was not an integer: '{}'", first)))?;
            let id = SampleId(id);

            if let Some(known) = known_samples {
                if !known.contains(&id) {
                    return Err(err(format!(
                        "sample id {} does not match any sample in the samples list",
                        id
                    ))
                    .into());
                }
            }

            sheet.index_map.insert(sample_idx, id);
            if let Some(name) = record.get(1).map(str::trim).filter(|n| !n.is_empty()) {
                sheet.names.insert(name.to_string(), id);
            }
        }

        if !in_samples {
            return Err(err(format!("no {} section found", DATA_SECTION)).into());
        }

        Ok(sheet)
    }
}
