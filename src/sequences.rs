//! Reference sequence dictionary used to resolve allele names written by the
//! external analysis into sequence row ids.

use anyhow::{Context, Error};
use bio::io::fasta;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::GenotypingError;
use crate::model::SequenceId;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SequenceDictionary {
    pub id: u32,
    pub view: String,
    names: BTreeMap<String, SequenceId>,
}

impl SequenceDictionary {
    pub fn from_rows(
        id: u32,
        view: impl Into<String>,
        rows: impl IntoIterator<Item = (String, SequenceId)>,
    ) -> SequenceDictionary {
        SequenceDictionary {
            id,
            view: view.into(),
            names: rows.into_iter().collect(),
        }
    }

    /// Load allele names from a reference FASTA. Sequence ids are assigned
    /// 1, 2, ... in file order.
    pub fn from_fasta(id: u32, view: &str, path: &Path) -> Result<SequenceDictionary, Error> {
        let reader = fasta::Reader::from_file(path)
            .with_context(|| format!("error opening reference sequences {:?}", path))?;

        let mut names = BTreeMap::new();
        for (i, record) in reader.records().enumerate() {
            let record =
                record.with_context(|| format!("error reading reference sequences {:?}", path))?;
            names.insert(record.id().to_string(), SequenceId(i as u32 + 1));
        }

        Ok(SequenceDictionary {
            id,
            view: view.to_string(),
            names,
        })
    }

    pub fn get(&self, allele: &str) -> Option<SequenceId> {
        self.names.get(allele).copied()
    }

    pub fn resolve(&self, allele: &str) -> Result<SequenceId, GenotypingError> {
        self.get(allele).ok_or_else(|| GenotypingError::UnknownAllele {
            allele: allele.to_string(),
            dictionary: self.id,
            view: self.view.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
