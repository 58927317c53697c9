//! Turn the tab-delimited match export of an external genotyping analysis
//! into match rows plus their allele and read junctions.

use anyhow::{Context, Error};
use log::{debug, info};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use crate::error::GenotypingError;
use crate::model::{AlleleJunction, AnalysisId, MatchId, MatchStats, ReadId, ReadJunction, SampleId};
use crate::sequences::SequenceDictionary;
use crate::store::Tables;
use crate::utils;

/// One row of the match export.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct MatchExportRow {
    pub sample: String,
    pub reads: i64,
    pub percent: f64,
    pub avg_length: f64,
    pub pos_reads: i64,
    pub neg_reads: i64,
    pub pos_ext_reads: i64,
    pub neg_ext_reads: i64,
    #[serde(default)]
    pub alleles: String,
    #[serde(default)]
    pub read_ids: String,
}

impl MatchExportRow {
    pub fn stats(&self) -> MatchStats {
        MatchStats {
            reads: self.reads,
            percent: self.percent,
            average_length: self.avg_length,
            pos_reads: self.pos_reads,
            neg_reads: self.neg_reads,
            pos_ext_reads: self.pos_ext_reads,
            neg_ext_reads: self.neg_ext_reads,
        }
    }

    pub fn allele_names(&self) -> impl Iterator<Item = &str> {
        split_list(&self.alleles)
    }

    pub fn read_ids(&self) -> Result<Vec<ReadId>, Error> {
        split_list(&self.read_ids)
            .map(|r| {
                r.parse()
                    .map(ReadId)
                    .with_context(|| format!("read id '{}' is not an integer", r))
            })
            .collect()
    }
}

fn split_list(s: &str) -> impl Iterator<Item = &str> {
    s.split(',').map(str::trim).filter(|v| !v.is_empty())
}

pub fn read_export<R: Read>(reader: R) -> Result<Vec<MatchExportRow>, Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for row in rdr.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

pub fn read_export_file(path: &Path) -> Result<Vec<MatchExportRow>, Error> {
    let reader = utils::open_with_gz(path)?;
    read_export(reader).with_context(|| format!("error reading match export {:?}", path))
}

/// Writes the matches of one analysis. Constructed once per import and used
/// inside the caller's transaction.
pub struct MatchBuilder<'a> {
    analysis: AnalysisId,
    samples: &'a BTreeMap<String, SampleId>,
    sequences: &'a SequenceDictionary,
}

impl<'a> MatchBuilder<'a> {
    pub fn new(
        analysis: AnalysisId,
        samples: &'a BTreeMap<String, SampleId>,
        sequences: &'a SequenceDictionary,
    ) -> MatchBuilder<'a> {
        MatchBuilder {
            analysis,
            samples,
            sequences,
        }
    }

    /// Insert one export row. Returns `None` for rows without a sample.
    pub fn insert(
        &self,
        tables: &mut dyn Tables,
        row: &MatchExportRow,
    ) -> Result<Option<MatchId>, Error> {
        if row.sample.trim().is_empty() {
            debug!("skipping match export row without a sample");
            return Ok(None);
        }

        let sample = *self.samples.get(row.sample.trim()).ok_or_else(|| {
            GenotypingError::UnknownSampleKey {
                sample: row.sample.clone(),
            }
        })?;

        // resolve before writing anything
        let alleles = row
            .allele_names()
            .map(|a| self.sequences.resolve(a))
            .collect::<Result<Vec<_>, _>>()?;
        let reads = row.read_ids()?;

        let match_id = tables.insert_match(self.analysis, sample, row.stats());
        for sequence in alleles {
            tables.insert_allele_junction(AlleleJunction {
                analysis: self.analysis,
                match_id,
                sequence,
            });
        }
        for read in reads {
            tables.insert_read_junction(ReadJunction { match_id, read });
        }

        Ok(Some(match_id))
    }

    pub fn insert_all(
        &self,
        tables: &mut dyn Tables,
        rows: &[MatchExportRow],
    ) -> Result<Vec<MatchId>, Error> {
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(id) = self.insert(tables, row)? {
                ids.push(id);
            }
        }
        info!(
            "Inserted {} matches for analysis {}",
            ids.len(),
            self.analysis
        );
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewAnalysis, NewRun, Platform, SequenceId};
    use crate::store::{MemoryStore, Store};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    const EXPORT: &str = "sample\treads\tpercent\tavg_length\tpos_reads\tneg_reads\tpos_ext_reads\tneg_ext_reads\talleles\tread_ids
r01\t10\t25.0\t100.0\t6\t4\t0\t0\tA*01,B*02\t1,2,3
\t3\t1.0\t90.0\t3\t0\t0\t0\tA*01\t4
r02\t5\t12.5\t150.5\t2\t3\t0\t0\tB*02\t
";

    fn setup() -> Result<(MemoryStore, AnalysisId), Error> {
        let store = MemoryStore::new();
        let analysis = store.transaction(|t| {
            let run = t.insert_run(
                NewRun {
                    container: "lab".to_string(),
                    created_by: "tech".to_string(),
                    meta_data_id: None,
                    path: PathBuf::from("/runs/run1"),
                    platform: Platform::Illumina,
                },
                0,
            )?;
            Ok(t.insert_analysis(NewAnalysis {
                run: run.id,
                description: None,
                sequences_view: None,
                sequence_dictionary: 1,
            })?)
        })?;
        Ok((store, analysis.id))
    }

    fn dictionary() -> SequenceDictionary {
        SequenceDictionary::from_rows(
            1,
            "sequences",
            vec![
                ("A*01".to_string(), SequenceId(11)),
                ("B*02".to_string(), SequenceId(12)),
            ],
        )
    }

    fn samples() -> BTreeMap<String, SampleId> {
        vec![
            ("r01".to_string(), SampleId(101)),
            ("r02".to_string(), SampleId(102)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_read_export() -> Result<(), Error> {
        let rows = read_export(EXPORT.as_bytes())?;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].allele_names().collect::<Vec<_>>(), vec!["A*01", "B*02"]);
        assert_eq!(rows[0].read_ids()?, vec![ReadId(1), ReadId(2), ReadId(3)]);
        assert_eq!(rows[2].read_ids()?, Vec::<ReadId>::new());
        assert_eq!(rows[2].stats().average_length, 150.5);
        Ok(())
    }

    #[test]
    fn test_insert_all() -> Result<(), Error> {
        let (store, analysis) = setup()?;
        let rows = read_export(EXPORT.as_bytes())?;
        let (samples, dict) = (samples(), dictionary());
        let builder = MatchBuilder::new(analysis, &samples, &dict);

        let ids = store.transaction(|t| builder.insert_all(t, &rows))?;
        assert_eq!(ids.len(), 2);

        let (matches, alleles, reads) = store.query(|t| {
            (
                t.matches(analysis),
                t.allele_junctions(&ids),
                t.read_junctions(&ids),
            )
        })?;
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].sample, SampleId(101));
        assert_eq!(matches[0].stats.reads, 10);
        assert_eq!(alleles.len(), 3);
        assert_eq!(
            reads,
            vec![
                ReadJunction { match_id: ids[0], read: ReadId(1) },
                ReadJunction { match_id: ids[0], read: ReadId(2) },
                ReadJunction { match_id: ids[0], read: ReadId(3) },
            ]
        );
        Ok(())
    }

    #[test]
    fn test_unknown_allele_rolls_back() -> Result<(), Error> {
        let (store, analysis) = setup()?;
        let mut rows = read_export(EXPORT.as_bytes())?;
        rows[2].alleles = "B*02,C*99".to_string();
        let (samples, dict) = (samples(), dictionary());
        let builder = MatchBuilder::new(analysis, &samples, &dict);

        let err = store.transaction(|t| builder.insert_all(t, &rows)).unwrap_err();
        match err.downcast_ref::<GenotypingError>() {
            Some(GenotypingError::UnknownAllele { allele, .. }) => assert_eq!(allele, "C*99"),
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(store.query(|t| t.match_count(analysis))?, 0);
        Ok(())
    }

    #[test]
    fn test_unknown_sample() -> Result<(), Error> {
        let (store, analysis) = setup()?;
        let mut rows = read_export(EXPORT.as_bytes())?;
        rows[0].sample = "r77".to_string();
        let (samples, dict) = (samples(), dictionary());
        let builder = MatchBuilder::new(analysis, &samples, &dict);

        let err = store.transaction(|t| builder.insert_all(t, &rows)).unwrap_err();
        assert!(err.to_string().contains("\"r77\""), "{}", err);
        Ok(())
    }
}
