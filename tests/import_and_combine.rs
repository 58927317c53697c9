//! Reads import, analysis import and match consolidation driven through the
//! public API against the in-memory store.

use anyhow::Error;
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use genotyping::cascade::delete_run;
use genotyping::jobs::{create_run, ImportAnalysisJob, ImportReadsJob, JobOutcome};
use genotyping::model::{MatchParent, NewAnalysis, NewRun, Platform, SampleId, SequenceId, Status};
use genotyping::sequences::SequenceDictionary;
use genotyping::store::{MemoryStore, StatusEntity, Store};
use genotyping::{combine_matches, update_status, GenotypingError, GenotypingSettings};

fn write_fastq(path: &Path, sample_index: u32, pair: u8, seqs: &[&str]) -> Result<(), Error> {
    let mut body = String::new();
    for (n, seq) in seqs.iter().enumerate() {
        writeln!(
            body,
            "@M00123:45:FC1:1:1101:{}:{} {}:N:0:{}",
            n,
            n + 3,
            pair,
            sample_index
        )?;
        writeln!(body, "{}\n+\n{}", seq, "I".repeat(seq.len()))?;
    }
    std::fs::write(path, body)?;
    Ok(())
}

const SHEET: &str = "[Header]
Experiment Name,Run77

[Data]
Sample_ID,Sample_Name,index
201,r201,ATCACG
202,r202,CGATGT
";

const EXPORT: &str = "sample\treads\tpercent\tavg_length\tpos_reads\tneg_reads\tpos_ext_reads\tneg_ext_reads\talleles\tread_ids
r201\t10\t40.0\t100.0\t5\t5\t0\t0\tMamu-A1*001,Mamu-A1*002\t1,2,3
r201\t30\t60.0\t200.0\t20\t10\t0\t0\tMamu-A1*002\t3,4,5
r202\t8\t100.0\t150.0\t4\t4\t0\t0\tMamu-B*017\t6
";

#[test]
fn test_full_import_and_combine() -> Result<(), Error> {
    let dir = tempfile::tempdir()?;
    let p = dir.path();
    std::fs::write(p.join("SampleSheet.csv"), SHEET)?;
    write_fastq(&p.join("Run77_S1_L001_R1_001.fastq"), 1, 1, &["ACGT", "ACGA"])?;
    write_fastq(&p.join("Run77_S1_L001_R2_001.fastq"), 1, 2, &["TTGA", "TTGC"])?;
    write_fastq(&p.join("Run77_S2_L001_R1_001.fastq"), 2, 1, &["GGGA"])?;
    write_fastq(&p.join("Run77_S2_L001_R2_001.fastq"), 2, 2, &["CCCA"])?;

    let store = MemoryStore::new();
    let settings = GenotypingSettings::from_json(r#"{"output_prefix": "Run77", "compress_outputs": false}"#)?;

    let run = create_run(
        &store,
        NewRun {
            container: "lab".to_string(),
            created_by: "tech".to_string(),
            meta_data_id: Some(77),
            path: p.join("SampleSheet.csv"),
            platform: Platform::Illumina,
        },
    )?;
    assert!(update_status(&store, StatusEntity::Run(run.id), Status::NotSubmitted, Status::Submitted)?);

    let outcome = ImportReadsJob::new(&store, &settings, run.id, p.join("SampleSheet.csv")).run()?;
    assert!(matches!(outcome, JobOutcome::Complete(_)));
    for name in &["Run77-R1-201.fastq", "Run77-R2-201.fastq", "Run77-R1-202.fastq", "Run77-R2-202.fastq"] {
        assert!(p.join(name).exists(), "{} missing", name);
    }
    assert_eq!(store.query(|t| t.sequence_files(run.id).len())?, 4);

    // importing the same run number again is refused
    let again = create_run(
        &store,
        NewRun {
            container: "lab".to_string(),
            created_by: "tech".to_string(),
            meta_data_id: Some(77),
            path: p.join("SampleSheet.csv"),
            platform: Platform::Illumina,
        },
    );
    assert!(matches!(
        again.unwrap_err().downcast_ref::<GenotypingError>(),
        Some(GenotypingError::RunAlreadyImported(77))
    ));

    // analysis over the imported run
    let analysis = store.transaction(|t| {
        Ok(t.insert_analysis(NewAnalysis {
            run: run.id,
            description: Some("MHC class I".to_string()),
            sequences_view: Some("sequences".to_string()),
            sequence_dictionary: 1,
        })?)
    })?;
    update_status(&store, StatusEntity::Analysis(analysis.id), Status::NotSubmitted, Status::Submitted)?;

    let export = p.join("matches.txt");
    std::fs::write(&export, EXPORT)?;
    let dictionary = SequenceDictionary::from_rows(
        1,
        "sequences",
        vec![
            ("Mamu-A1*001".to_string(), SequenceId(1)),
            ("Mamu-A1*002".to_string(), SequenceId(2)),
            ("Mamu-B*017".to_string(), SequenceId(3)),
        ],
    );
    let samples: BTreeMap<String, SampleId> = vec![
        ("r201".to_string(), SampleId(201)),
        ("r202".to_string(), SampleId(202)),
    ]
    .into_iter()
    .collect();

    let ids = match ImportAnalysisJob::new(&store, analysis.id, &export, samples, &dictionary).run()? {
        JobOutcome::Complete(ids) => ids,
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(ids.len(), 3);

    // the two r201 matches cannot be merged with r202
    let err = combine_matches(&store, analysis.id, &ids, &[SequenceId(2)]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<GenotypingError>(),
        Some(GenotypingError::CrossSample { .. })
    ));

    let combined = combine_matches(&store, analysis.id, &ids[..2], &[SequenceId(2)])?;
    let (all, reads) = store.query(|t| (t.matches(analysis.id), t.read_junctions(&[combined])))?;

    let new = all.iter().find(|m| m.id == combined).unwrap();
    assert_eq!(new.stats.reads, 40);
    assert_eq!(new.stats.average_length, 175.0);
    assert_eq!(new.stats.percent, 100.0);
    assert_eq!(
        reads.iter().map(|j| j.read.0).collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5]
    );
    assert_eq!(
        all.iter().filter(|m| m.parent == Some(MatchParent::Combined(combined))).count(),
        2
    );
    assert_eq!(store.query(|t| t.match_count(analysis.id))?, 2);

    // deleting the run takes the analysis with it
    delete_run(&store, run.id)?;
    store.query(|t| {
        assert!(t.analysis(analysis.id).is_none());
        assert!(t.matches(analysis.id).is_empty());
        assert_eq!(t.run_count("lab"), 0);
    })?;
    Ok(())
}
