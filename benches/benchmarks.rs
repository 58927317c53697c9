#[macro_use]
extern crate criterion;

use criterion::Criterion;
use genotyping::demux::Demultiplexer;
use genotyping::model::SampleId;
use genotyping::read_header::{HeaderParser, HeaderVariantKind};
use genotyping::sample_index::SampleIndexMap;
use std::fmt::Write;

const INDEX_HEADER: &str = "@M00123:45:000000000-A1B2C:1:1101:15589:1333 2:N:0:3";
const NAME_HEADER: &str = "@M00123:45:000000000-A1B2C:1:1101:15589:1333 1:N:0:ACGTAC+GGTTAA 7781";

fn run_header_benchmark(c: &mut Criterion) {
    let parser = HeaderParser::default();
    c.bench_function("bench-parse-sample-index-header", |b| {
        b.iter(|| assert_eq!(parser.parse(INDEX_HEADER).unwrap().pair, 2))
    });
    c.bench_function("bench-parse-sample-name-header", |b| {
        b.iter(|| assert_eq!(parser.parse(NAME_HEADER).unwrap().pair, 1))
    });

    let index_only = HeaderParser::from_kinds(&[HeaderVariantKind::SampleIndex]);
    c.bench_function("bench-parse-header-single-variant", |b| {
        b.iter(|| assert_eq!(index_only.parse(INDEX_HEADER).unwrap().lane, 1))
    });
}

fn run_classify_benchmark(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Run1_S1_L001_R1_001.fastq");
    let mut body = String::new();
    for n in 0..4000 {
        writeln!(body, "@M00123:45:FC1:1:1101:{}:{} 1:N:0:1", n, n + 7).unwrap();
        writeln!(body, "ACGTACGTACGTACGTACGTACGTACGTACGT").unwrap();
        writeln!(body, "+").unwrap();
        writeln!(body, "IIIIIIIIIIIIIIIIIIIIIIIIIIIIIIII").unwrap();
    }
    std::fs::write(&path, body).unwrap();

    let parser = HeaderParser::default();
    let samples = SampleIndexMap::from_pairs(vec![(1, SampleId(101))]);
    let demux = Demultiplexer::new(&parser, &samples);
    c.bench_function("bench-classify-fastq", |b| {
        b.iter(|| assert_eq!(demux.classify_file(&path).unwrap().reads, 4000))
    });
}

criterion_group!(benches, run_header_benchmark, run_classify_benchmark);
criterion_main!(benches);
