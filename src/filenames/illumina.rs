//! Filename conventions for Illumina FASTQ inputs and demultiplexed outputs.
//! Inputs look like `Run12_S3_L001_R2_001.fastq.gz`; outputs are named
//! `<prefix>-R<pair>-<sample id>.fastq[.gz]`, with `Control` in place of the
//! sample id for unassigned reads.

use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

use crate::sample_index::SampleKey;

lazy_static! {
    static ref FASTQ_NAME_REGEX: Regex = Regex::new(r"\.(fastq|fq)(\.gz)?$").unwrap();
    static ref PAIR_INFIX_REGEX: Regex = Regex::new(r"([_.-])R([12])([_.-])").unwrap();
    static ref NULL_PLACEHOLDER_REGEX: Regex =
        Regex::new(r"(?i)(^|[_.-])null([_.-]|$)").unwrap();
}

pub const DEFAULT_OUTPUT_PREFIX: &str = "Reads";

pub fn is_fastq_name(name: &str) -> bool {
    FASTQ_NAME_REGEX.is_match(name)
}

/// A filename with its `R1`/`R2` infix replaced by `R*`, plus the side the
/// file was on. Forward and reverse files of one sample share a key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairingKey {
    pub key: String,
    pub read: u8,
}

/// Strip the last `R1`/`R2` infix from `path`'s filename. Returns `None` for
/// files whose names do not encode pairing.
pub fn pairing_key(path: impl AsRef<Path>) -> Option<PairingKey> {
    let name = path.as_ref().file_name()?.to_str()?;
    let cap = PAIR_INFIX_REGEX.captures_iter(name).last()?;
    let whole = cap.get(0)?;
    let read: u8 = cap.get(2)?.as_str().parse().ok()?;

    let key = format!(
        "{}{}R*{}{}",
        &name[..whole.start()],
        &cap[1],
        &cap[3],
        &name[whole.end()..]
    );

    Some(PairingKey { key, read })
}

/// True for files that were written as deliberate empty placeholders.
pub fn is_null_placeholder(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| NULL_PLACEHOLDER_REGEX.is_match(n))
}

/// Output filename for the reads of `sample` on read `pair`.
pub fn canonical_output_name(
    prefix: Option<&str>,
    pair: u8,
    sample: SampleKey,
    gzipped: bool,
) -> String {
    format!(
        "{}-R{}-{}.fastq{}",
        prefix.unwrap_or(DEFAULT_OUTPUT_PREFIX),
        pair,
        sample,
        if gzipped { ".gz" } else { "" }
    )
}
