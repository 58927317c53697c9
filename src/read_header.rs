// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Parse Illumina (Casava 1.8 style) read headers of the form
//! `@<instrument>:<run>:<flowcell>:<lane>:<tile>:<x>:<y> <pair>:<filtered>:<control>:<sample>`.
//!
//! The trailing sample field has changed over instrument software versions.
//! Each known layout is a `HeaderVariant`; a `HeaderParser` tries its variants
//! in order and the first that recognizes the sample field wins.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::GenotypingError;
use crate::model::SampleId;

/// Number of positional fields that precede the sample field.
pub const MIN_HEADER_FIELDS: usize = 10;

/// How a read identifies its sample.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SampleTag {
    /// Dense 1-based index into the run's sample sheet. 0 is control.
    Index(u32),
    /// Durable sample id written directly by newer exporters.
    SampleName(SampleId),
}

impl fmt::Display for SampleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleTag::Index(idx) => write!(f, "index {}", idx),
            SampleTag::SampleName(id) => write!(f, "name {}", id),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ReadHeader {
    pub instrument: String,
    pub run_id: u32,
    pub flow_cell: String,
    pub lane: u32,
    pub tile: u32,
    pub x: u32,
    pub y: u32,
    pub pair: u8,
    pub failed_filter: bool,
    pub control_bits: u32,
    pub sample: SampleTag,
}

/// One recognized layout of the sample field(s) following the ten
/// positional fields.
pub trait HeaderVariant: Send + Sync {
    fn name(&self) -> &'static str;

    /// Extract the sample tag from the split header, or `None` if this
    /// layout does not apply.
    fn sample_tag(&self, fields: &[&str]) -> Option<SampleTag>;
}

/// `...:<pair>:<filtered>:<control>:<sample index>`
pub struct SampleIndexVariant;

impl HeaderVariant for SampleIndexVariant {
    fn name(&self) -> &'static str {
        "sample-index"
    }

    fn sample_tag(&self, fields: &[&str]) -> Option<SampleTag> {
        let idx = fields.get(MIN_HEADER_FIELDS)?.parse().ok()?;
        Some(SampleTag::Index(idx))
    }
}

/// `...:<pair>:<filtered>:<control>:<index sequence> <sample name>` where the
/// sample name is the numeric durable sample id.
pub struct SampleNameVariant;

impl HeaderVariant for SampleNameVariant {
    fn name(&self) -> &'static str {
        "sample-name"
    }

    fn sample_tag(&self, fields: &[&str]) -> Option<SampleTag> {
        let index_seq = fields.get(MIN_HEADER_FIELDS)?;
        if index_seq.is_empty() || !index_seq.bytes().all(|b| b"ACGTN+".contains(&b)) {
            return None;
        }
        let id = fields.get(MIN_HEADER_FIELDS + 1)?.parse().ok()?;
        Some(SampleTag::SampleName(SampleId(id)))
    }
}

/// Names of the built-in variants, for selecting them from settings.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HeaderVariantKind {
    SampleIndex,
    SampleName,
}

impl HeaderVariantKind {
    pub fn all() -> Vec<HeaderVariantKind> {
        vec![HeaderVariantKind::SampleIndex, HeaderVariantKind::SampleName]
    }

    fn build(self) -> Box<dyn HeaderVariant> {
        match self {
            HeaderVariantKind::SampleIndex => Box::new(SampleIndexVariant),
            HeaderVariantKind::SampleName => Box::new(SampleNameVariant),
        }
    }
}

pub struct HeaderParser {
    variants: Vec<Box<dyn HeaderVariant>>,
}

impl Default for HeaderParser {
    fn default() -> Self {
        HeaderParser::from_kinds(&HeaderVariantKind::all())
    }
}

impl HeaderParser {
    pub fn new(variants: Vec<Box<dyn HeaderVariant>>) -> HeaderParser {
        HeaderParser { variants }
    }

    pub fn from_kinds(kinds: &[HeaderVariantKind]) -> HeaderParser {
        HeaderParser::new(kinds.iter().map(|k| k.build()).collect())
    }

    /// Register an additional layout, tried after the existing ones.
    pub fn push_variant(&mut self, variant: Box<dyn HeaderVariant>) {
        self.variants.push(variant);
    }

    pub fn variant_names(&self) -> Vec<&'static str> {
        self.variants.iter().map(|v| v.name()).collect()
    }

    pub fn parse(&self, header: &str) -> Result<ReadHeader, GenotypingError> {
        let err = |reason: String| GenotypingError::HeaderFormat {
            header: header.to_string(),
            reason,
        };

        let trimmed = header.trim_end().trim_start_matches('@');
        let fields: Vec<&str> = trimmed.split(|c| c == ':' || c == ' ').collect();

        if fields.len() < MIN_HEADER_FIELDS {
            return Err(err(format!(
                "expected at least {} fields, found {}",
                MIN_HEADER_FIELDS,
                fields.len()
            )));
        }

        let int = |pos: usize, what: &str| -> Result<u32, GenotypingError> {
            fields[pos]
                .parse::<u32>()
                .map_err(|_| err(format!("{} '{}' is not an integer", what, fields[pos])))
        };

        let run_id = int(1, "run id")?;
        let lane = int(3, "lane")?;
        let tile = int(4, "tile")?;
        let x = int(5, "x coordinate")?;
        let y = int(6, "y coordinate")?;
        let pair = match int(7, "pair number")? {
            p @ 1..=2 => p as u8,
            p => return Err(err(format!("pair number must be 1 or 2, found {}", p))),
        };
        let control_bits = int(9, "control bits")?;

        let sample = self
            .variants
            .iter()
            .find_map(|v| v.sample_tag(&fields))
            .ok_or_else(|| {
                err(format!(
                    "no sample field recognized by any of the header variants [{}]",
                    self.variant_names().join(", ")
                ))
            })?;

        Ok(ReadHeader {
            instrument: fields[0].to_string(),
            run_id,
            flow_cell: fields[2].to_string(),
            lane,
            tile,
            x,
            y,
            pair,
            failed_filter: fields[8] == "Y",
            control_bits,
            sample,
        })
    }
}
