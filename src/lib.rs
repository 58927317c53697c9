// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Demultiplex per-run Illumina FASTQs into per-sample files and manage the
//! genotyping matches produced by analyses of those reads.
//!
//! Reads side: `read_header` parses instrument headers, `demux` classifies
//! every input file and plans the renames, `validate` checks and commits the
//! plan. Match side: `match_builder` imports an analysis export,
//! `consolidate` combines or removes matches, and `status` moves runs and
//! analyses through their lifecycle. `jobs` ties both sides to a `store`.

pub mod cascade;
pub mod config;
pub mod consolidate;
pub mod demux;
pub mod error;
pub mod filenames;
pub mod jobs;
pub mod match_builder;
pub mod model;
pub mod read_header;
pub mod sample_index;
pub mod sample_sheet;
pub mod sequences;
pub mod status;
pub mod store;
pub mod utils;
pub mod validate;

pub use crate::config::GenotypingSettings;
pub use crate::consolidate::{combine_matches, delete_matches};
pub use crate::demux::{CancelToken, DemuxOutputKey, DemuxOutputs, Demultiplexer};
pub use crate::error::GenotypingError;
pub use crate::read_header::{HeaderParser, HeaderVariant, ReadHeader, SampleTag};
pub use crate::sample_index::{SampleIndexMap, SampleKey};
pub use crate::status::update_status;
