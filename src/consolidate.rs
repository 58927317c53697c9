// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Analyst edits of a finished analysis: combining several live matches of
//! one sample into a single match with a chosen allele set, and removing
//! matches from the result view. Superseded rows are kept for auditing.

use anyhow::Error;
use itertools::Itertools;
use log::info;
use std::collections::BTreeSet;

use crate::error::GenotypingError;
use crate::model::{
    AlleleJunction, AnalysisId, Match, MatchId, MatchParent, MatchStats, ReadJunction, SequenceId,
};
use crate::store::{Store, Tables};

/// Sum the counts and percents of `matches` and take the read-weighted mean
/// of their average lengths. Zero total reads gives an average length of 0.
pub fn aggregate_stats(matches: &[Match]) -> MatchStats {
    let mut total = MatchStats::default();
    let mut weighted_length = 0.0;

    for m in matches {
        let s = &m.stats;
        total.reads += s.reads;
        total.percent += s.percent;
        total.pos_reads += s.pos_reads;
        total.neg_reads += s.neg_reads;
        total.pos_ext_reads += s.pos_ext_reads;
        total.neg_ext_reads += s.neg_ext_reads;
        weighted_length += s.reads as f64 * s.average_length;
    }

    if total.reads != 0 {
        total.average_length = weighted_length / total.reads as f64;
    }
    total
}

/// Fetch the live matches named by `match_ids`, failing if the selection is
/// empty or any of them is missing or already superseded.
fn select_live(
    tables: &dyn Tables,
    analysis: AnalysisId,
    match_ids: &[MatchId],
) -> Result<Vec<Match>, GenotypingError> {
    if match_ids.is_empty() {
        return Err(GenotypingError::EmptySelection { what: "matches" });
    }

    let matches = tables.live_matches(analysis, match_ids);
    if matches.len() != match_ids.len() {
        return Err(GenotypingError::StaleSelection {
            analysis,
            requested: match_ids.len(),
            found: matches.len(),
        });
    }
    Ok(matches)
}

fn combine_in(
    tables: &mut dyn Tables,
    analysis: AnalysisId,
    match_ids: &[MatchId],
    allele_ids: &[SequenceId],
) -> Result<MatchId, GenotypingError> {
    if match_ids.is_empty() {
        return Err(GenotypingError::EmptySelection { what: "matches" });
    }
    if allele_ids.is_empty() {
        return Err(GenotypingError::EmptySelection { what: "alleles" });
    }
    let matches = select_live(tables, analysis, match_ids)?;

    let samples: BTreeSet<_> = matches.iter().map(|m| m.sample).collect();
    if samples.len() != 1 {
        return Err(GenotypingError::CrossSample {
            samples: samples.into_iter().collect(),
        });
    }
    let sample = matches[0].sample;

    let owned: BTreeSet<SequenceId> = tables
        .allele_junctions(match_ids)
        .into_iter()
        .map(|j| j.sequence)
        .collect();
    if let Some(&allele) = allele_ids.iter().find(|a| !owned.contains(a)) {
        return Err(GenotypingError::UnownedAllele { allele });
    }

    let stats = aggregate_stats(&matches);
    let combined = tables.insert_match(analysis, sample, stats);

    let reads: BTreeSet<_> = tables
        .read_junctions(match_ids)
        .into_iter()
        .map(|j| j.read)
        .collect();
    for read in reads {
        tables.insert_read_junction(ReadJunction {
            match_id: combined,
            read,
        });
    }

    for &sequence in allele_ids.iter().unique() {
        tables.insert_allele_junction(AlleleJunction {
            analysis,
            match_id: combined,
            sequence,
        });
    }

    let updated = tables.set_parent(match_ids, MatchParent::Combined(combined));
    if updated != match_ids.len() {
        return Err(GenotypingError::ConcurrentModification {
            expected: match_ids.len(),
            updated,
        });
    }

    Ok(combined)
}

/// Replace the live matches `match_ids` of one sample with a single new
/// match carrying `allele_ids`. Runs in one transaction; on any error the
/// store is left unchanged.
pub fn combine_matches<S: Store>(
    store: &S,
    analysis: AnalysisId,
    match_ids: &[MatchId],
    allele_ids: &[SequenceId],
) -> Result<MatchId, Error> {
    let combined =
        store.transaction(|t| Ok(combine_in(t, analysis, match_ids, allele_ids)?))?;
    info!(
        "Combined matches [{}] of analysis {} into match {}",
        match_ids.iter().join(", "),
        analysis,
        combined
    );
    Ok(combined)
}

/// Remove the live matches `match_ids` from the analysis result view.
/// Returns the number of matches removed.
pub fn delete_matches<S: Store>(
    store: &S,
    analysis: AnalysisId,
    match_ids: &[MatchId],
) -> Result<usize, Error> {
    let removed = store.transaction(|t| {
        select_live(t, analysis, match_ids)?;
        let updated = t.set_parent(match_ids, MatchParent::Removed);
        if updated != match_ids.len() {
            return Err(GenotypingError::ConcurrentModification {
                expected: match_ids.len(),
                updated,
            }
            .into());
        }
        Ok(updated)
    })?;
    info!("Removed {} matches from analysis {}", removed, analysis);
    Ok(removed)
}
