//! Checks run on a complete `DemuxPlan` before any file is renamed, and the
//! commit step that performs the renames once every check has passed.

use anyhow::{Context, Error};
use log::info;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::demux::{DemuxOutputKey, DemuxOutputs, DemuxPlan, FileSummary, PlannedRename};
use crate::error::GenotypingError;
use crate::filenames;

/// Run the pairing, collision and pre-existing target checks.
pub fn validate_plan(plan: &DemuxPlan) -> Result<(), GenotypingError> {
    check_pairing(&plan.files)?;
    check_collisions(&plan.targets)?;
    check_targets_absent(&plan.targets, plan.compress)?;
    Ok(())
}

/// Forward and reverse files of one sample must either both have reads or
/// both be empty.
pub fn check_pairing(files: &[FileSummary]) -> Result<(), GenotypingError> {
    let mut groups: BTreeMap<String, Vec<(u8, &FileSummary)>> = BTreeMap::new();
    for f in files {
        if let Some(pk) = filenames::pairing_key(&f.path) {
            groups.entry(pk.key).or_default().push((pk.read, f));
        }
    }

    for (_, mut group) in groups {
        group.sort_by_key(|(read, _)| *read);
        let empty = group.iter().find(|(_, f)| f.reads == 0);
        let full = group.iter().find(|(_, f)| f.reads > 0);

        if let (Some(&(er, e)), Some(&(fr, f))) = (empty, full) {
            let (left, right) = if er < fr { (e, f) } else { (f, e) };
            return Err(GenotypingError::PairingMismatch {
                left: left.path.clone(),
                left_reads: left.reads,
                right: right.path.clone(),
                right_reads: right.reads,
            });
        }
    }

    Ok(())
}

/// No two source files may resolve to the same output path, and each output
/// key gets exactly one source file.
pub fn check_collisions(targets: &[PlannedRename]) -> Result<(), GenotypingError> {
    let mut by_target: BTreeMap<&PathBuf, Vec<PathBuf>> = BTreeMap::new();
    let mut by_key: BTreeMap<DemuxOutputKey, (&PathBuf, Vec<PathBuf>)> = BTreeMap::new();
    for t in targets {
        by_target.entry(&t.target).or_default().push(t.source.clone());
        by_key
            .entry(t.key)
            .or_insert_with(|| (&t.target, Vec::new()))
            .1
            .push(t.source.clone());
    }

    let duplicate = by_target
        .into_iter()
        .find(|(_, sources)| sources.len() > 1)
        .or_else(|| {
            by_key
                .into_values()
                .find(|(_, sources)| sources.len() > 1)
        });

    match duplicate {
        Some((target, sources)) => Err(GenotypingError::DuplicateTarget {
            target: target.clone(),
            sources,
        }),
        None => Ok(()),
    }
}

/// None of the rename targets may exist yet. With `compress`, the gzipped
/// path of every plain output must not exist either.
pub fn check_targets_absent(
    targets: &[PlannedRename],
    compress: bool,
) -> Result<(), GenotypingError> {
    let mut existing = Vec::new();
    for t in targets {
        if t.is_move() && t.target.exists() {
            existing.push(t.target.clone());
        }
        let last = t.final_path(compress);
        if last != t.target && last.exists() {
            existing.push(last);
        }
    }

    if existing.is_empty() {
        Ok(())
    } else {
        Err(GenotypingError::TargetExists { paths: existing })
    }
}

/// Perform every planned rename. A failure part way through is reported
/// with the number of files already moved; those are not moved back.
pub fn commit(plan: &DemuxPlan) -> Result<DemuxOutputs, Error> {
    let total = plan.moves().count();

    for (done, m) in plan.moves().enumerate() {
        std::fs::rename(&m.source, &m.target).with_context(|| {
            format!(
                "error moving {:?} to {:?} ({} of {} files already moved)",
                m.source, m.target, done, total
            )
        })?;
        info!("Move of file {:?} to {:?}", m.source, m.target);
    }

    Ok(DemuxOutputs {
        outputs: plan.targets.iter().map(|t| (t.key, t.target.clone())).collect(),
        read_counts: plan.read_counts(),
        files: plan.files.clone(),
    })
}
