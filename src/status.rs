//! Status transitions for runs and analyses. A transition is a single
//! compare-and-set, so when several workers race to claim the same run only
//! one of them sees `true`.

use anyhow::Error;
use log::{debug, info};

use crate::model::Status;
use crate::store::{StatusEntity, Store};

/// Advance `entity` from `expected` to `update`.
///
/// Returns `false`, without modifying anything, if the current status is not
/// `expected`. Panics if `update` is not the status immediately after
/// `expected`: skipping or reversing a status is a programming error.
pub fn update_status<S: Store>(
    store: &S,
    entity: StatusEntity,
    expected: Status,
    update: Status,
) -> Result<bool, Error> {
    assert!(
        expected.successor() == Some(update),
        "Status can only advance one step: {:?} -> {:?}",
        expected,
        update
    );

    let changed = store.compare_and_set_status(entity, expected.id(), update.id())?;
    if changed {
        info!("{:?} status {:?} -> {:?}", entity, expected, update);
    } else {
        debug!("{:?} was not {:?}, status left unchanged", entity, expected);
    }
    Ok(changed)
}
