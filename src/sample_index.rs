//! Mapping between the dense sample index embedded in read headers and
//! durable sample ids. Index 0 is reserved for control and unassigned reads.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::model::SampleId;

/// Index used by the instrument for control and unassigned reads.
pub const CONTROL_INDEX: u32 = 0;

/// The sample a read was assigned to. Control reads have no durable id.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SampleKey {
    Control,
    Sample(SampleId),
}

impl SampleKey {
    pub fn sample_id(&self) -> Option<SampleId> {
        match self {
            SampleKey::Control => None,
            SampleKey::Sample(id) => Some(*id),
        }
    }
}

impl fmt::Display for SampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleKey::Control => write!(f, "Control"),
            SampleKey::Sample(id) => write!(f, "{}", id),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SampleIndexMap {
    index_to_id: BTreeMap<u32, SampleId>,
    id_to_index: BTreeMap<SampleId, u32>,
}

impl SampleIndexMap {
    pub fn new() -> SampleIndexMap {
        SampleIndexMap::default()
    }

    /// Build a map from `(index, sample id)` pairs. Index 0 is skipped, it
    /// always resolves to `SampleKey::Control`.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u32, SampleId)>) -> SampleIndexMap {
        let mut map = SampleIndexMap::new();
        for (index, id) in pairs {
            map.insert(index, id);
        }
        map
    }

    pub fn insert(&mut self, index: u32, id: SampleId) {
        if index == CONTROL_INDEX {
            return;
        }
        self.index_to_id.insert(index, id);
        self.id_to_index.insert(id, index);
    }

    /// Resolve a header sample index. `None` means the index is unknown.
    pub fn sample_key(&self, index: u32) -> Option<SampleKey> {
        if index == CONTROL_INDEX {
            return Some(SampleKey::Control);
        }
        self.index_to_id.get(&index).map(|id| SampleKey::Sample(*id))
    }

    /// Resolve a durable sample id back to its header index.
    pub fn index_of(&self, id: SampleId) -> Option<u32> {
        self.id_to_index.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.index_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_to_id.is_empty()
    }

    /// Render the map contents for error messages, e.g. `{1: 101, 2: 102}`.
    pub fn describe(&self) -> String {
        format!(
            "{{{}}}",
            self.index_to_id
                .iter()
                .map(|(idx, id)| format!("{}: {}", idx, id))
                .join(", ")
        )
    }
}
