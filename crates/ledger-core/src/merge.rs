// Snapshot merging: fold incoming batches into an accumulating dataset.

use std::collections::HashMap;
use std::hash::Hash;

use crate::contest::{Contest, ContestId, ContestListing};

/// A record with an identity key used for deduplication.
pub trait Keyed {
    type Key: Eq + Hash + Clone;

    fn key(&self) -> Self::Key;
}

impl Keyed for Contest {
    type Key = ContestId;

    fn key(&self) -> ContestId {
        self.contest_id.clone()
    }
}

impl Keyed for ContestListing {
    type Key = ContestId;

    fn key(&self) -> ContestId {
        self.contest_id.clone()
    }
}

/// Concatenate `existing` and `incoming`, then keep only the last occurrence
/// of every key.
///
/// Surviving records keep the relative order of their last occurrence, so an
/// incoming record always overrides history and merging the same batch
/// twice is the same as merging it once.
pub fn merge<T: Keyed>(existing: Vec<T>, incoming: Vec<T>) -> Vec<T> {
    let combined: Vec<T> = existing.into_iter().chain(incoming).collect();

    let mut last_index: HashMap<T::Key, usize> = HashMap::with_capacity(combined.len());
    for (i, record) in combined.iter().enumerate() {
        last_index.insert(record.key(), i);
    }

    combined
        .into_iter()
        .enumerate()
        .filter(|(i, record)| last_index.get(&record.key()) == Some(i))
        .map(|(_, record)| record)
        .collect()
}

/// Fold a sequence of batches into `base`, in order. Later batches win.
pub fn fold_batches<T, I>(base: Vec<T>, batches: I) -> Vec<T>
where
    T: Keyed,
    I: IntoIterator<Item = Vec<T>>,
{
    batches.into_iter().fold(base, merge)
}
