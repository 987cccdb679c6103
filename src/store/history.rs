use std::cmp::Ordering;
use std::collections::hash_map::Entry as Slot;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::document::{BenchmarkData, Entry};
use crate::error::{BenchError, Result};

/// How [`BenchmarkData::append`] treats commits older than the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppendMode {
    /// Out-of-order commits are slotted into place
    #[default]
    Merge,
    /// A new commit older than every existing entry is rejected
    Strict,
}

/// Read-only, restartable view over one suite's entries in chronological
/// order.
#[derive(Debug, Clone, Copy)]
pub struct History<'a> {
    entries: &'a [Entry],
}

impl<'a> History<'a> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn as_slice(&self) -> &'a [Entry] {
        self.entries
    }

    pub fn position(&self, commit_id: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id() == commit_id)
    }

    pub fn last(&self) -> Option<&'a Entry> {
        self.entries.last()
    }

    /// Entries that come before `entry`: those ahead of it when it is part
    /// of this history, otherwise those it would be appended after.
    pub fn preceding(&self, entry: &Entry) -> &'a [Entry] {
        let end = match (self.position(entry.id()), entry.committed_at()) {
            (Some(index), _) => index,
            (None, Some(_)) => insertion_index(self.entries, entry),
            (None, None) => self.entries.len(),
        };
        &self.entries[..end]
    }
}

impl<'a> IntoIterator for History<'a> {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl BenchmarkData {
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            last_update: 0,
            repo_url: repo_url.into(),
            entries: IndexMap::new(),
        }
    }

    /// Entries of `suite`, oldest first. Unknown suites are empty.
    pub fn load(&self, suite: &str) -> History<'_> {
        History {
            entries: self.entries.get(suite).map(Vec::as_slice).unwrap_or_default(),
        }
    }

    pub fn suites(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Returns a new document with `entry` inserted into `suite`.
    ///
    /// The entry lands after every entry whose commit is not newer than it.
    /// An entry for a commit already in the suite replaces the old one.
    ///
    /// # Errors
    ///
    /// [`BenchError::InvalidEntry`] when the entry breaks an invariant, and
    /// [`BenchError::NonMonotonicRejected`] for an out-of-order commit in
    /// [`AppendMode::Strict`].
    pub fn append(&self, suite: &str, entry: Entry, mode: AppendMode) -> Result<BenchmarkData> {
        entry.validate().map_err(BenchError::InvalidEntry)?;
        let committed_at = entry.committed_at().ok_or_else(|| {
            BenchError::InvalidEntry(format!("commit {} has no timestamp", entry.id()))
        })?;

        let mut next = self.clone();
        next.last_update = next.last_update.max(entry.date);
        let entries = next.entries.entry(suite.to_string()).or_default();

        if let Some(existing) = entries.iter().position(|e| e.id() == entry.id()) {
            debug!("Replacing entry for commit {} in '{suite}'", entry.id());
            entries.remove(existing);
            let index = insertion_index(entries, &entry);
            entries.insert(index, entry);
            return Ok(next);
        }

        if mode == AppendMode::Strict && is_older_than_all(entries, committed_at) {
            return Err(BenchError::NonMonotonicRejected {
                suite: suite.to_string(),
                commit: entry.id().to_string(),
            });
        }

        let index = insertion_index(entries, &entry);
        info!(
            "Appending commit {} to '{suite}' at position {index} of {}",
            entry.id(),
            entries.len() + 1
        );
        entries.insert(index, entry);

        Ok(next)
    }

    /// Union of two documents. Associative, commutative and idempotent, so
    /// concurrent writers converge no matter the merge order.
    ///
    /// Suites of the result are sorted by name, which makes the serialized
    /// document independent of the argument order too.
    pub fn merge(&self, other: &BenchmarkData) -> BenchmarkData {
        let mut names: Vec<&str> = self.suites().chain(other.suites()).collect();
        names.sort_unstable();
        names.dedup();

        let entries = names
            .into_iter()
            .map(|suite| {
                let merged = merge_histories(
                    self.load(suite).as_slice(),
                    other.load(suite).as_slice(),
                );
                (suite.to_string(), merged)
            })
            .collect::<IndexMap<_, _>>();

        BenchmarkData {
            last_update: self.last_update.max(other.last_update),
            repo_url: self.repo_url.as_str().max(other.repo_url.as_str()).to_string(),
            entries,
        }
    }

    /// Checks every suite against the history invariants.
    ///
    /// # Errors
    ///
    /// [`BenchError::StoreCorruption`] naming the suite and the first
    /// violation found.
    pub fn validate(&self) -> Result<()> {
        for (suite, entries) in &self.entries {
            let mut ids = HashSet::new();
            for entry in entries {
                entry
                    .validate()
                    .map_err(|reason| BenchError::StoreCorruption(format!("suite '{suite}': {reason}")))?;
                if !ids.insert(entry.id()) {
                    return Err(BenchError::StoreCorruption(format!(
                        "suite '{suite}': commit {} is recorded more than once",
                        entry.id()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Union of two histories of the same suite, keyed by commit id.
///
/// When both sides hold the same commit the later ingestion wins; identical
/// ingestion dates fall back to comparing the serialized entries so the
/// choice never depends on argument order.
pub fn merge_histories(left: &[Entry], right: &[Entry]) -> Vec<Entry> {
    let mut by_id: HashMap<&str, &Entry> = HashMap::new();

    for entry in left.iter().chain(right) {
        match by_id.entry(entry.id()) {
            Slot::Occupied(mut slot) => {
                if supersedes(entry, slot.get()) {
                    slot.insert(entry);
                }
            }
            Slot::Vacant(slot) => {
                slot.insert(entry);
            }
        }
    }

    let mut merged: Vec<Entry> = by_id.into_values().cloned().collect();
    merged.sort_by(merge_order);
    merged
}

fn supersedes(candidate: &Entry, current: &Entry) -> bool {
    match candidate.date.cmp(&current.date) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => canonical(candidate) > canonical(current),
    }
}

fn canonical(entry: &Entry) -> String {
    serde_json::to_string(entry).unwrap_or_default()
}

/// Chronological position of an entry in its suite: commit time, then
/// ingestion date, then commit id. Append and merge both order by it.
fn order_key(entry: &Entry) -> (DateTime<Utc>, i64, &str) {
    let committed_at = entry.committed_at().unwrap_or(DateTime::<Utc>::MIN_UTC);
    (committed_at, entry.date, entry.id())
}

fn merge_order(a: &Entry, b: &Entry) -> Ordering {
    order_key(a).cmp(&order_key(b))
}

fn insertion_index(entries: &[Entry], entry: &Entry) -> usize {
    let key = order_key(entry);
    entries
        .iter()
        .rposition(|existing| order_key(existing) <= key)
        .map_or(0, |index| index + 1)
}

fn is_older_than_all(entries: &[Entry], committed_at: DateTime<Utc>) -> bool {
    !entries.is_empty()
        && entries
            .iter()
            .filter_map(Entry::committed_at)
            .all(|ts| committed_at < ts)
}
