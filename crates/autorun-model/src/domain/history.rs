use std::collections::{BTreeMap, btree_map};

use serde::{Deserialize, Serialize};

use crate::{Outcome, RunRecord, TaskKey};

/// Most recent run record per known task, keyed by path relative to the discovery root.
///
/// Ordered so that the persisted file and the rendered report are stable across passes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History(BTreeMap<TaskKey, RunRecord>);

impl History {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&RunRecord> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Insert or replace the record of a task.
    pub fn insert(&mut self, key: impl Into<TaskKey>, record: RunRecord) -> Option<RunRecord> {
        self.0.insert(key.into(), record)
    }

    /// Keep only the tasks for which `keep` returns `true`.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str, &RunRecord) -> bool,
    {
        self.0.retain(|k, v| keep(k, v));
    }

    pub fn iter(&self) -> btree_map::Iter<'_, TaskKey, RunRecord> {
        self.0.iter()
    }

    /// Number of tasks whose last record has the given outcome.
    pub fn count(&self, outcome: Outcome) -> usize {
        self.0.values().filter(|r| r.outcome == outcome).count()
    }
}

impl Extend<(TaskKey, RunRecord)> for History {
    fn extend<I: IntoIterator<Item = (TaskKey, RunRecord)>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl FromIterator<(TaskKey, RunRecord)> for History {
    fn from_iter<I: IntoIterator<Item = (TaskKey, RunRecord)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for History {
    type Item = (TaskKey, RunRecord);
    type IntoIter = btree_map::IntoIter<TaskKey, RunRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = (&'a TaskKey, &'a RunRecord);
    type IntoIter = btree_map::Iter<'a, TaskKey, RunRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
