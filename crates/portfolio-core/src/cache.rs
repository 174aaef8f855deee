//! Local project cache.
//!
//! Keyed by id with an index into a plain `Vec`. Order inside the cache is
//! cosmetic (realtime inserts go to the front); display order is always
//! recomputed by [`crate::ordering`].

use std::collections::HashMap;

use crate::project::{Project, ProjectId};

/// In-memory store of every known project. Never holds duplicate ids.
#[derive(Debug, Default, Clone)]
pub struct LocalCache {
    entries: Vec<Project>,
    index: HashMap<ProjectId, usize>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap the whole content. Duplicate ids collapse to the last occurrence,
    /// kept at the position of the first. Returns the number of entries kept.
    pub fn replace_all(&mut self, items: Vec<Project>) -> usize {
        self.entries.clear();
        self.index.clear();
        for item in items {
            match self.index.get(&item.id) {
                Some(&idx) => self.entries[idx] = item,
                None => {
                    self.index.insert(item.id.clone(), self.entries.len());
                    self.entries.push(item);
                }
            }
        }
        self.entries.len()
    }

    /// Insert or replace by id. Returns the previous value, if any.
    pub fn upsert(&mut self, item: Project) -> Option<Project> {
        match self.index.get(&item.id) {
            Some(&idx) => Some(std::mem::replace(&mut self.entries[idx], item)),
            None => {
                self.index.insert(item.id.clone(), self.entries.len());
                self.entries.push(item);
                None
            }
        }
    }

    /// Insert at the front, or replace in place when the id is known.
    pub fn prepend(&mut self, item: Project) -> Option<Project> {
        if self.index.contains_key(&item.id) {
            return self.upsert(item);
        }
        self.entries.insert(0, item);
        self.reindex();
        None
    }

    /// Remove by id. Missing ids are a no-op.
    pub fn remove(&mut self, id: &ProjectId) -> Option<Project> {
        let idx = self.index.remove(id)?;
        let removed = self.entries.remove(idx);
        self.reindex();
        Some(removed)
    }

    pub fn get_by_id(&self, id: &ProjectId) -> Option<&Project> {
        self.index.get(id).and_then(|&idx| self.entries.get(idx))
    }

    pub fn contains(&self, id: &ProjectId) -> bool {
        self.index.contains_key(id)
    }

    /// Snapshot of the current content.
    pub fn get_all(&self) -> Vec<Project> {
        self.entries.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Project> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn reindex(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(idx, p)| (p.id.clone(), idx))
            .collect();
    }
}
