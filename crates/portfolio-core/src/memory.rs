//! In-memory remote collection.
//!
//! Behaves like a small hosted table: sequential integer ids, server-side
//! timestamps and defaults, one-shot failure injection per operation.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::error::RemoteError;
use crate::project::ProjectId;
use crate::remote::RemoteCollection;
use crate::wire::{format_timestamp, InsertReceipt, RawPatch, RawProject};

/// Remote operations, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Insert,
    Update,
    Delete,
}

#[derive(Debug)]
struct MemoryState {
    rows: Vec<RawProject>,
    next_id: i64,
    delete_response: Value,
    failures: HashMap<Operation, RemoteError>,
    calls: HashMap<Operation, usize>,
}

/// A [`RemoteCollection`] kept in process memory.
#[derive(Debug)]
pub struct InMemoryCollection {
    state: Mutex<MemoryState>,
}

impl InMemoryCollection {
    pub fn new() -> Self {
        Self::with_rows(Vec::new())
    }

    /// Seed the collection. Ids continue after the highest integer id seen.
    pub fn with_rows(rows: Vec<RawProject>) -> Self {
        let next_id = rows
            .iter()
            .filter_map(|r| r.id.as_ref().and_then(ProjectId::as_i64))
            .max()
            .unwrap_or(0)
            + 1;
        Self {
            state: Mutex::new(MemoryState {
                rows,
                next_id,
                delete_response: Value::Bool(true),
                failures: HashMap::new(),
                calls: HashMap::new(),
            }),
        }
    }

    /// Make the next call of `op` fail with `error`.
    pub fn fail_next(&self, op: Operation, error: RemoteError) {
        self.state().failures.insert(op, error);
    }

    /// Body returned by successful deletes (default `true`).
    pub fn set_delete_response(&self, response: Value) {
        self.state().delete_response = response;
    }

    /// Add or replace a row directly, bypassing the client path (a write
    /// made by someone else).
    pub fn put_row(&self, row: RawProject) {
        let mut state = self.state();
        match state.rows.iter_mut().find(|r| r.id == row.id) {
            Some(existing) => *existing = row,
            None => state.rows.push(row),
        }
    }

    pub fn rows(&self) -> Vec<RawProject> {
        self.state().rows.clone()
    }

    /// How many times `op` has been called, failures included.
    pub fn calls(&self, op: Operation) -> usize {
        self.state().calls.get(&op).copied().unwrap_or(0)
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, op: Operation) -> Result<MutexGuard<'_, MemoryState>, RemoteError> {
        let mut state = self.state();
        *state.calls.entry(op).or_insert(0) += 1;
        let failure = state.failures.remove(&op);
        match failure {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }
}

impl Default for InMemoryCollection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteCollection for InMemoryCollection {
    async fn list(&self) -> Result<Vec<RawProject>, RemoteError> {
        let state = self.begin(Operation::List)?;
        Ok(state.rows.clone())
    }

    async fn insert(&self, mut row: RawProject) -> Result<InsertReceipt, RemoteError> {
        let mut state = self.begin(Operation::Insert)?;
        if row.business_name.as_deref().map_or(true, |n| n.trim().is_empty()) {
            return Err(RemoteError::Rejected {
                status: 422,
                message: "businessName is required".into(),
            });
        }

        let id = ProjectId::from(state.next_id);
        state.next_id += 1;
        let created_at = Utc::now();

        row.id = Some(id.clone());
        row.created_at = Some(format_timestamp(&created_at));
        row.size.get_or_insert_with(|| "medium".to_string());
        row.pinned.get_or_insert(false);
        state.rows.push(row);

        Ok(InsertReceipt {
            id,
            created_at: Some(created_at),
        })
    }

    async fn update(&self, id: &ProjectId, patch: RawPatch) -> Result<(), RemoteError> {
        let mut state = self.begin(Operation::Update)?;
        let row = state
            .rows
            .iter_mut()
            .find(|r| r.id.as_ref() == Some(id))
            .ok_or_else(|| RemoteError::Rejected {
                status: 404,
                message: format!("no project with id {id}"),
            })?;
        row.merge_patch(&patch);
        Ok(())
    }

    async fn delete(&self, id: &ProjectId) -> Result<Value, RemoteError> {
        let mut state = self.begin(Operation::Delete)?;
        let before = state.rows.len();
        state.rows.retain(|r| r.id.as_ref() != Some(id));
        if state.rows.len() == before {
            return Ok(Value::Array(Vec::new()));
        }
        Ok(state.delete_response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, name: &str) -> RawProject {
        RawProject {
            id: Some(ProjectId::from(id)),
            business_name: Some(name.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn insert_assigns_sequential_ids() {
        let remote = InMemoryCollection::with_rows(vec![row(4, "a")]);
        let receipt = remote
            .insert(RawProject {
                business_name: Some("b".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(receipt.id, ProjectId::from(5));
        assert!(receipt.created_at.is_some());

        let stored = remote.rows();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].size.as_deref(), Some("medium"));
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let remote = InMemoryCollection::with_rows(vec![row(1, "a")]);
        remote.fail_next(Operation::List, RemoteError::Timeout);
        assert_eq!(remote.list().await.unwrap_err(), RemoteError::Timeout);
        assert_eq!(remote.list().await.unwrap().len(), 1);
        assert_eq!(remote.calls(Operation::List), 2);
    }

    #[tokio::test]
    async fn update_missing_row_is_rejected() {
        let remote = InMemoryCollection::new();
        let err = remote
            .update(&ProjectId::from(1), RawPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Rejected { status: 404, .. }));
    }

    #[tokio::test]
    async fn delete_reports_configured_response() {
        let remote = InMemoryCollection::with_rows(vec![row(1, "a")]);
        remote.set_delete_response(serde_json::json!({"ok": true}));
        assert_eq!(
            remote.delete(&ProjectId::from(1)).await.unwrap(),
            serde_json::json!({"ok": true})
        );
        assert_eq!(
            remote.delete(&ProjectId::from(1)).await.unwrap(),
            serde_json::json!([])
        );
    }
}
