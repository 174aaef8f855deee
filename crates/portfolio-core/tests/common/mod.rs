//! Shared fixtures for catalog integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use portfolio_core::{
    CacheChange, Catalog, CatalogConfig, InMemoryCollection, InsertReceipt, ProjectId, RawPatch,
    RawProject, RemoteCollection, RemoteError,
};
use portfolio_tags::StaticVocabulary;
use serde_json::Value;
use tokio::sync::Notify;

pub const VOCABULARY: [&str; 5] = ["restaurants", "retail", "gyms", "salons", "other"];

pub fn vocabulary() -> Arc<StaticVocabulary> {
    Arc::new(StaticVocabulary::new(VOCABULARY))
}

pub fn row(id: i64, name: &str, tags: &[&str], created_at: &str) -> RawProject {
    RawProject {
        id: Some(ProjectId::from(id)),
        business_name: Some(name.to_string()),
        business_type: Some("Local business".to_string()),
        service_type: Some("images".to_string()),
        image_after: Some(format!("{id}-after.jpg")),
        tags: Some(tags.iter().map(|t| t.to_string()).collect()),
        created_at: Some(created_at.to_string()),
        ..Default::default()
    }
}

pub fn id(n: i64) -> ProjectId {
    ProjectId::from(n)
}

pub fn ids(projects: &[portfolio_core::Project]) -> Vec<i64> {
    projects.iter().filter_map(|p| p.id.as_i64()).collect()
}

/// A catalog over an in-memory remote, already loaded.
pub async fn loaded_catalog(rows: Vec<RawProject>) -> (Arc<Catalog>, Arc<InMemoryCollection>) {
    let remote = Arc::new(InMemoryCollection::with_rows(rows));
    let catalog = Arc::new(Catalog::new(
        remote.clone(),
        vocabulary(),
        CatalogConfig::default(),
    ));
    catalog.refresh().await.expect("initial load");
    (catalog, remote)
}

/// Records every notification a catalog emits.
pub fn record_changes(catalog: &Catalog) -> Arc<Mutex<Vec<CacheChange>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    catalog.subscribe(move |change| sink.lock().unwrap().push(change.clone()));
    seen
}

/// Wraps an in-memory remote and can park calls until released, so a
/// mutation or reload can be observed while it is in flight.
pub struct HeldRemote {
    pub inner: InMemoryCollection,
    hold: AtomicBool,
    hold_list: AtomicBool,
    pub entered: Notify,
    pub release: Notify,
}

impl HeldRemote {
    pub fn new(rows: Vec<RawProject>) -> Self {
        Self {
            inner: InMemoryCollection::with_rows(rows),
            hold: AtomicBool::new(false),
            hold_list: AtomicBool::new(false),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    /// Park the next mutating calls until `release` is notified.
    pub fn hold_mutations(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    /// Park the next `list` after it has taken its snapshot.
    pub fn hold_next_list(&self) {
        self.hold_list.store(true, Ordering::SeqCst);
    }

    async fn gate(&self) {
        Self::park(&self.hold, &self.entered, &self.release).await;
    }

    async fn park(flag: &AtomicBool, entered: &Notify, release: &Notify) {
        if flag.swap(false, Ordering::SeqCst) {
            entered.notify_one();
            release.notified().await;
        }
    }
}

#[async_trait]
impl RemoteCollection for HeldRemote {
    async fn list(&self) -> Result<Vec<RawProject>, RemoteError> {
        let rows = self.inner.list().await?;
        Self::park(&self.hold_list, &self.entered, &self.release).await;
        Ok(rows)
    }

    async fn insert(&self, row: RawProject) -> Result<InsertReceipt, RemoteError> {
        self.gate().await;
        self.inner.insert(row).await
    }

    async fn update(&self, id: &ProjectId, patch: RawPatch) -> Result<(), RemoteError> {
        self.gate().await;
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: &ProjectId) -> Result<Value, RemoteError> {
        self.gate().await;
        self.inner.delete(id).await
    }
}
