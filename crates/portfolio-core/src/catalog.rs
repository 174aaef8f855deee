//! The catalog context and mutation coordinator.
//!
//! Mutation state machine:
//! ```text
//! Idle → Mutating → Reconciling        → Idle
//!                 → RevertingAndFailed → Idle
//! ```
//!
//! At most one local mutation runs at a time; a second request while one is
//! in flight fails with [`CatalogError::MutationInProgress`]. Every confirmed
//! mutation ends with a full reload, which is the authority of last resort.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use portfolio_tags::TagVocabulary;

use crate::cache::LocalCache;
use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};
use crate::notify::{CacheChange, ChangeReason, Observers, SubscriptionId};
use crate::ordering::{filter_by_partition, order, ManualOrder};
use crate::project::{Project, ProjectDraft, ProjectId, ProjectPatch};
use crate::remote::{DeleteAck, RemoteCollection};
use crate::stats::CatalogStats;
use crate::wire::{RawPatch, RawProject};

/// Where the mutation coordinator is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MutationPhase {
    /// No mutation in flight
    #[default]
    Idle,
    /// Waiting on the remote insert/update/delete
    Mutating,
    /// The remote confirmed; reloading
    Reconciling,
    /// The remote failed; restoring the snapshot and reporting
    RevertingAndFailed,
}

impl MutationPhase {
    /// Check if a phase transition is valid
    pub fn can_transition_to(&self, target: &MutationPhase) -> bool {
        matches!(
            (self, target),
            (MutationPhase::Idle, MutationPhase::Mutating)
                | (MutationPhase::Mutating, MutationPhase::Reconciling)
                | (MutationPhase::Mutating, MutationPhase::RevertingAndFailed)
                | (MutationPhase::Reconciling, MutationPhase::Idle)
                | (MutationPhase::RevertingAndFailed, MutationPhase::Idle)
        )
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, MutationPhase::Idle)
    }
}

impl std::fmt::Display for MutationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationPhase::Idle => write!(f, "IDLE"),
            MutationPhase::Mutating => write!(f, "MUTATING"),
            MutationPhase::Reconciling => write!(f, "RECONCILING"),
            MutationPhase::RevertingAndFailed => write!(f, "REVERTING"),
        }
    }
}

/// Single-flight gate. Holding one means the phase is not `Idle`.
///
/// Dropping it resets the phase to `Idle` unconditionally. That reset is not
/// a phase transition: it also covers early exits (unknown id, validation)
/// taken while still `Mutating`.
struct MutationGuard<'a> {
    phase: &'a Mutex<MutationPhase>,
}

impl<'a> MutationGuard<'a> {
    fn enter(phase: &'a Mutex<MutationPhase>) -> Result<Self> {
        let mut current = phase.lock().unwrap_or_else(PoisonError::into_inner);
        if !current.is_idle() {
            return Err(CatalogError::MutationInProgress);
        }
        *current = MutationPhase::Mutating;
        Ok(Self { phase })
    }

    fn advance(&self, next: MutationPhase) {
        let mut current = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if current.can_transition_to(&next) {
            *current = next;
        } else {
            tracing::warn!("Ignoring invalid mutation phase transition {} -> {}", *current, next);
        }
    }
}

impl Drop for MutationGuard<'_> {
    fn drop(&mut self) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = MutationPhase::Idle;
    }
}

/// Cache change to apply when the post-mutation reload fails.
enum Fallback {
    Upsert(Project),
    Remove(ProjectId),
}

/// The catalog: local cache, manual order overlay, subscribers, and the
/// coordinator driving mutations against the remote collection.
///
/// Construct once and share as `Arc<Catalog>`.
pub struct Catalog {
    remote: Arc<dyn RemoteCollection>,
    vocabulary: Arc<dyn TagVocabulary>,
    config: CatalogConfig,
    cache: RwLock<LocalCache>,
    overlay: RwLock<ManualOrder>,
    pub(crate) observers: Observers,
    phase: Mutex<MutationPhase>,
    last_reload: RwLock<Option<DateTime<Utc>>>,
    /// Tickets handed to reloads before they call `list`
    reload_issued: AtomicU64,
    /// Ticket of the newest reload written to the cache
    reload_applied: AtomicU64,
}

impl Catalog {
    /// Create a catalog. The cache starts empty; call [`refresh`](Self::refresh)
    /// for the initial load.
    ///
    /// When `manual_order_path` is configured the overlay is loaded from it;
    /// an unreadable overlay is logged and replaced by an empty one.
    pub fn new(
        remote: Arc<dyn RemoteCollection>,
        vocabulary: Arc<dyn TagVocabulary>,
        config: CatalogConfig,
    ) -> Self {
        let overlay = match &config.manual_order_path {
            Some(path) => ManualOrder::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load manual order from {:?}: {}, starting empty", path, e);
                ManualOrder::new()
            }),
            None => ManualOrder::new(),
        };
        if !vocabulary.contains(&config.default_category) {
            tracing::warn!(
                "Default category {:?} is not in the tag vocabulary",
                config.default_category
            );
        }

        Self {
            remote,
            vocabulary,
            config,
            cache: RwLock::new(LocalCache::new()),
            overlay: RwLock::new(overlay),
            observers: Observers::new(),
            phase: Mutex::new(MutationPhase::Idle),
            last_reload: RwLock::new(None),
            reload_issued: AtomicU64::new(0),
            reload_applied: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Current phase of the mutation coordinator.
    pub fn phase(&self) -> MutationPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ==================== Reads ====================

    /// Snapshot of every cached project, in cache order.
    pub fn get_all(&self) -> Vec<Project> {
        self.read_cache(|cache| cache.get_all())
    }

    pub fn get_by_id(&self, id: &ProjectId) -> Option<Project> {
        self.read_cache(|cache| cache.get_by_id(id).cloned())
    }

    /// Projects in partition `key`, in display order.
    pub fn get_by_partition(&self, key: &str) -> Vec<Project> {
        let items = filter_by_partition(self.get_all(), key);
        let overlay = self.overlay.read().unwrap_or_else(PoisonError::into_inner);
        order(items, overlay.get(key))
    }

    pub fn get_stats(&self) -> CatalogStats {
        let last_reload = *self.last_reload.read().unwrap_or_else(PoisonError::into_inner);
        self.read_cache(|cache| CatalogStats::compute(cache.iter(), last_reload))
    }

    // ==================== Manual order ====================

    /// Replace the manual order of a partition wholesale.
    pub fn set_manual_order(&self, key: &str, ids: Vec<ProjectId>) {
        let snapshot = {
            let mut overlay = self.overlay.write().unwrap_or_else(PoisonError::into_inner);
            overlay.set(key, ids);
            overlay.clone()
        };
        tracing::debug!("Manual order set for partition {:?}", key);
        self.persist_overlay(&snapshot);
    }

    /// Drop the manual order of a partition. Returns whether one existed.
    pub fn clear_manual_order(&self, key: &str) -> bool {
        let (removed, snapshot) = {
            let mut overlay = self.overlay.write().unwrap_or_else(PoisonError::into_inner);
            let removed = overlay.clear(key);
            (removed, overlay.clone())
        };
        if removed {
            self.persist_overlay(&snapshot);
        }
        removed
    }

    pub fn manual_order(&self, key: &str) -> Option<Vec<ProjectId>> {
        self.overlay
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(<[ProjectId]>::to_vec)
    }

    fn persist_overlay(&self, overlay: &ManualOrder) {
        let Some(path) = self.config.manual_order_path.as_ref() else {
            return;
        };
        if let Err(e) = overlay.save(path) {
            tracing::warn!("Failed to save manual order to {:?}: {}", path, e);
        }
    }

    pub fn manual_order_path(&self) -> Option<&PathBuf> {
        self.config.manual_order_path.as_ref()
    }

    // ==================== Subscriptions ====================

    /// Register a callback run after every cache change.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&CacheChange) + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    // ==================== Reload ====================

    /// Replace the cache with the remote's full collection.
    ///
    /// Not subject to the mutation gate. Returns the number of cached projects.
    ///
    /// A reload whose snapshot is older than one already applied is discarded,
    /// so a slow refresh never overwrites the result of a later reconcile.
    pub async fn refresh(&self) -> Result<usize> {
        self.reload().await
    }

    async fn reload(&self) -> Result<usize> {
        let ticket = self.reload_issued.fetch_add(1, Ordering::SeqCst) + 1;
        let rows = self.remote.list().await?;
        let received = rows.len();
        let projects: Vec<Project> = rows.into_iter().filter_map(|raw| self.ingest(raw)).collect();
        let ingested = projects.len();

        let kept = self.write_cache(|cache| {
            if ticket <= self.reload_applied.load(Ordering::SeqCst) {
                return None;
            }
            self.reload_applied.store(ticket, Ordering::SeqCst);
            Some(cache.replace_all(projects))
        });
        let Some(kept) = kept else {
            tracing::debug!("Discarding reload {}: a newer reload is already applied", ticket);
            return Ok(self.read_cache(LocalCache::len));
        };
        *self.last_reload.write().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());

        if kept < ingested {
            tracing::debug!("Reload collapsed {} duplicate rows", ingested - kept);
        }
        tracing::info!("Reloaded {} projects ({} rows received)", kept, received);
        self.observers.notify(ChangeReason::Reloaded);
        Ok(kept)
    }

    /// Reload after a confirmed mutation, falling back to a point change
    /// when the reload itself fails.
    async fn reconcile(&self, fallback: Fallback) {
        let Err(e) = self.reload().await else {
            return;
        };
        tracing::warn!("Reload after mutation failed: {}, applying confirmed change directly", e);
        let id = match fallback {
            Fallback::Upsert(project) => {
                let id = project.id.clone();
                self.write_cache(|cache| cache.upsert(project));
                id
            }
            Fallback::Remove(id) => {
                self.write_cache(|cache| cache.remove(&id));
                id
            }
        };
        self.observers.notify(ChangeReason::PointReconciled(id));
    }

    // ==================== Mutations ====================

    /// Persist a new project.
    ///
    /// Nothing is written to the cache until the remote has assigned an id;
    /// the returned project reflects the reloaded cache.
    pub async fn add(&self, draft: ProjectDraft) -> Result<Project> {
        draft.validate()?;
        let guard = MutationGuard::enter(&self.phase)?;

        let mut draft = draft;
        draft.normalize_classification(self.vocabulary.as_ref(), &self.config.default_category);

        let receipt = match self.remote.insert(RawProject::from_draft(&draft)).await {
            Ok(receipt) => receipt,
            Err(e) => {
                guard.advance(MutationPhase::RevertingAndFailed);
                tracing::warn!("Insert of {:?} failed: {}", draft.business_name, e);
                return Err(e.into());
            }
        };

        let project = draft.into_project(receipt);
        let id = project.id.clone();
        guard.advance(MutationPhase::Reconciling);
        self.reconcile(Fallback::Upsert(project.clone())).await;
        tracing::info!("Added project {}", id);
        Ok(self.get_by_id(&id).unwrap_or(project))
    }

    /// Update a cached project.
    ///
    /// The patched value is written to the cache before the remote call and
    /// restored from a by-value snapshot if the call fails.
    pub async fn update(&self, id: &ProjectId, patch: ProjectPatch) -> Result<Project> {
        self.update_with(id, |_| patch).await
    }

    /// Flip the `pinned` flag of a cached project.
    pub async fn toggle_pinned(&self, id: &ProjectId) -> Result<Project> {
        self.update_with(id, |current| ProjectPatch::pinned(!current.pinned))
            .await
    }

    /// Update path shared by [`update`](Self::update) and
    /// [`toggle_pinned`](Self::toggle_pinned). `build` sees the cached value
    /// as read inside the gate.
    async fn update_with(
        &self,
        id: &ProjectId,
        build: impl FnOnce(&Project) -> ProjectPatch,
    ) -> Result<Project> {
        let guard = MutationGuard::enter(&self.phase)?;

        let snapshot = self
            .get_by_id(id)
            .ok_or_else(|| CatalogError::NotFound(id.clone()))?;
        let patch = build(&snapshot);
        let mut next = patch.apply(&snapshot);
        if patch.touches_classification() {
            next.normalize_classification(self.vocabulary.as_ref(), &self.config.default_category);
        }
        next.validate()?;

        self.write_cache(|cache| cache.upsert(next.clone()));
        self.observers.notify(ChangeReason::Optimistic(id.clone()));

        match self.remote.update(id, RawPatch::from_patch(&patch, &next)).await {
            Ok(()) => {
                guard.advance(MutationPhase::Reconciling);
                self.reconcile(Fallback::Upsert(next.clone())).await;
                tracing::info!("Updated project {}", id);
                Ok(self.get_by_id(id).unwrap_or(next))
            }
            Err(e) => {
                guard.advance(MutationPhase::RevertingAndFailed);
                tracing::warn!("Update of project {} failed: {}, reverting", id, e);
                self.write_cache(|cache| cache.upsert(snapshot));
                self.observers.notify(ChangeReason::Reverted(id.clone()));
                Err(e.into())
            }
        }
    }

    /// Delete a project.
    ///
    /// The cache is only touched once the remote acknowledges the delete in
    /// one of the shapes listed by [`DeleteAck`].
    pub async fn delete(&self, id: &ProjectId) -> Result<()> {
        let guard = MutationGuard::enter(&self.phase)?;

        let response = match self.remote.delete(id).await {
            Ok(response) => response,
            Err(e) => {
                guard.advance(MutationPhase::RevertingAndFailed);
                tracing::warn!("Delete of project {} failed: {}", id, e);
                return Err(e.into());
            }
        };

        let Some(shape) = DeleteAck::decode(&response, id) else {
            guard.advance(MutationPhase::RevertingAndFailed);
            tracing::warn!("Delete of project {} not acknowledged: {}", id, response);
            return Err(CatalogError::DeleteNotAcknowledged(id.clone()));
        };

        tracing::debug!("Delete of project {} acknowledged as {:?}", id, shape);
        guard.advance(MutationPhase::Reconciling);
        self.reconcile(Fallback::Remove(id.clone())).await;
        tracing::info!("Deleted project {}", id);
        Ok(())
    }

    // ==================== Internals ====================

    /// Convert an inbound row, synchronizing its tags.
    pub(crate) fn ingest(&self, raw: RawProject) -> Option<Project> {
        raw.ingest(self.vocabulary.as_ref(), &self.config.default_category)
    }

    fn read_cache<R>(&self, f: impl FnOnce(&LocalCache) -> R) -> R {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        f(&cache)
    }

    /// Run `f` under the cache write lock. Notify only after this returns.
    pub(crate) fn write_cache<R>(&self, f: impl FnOnce(&mut LocalCache) -> R) -> R {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut cache)
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("config", &self.config)
            .field("phase", &self.phase())
            .field("projects", &self.read_cache(|cache| cache.len()))
            .field("observers", &self.observers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_transitions() {
        let idle = MutationPhase::Idle;
        assert!(idle.can_transition_to(&MutationPhase::Mutating));
        assert!(!idle.can_transition_to(&MutationPhase::Reconciling));

        let mutating = MutationPhase::Mutating;
        assert!(mutating.can_transition_to(&MutationPhase::Reconciling));
        assert!(mutating.can_transition_to(&MutationPhase::RevertingAndFailed));
        assert!(!mutating.can_transition_to(&MutationPhase::Mutating));
        assert!(!mutating.can_transition_to(&MutationPhase::Idle));

        assert!(MutationPhase::Reconciling.can_transition_to(&MutationPhase::Idle));
        assert!(MutationPhase::RevertingAndFailed.can_transition_to(&MutationPhase::Idle));
        assert!(!MutationPhase::Reconciling.can_transition_to(&MutationPhase::RevertingAndFailed));
    }

    #[test]
    fn guard_rejects_second_entry_and_releases_on_drop() {
        let phase = Mutex::new(MutationPhase::Idle);
        {
            let guard = MutationGuard::enter(&phase).unwrap();
            assert!(matches!(
                MutationGuard::enter(&phase),
                Err(CatalogError::MutationInProgress)
            ));
            guard.advance(MutationPhase::Reconciling);
            assert_eq!(*phase.lock().unwrap(), MutationPhase::Reconciling);
        }
        assert_eq!(*phase.lock().unwrap(), MutationPhase::Idle);
        assert!(MutationGuard::enter(&phase).is_ok());
    }

    #[test]
    fn guard_drop_resets_from_mutating() {
        let phase = Mutex::new(MutationPhase::Idle);
        {
            let _guard = MutationGuard::enter(&phase).unwrap();
            assert_eq!(*phase.lock().unwrap(), MutationPhase::Mutating);
        }
        assert_eq!(*phase.lock().unwrap(), MutationPhase::Idle);
    }

    #[test]
    fn phase_display() {
        assert_eq!(MutationPhase::RevertingAndFailed.to_string(), "REVERTING");
        assert_eq!(MutationPhase::default(), MutationPhase::Idle);
    }
}
