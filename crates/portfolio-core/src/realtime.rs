//! Realtime reconciler.
//!
//! Applies insert/update/delete deltas pushed by the remote to the local
//! cache. Delivery is at-least-once and unordered relative to local
//! mutations, so every path is idempotent. Deltas bypass the mutation gate.

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::catalog::Catalog;
use crate::error::DecodeError;
use crate::notify::ChangeReason;
use crate::project::ProjectId;
use crate::wire::RawProject;

/// A change made elsewhere, as pushed by the realtime channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeEvent {
    Inserted(RawProject),
    Updated(RawProject),
    Deleted(ProjectId),
}

/// What applying a delta did to the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaOutcome {
    Inserted(ProjectId),
    Updated(ProjectId),
    Deleted(ProjectId),
    /// Nothing changed: unknown id, missing id, or already deleted
    Ignored,
}

impl DeltaOutcome {
    pub fn is_effective(&self) -> bool {
        !matches!(self, DeltaOutcome::Ignored)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(alias = "event_type", alias = "type")]
    event_type: String,
    #[serde(default, alias = "payload", alias = "record")]
    new: Option<RawProject>,
    #[serde(default, alias = "old_record")]
    old: Option<RawProject>,
}

impl RealtimeEvent {
    /// Decode a channel envelope:
    /// `{"eventType": "INSERT" | "UPDATE" | "DELETE", "new": row, "old": {"id": ..}}`.
    /// `payload` and `record` are accepted for `new`.
    pub fn from_json(value: serde_json::Value) -> Result<Self, DecodeError> {
        let envelope: Envelope = serde_json::from_value(value)?;
        match envelope.event_type.to_ascii_uppercase().as_str() {
            "INSERT" | "INSERTED" => envelope
                .new
                .map(RealtimeEvent::Inserted)
                .ok_or(DecodeError::MissingRow("Insert")),
            "UPDATE" | "UPDATED" => envelope
                .new
                .map(RealtimeEvent::Updated)
                .ok_or(DecodeError::MissingRow("Update")),
            "DELETE" | "DELETED" => envelope
                .old
                .and_then(|r| r.id)
                .or_else(|| envelope.new.and_then(|r| r.id))
                .map(RealtimeEvent::Deleted)
                .ok_or(DecodeError::MissingId),
            _ => Err(DecodeError::UnknownEventType(envelope.event_type)),
        }
    }
}

/// Create the channel a realtime client feeds and [`Catalog::listen`] drains.
pub fn realtime_channel(
    capacity: usize,
) -> (mpsc::Sender<RealtimeEvent>, mpsc::Receiver<RealtimeEvent>) {
    mpsc::channel(capacity.max(1))
}

/// Background task applying realtime deltas. Stops on [`shutdown`](Self::shutdown),
/// on drop, or when every sender is gone.
#[derive(Debug)]
pub struct RealtimeListener {
    handle: Option<JoinHandle<()>>,
}

impl RealtimeListener {
    /// Stop listening immediately.
    pub fn shutdown(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Wait until the channel closes and every queued delta is applied.
    pub async fn finished(mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::error!("Realtime listener failed: {}", e);
                }
            }
        }
    }
}

impl Drop for RealtimeListener {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Catalog {
    /// Apply one realtime delta.
    ///
    /// Inbound rows are synchronized against the vocabulary before they are
    /// written. Effective changes emit exactly one notification; ignored
    /// deltas emit none.
    pub fn apply_delta(&self, event: RealtimeEvent) -> DeltaOutcome {
        let outcome = match event {
            RealtimeEvent::Inserted(raw) => match self.ingest(raw) {
                Some(project) => {
                    let id = project.id.clone();
                    let replaced = self.write_cache(|cache| cache.prepend(project));
                    if replaced.is_some() {
                        tracing::debug!("Realtime insert for known project {}, treated as update", id);
                        DeltaOutcome::Updated(id)
                    } else {
                        DeltaOutcome::Inserted(id)
                    }
                }
                None => DeltaOutcome::Ignored,
            },
            RealtimeEvent::Updated(raw) => match self.ingest(raw) {
                Some(project) => {
                    let id = project.id.clone();
                    let applied = self.write_cache(|cache| {
                        if cache.contains(&project.id) {
                            cache.upsert(project);
                            true
                        } else {
                            false
                        }
                    });
                    if applied {
                        DeltaOutcome::Updated(id)
                    } else {
                        // Stale reference: the row was never loaded here.
                        tracing::debug!("Ignoring realtime update for unknown project {}", id);
                        DeltaOutcome::Ignored
                    }
                }
                None => DeltaOutcome::Ignored,
            },
            RealtimeEvent::Deleted(id) => {
                if self.write_cache(|cache| cache.remove(&id)).is_some() {
                    DeltaOutcome::Deleted(id)
                } else {
                    tracing::debug!("Realtime delete for absent project {}", id);
                    DeltaOutcome::Ignored
                }
            }
        };

        if outcome.is_effective() {
            tracing::debug!("Applied realtime delta: {:?}", outcome);
            self.observers.notify(ChangeReason::Delta(outcome.clone()));
        }
        outcome
    }

    /// Spawn a task that applies every event from `events` until the
    /// channel closes. Requires a tokio runtime.
    pub fn listen(self: &Arc<Self>, mut events: mpsc::Receiver<RealtimeEvent>) -> RealtimeListener {
        let catalog = Arc::clone(self);
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                catalog.apply_delta(event);
            }
            tracing::info!("Realtime channel closed");
        });
        RealtimeListener {
            handle: Some(handle),
        }
    }
}
