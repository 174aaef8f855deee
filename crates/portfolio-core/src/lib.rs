//! Portfolio Core - catalog synchronization engine
//!
//! Keeps a local cache of portfolio projects consistent with a remote
//! collection:
//!
//! - **Project**: the entity, its draft and patch forms, and the wire rows
//! - **Cache**: id-keyed local store, the single local source of truth
//! - **Ordering**: pinned/newest default order and per-partition manual order
//! - **Realtime**: idempotent application of pushed insert/update/delete deltas
//! - **Catalog**: single-flight mutation coordinator with optimistic updates,
//!   snapshot revert, and full reload after every confirmed mutation
//! - **Stats**: counts derived from the cache on demand
//!
//! Tag synchronization lives in `portfolio-tags` and runs on every path
//! that reads or writes tags.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod memory;
pub mod notify;
pub mod ordering;
pub mod project;
pub mod realtime;
pub mod remote;
pub mod stats;
pub mod wire;

pub use cache::LocalCache;
pub use catalog::{Catalog, MutationPhase};
pub use config::CatalogConfig;
pub use error::{CatalogError, ConfigError, DecodeError, RemoteError, Result};
pub use memory::{InMemoryCollection, Operation};
pub use notify::{CacheChange, ChangeReason, Observers, SubscriptionId};
pub use ordering::{default_cmp, filter_by_partition, order, ManualOrder, OverlayError, ALL_PARTITION};
pub use project::{Project, ProjectDraft, ProjectId, ProjectPatch, ServiceType, Size};
pub use realtime::{realtime_channel, DeltaOutcome, RealtimeEvent, RealtimeListener};
pub use remote::{DeleteAck, RemoteCollection};
pub use stats::CatalogStats;
pub use wire::{InsertReceipt, RawPatch, RawProject};
