//! Display ordering and the manual order overlay.
//!
//! Default order: pinned first, then newest `created_at`, then highest id.
//! A partition with a manual order shows its listed ids first, in list
//! order, followed by everything else in default order.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::project::{Project, ProjectId};

/// Partition key that matches every project.
pub const ALL_PARTITION: &str = "all";

/// Default comparator: pinned descending, `created_at` descending (missing
/// timestamps last), id descending.
pub fn default_cmp(a: &Project, b: &Project) -> Ordering {
    b.pinned
        .cmp(&a.pinned)
        .then_with(|| newest_first(a.created_at, b.created_at))
        .then_with(|| b.id.cmp(&a.id))
}

fn newest_first(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Order `items` for display, honouring a manual order when given.
///
/// Manual ids with no matching item are skipped; repeated manual ids count
/// once.
pub fn order(items: Vec<Project>, manual: Option<&[ProjectId]>) -> Vec<Project> {
    let Some(manual) = manual else {
        let mut items = items;
        items.sort_by(default_cmp);
        return items;
    };

    let positions: HashMap<ProjectId, usize> = items
        .iter()
        .enumerate()
        .map(|(idx, p)| (p.id.clone(), idx))
        .collect();
    let mut slots: Vec<Option<Project>> = items.into_iter().map(Some).collect();

    let mut ordered = Vec::with_capacity(slots.len());
    for id in manual {
        if let Some(item) = positions.get(id).and_then(|&idx| slots[idx].take()) {
            ordered.push(item);
        }
    }

    let mut rest: Vec<Project> = slots.into_iter().flatten().collect();
    rest.sort_by(default_cmp);
    ordered.extend(rest);
    ordered
}

/// Keep the projects in partition `key`. [`ALL_PARTITION`] keeps everything.
pub fn filter_by_partition(items: Vec<Project>, key: &str) -> Vec<Project> {
    if key == ALL_PARTITION {
        return items;
    }
    items.into_iter().filter(|p| p.in_partition(key)).collect()
}

/// Errors reading or writing a persisted overlay.
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-partition manual order, set explicitly by the user.
///
/// Independent of the cache: reloads never touch it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManualOrder {
    partitions: BTreeMap<String, Vec<ProjectId>>,
}

impl ManualOrder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the order for `key` wholesale.
    pub fn set(&mut self, key: &str, ids: Vec<ProjectId>) {
        self.partitions.insert(key.to_string(), ids);
    }

    pub fn get(&self, key: &str) -> Option<&[ProjectId]> {
        self.partitions.get(key).map(Vec::as_slice)
    }

    /// Remove the order for `key`. Returns whether one existed.
    pub fn clear(&mut self, key: &str) -> bool {
        self.partitions.remove(key).is_some()
    }

    pub fn partitions(&self) -> impl Iterator<Item = &str> {
        self.partitions.keys().map(String::as_str)
    }

    /// Read an overlay file. A missing file is an empty overlay.
    pub fn load(path: &Path) -> Result<Self, OverlayError> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), OverlayError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{ServiceType, Size};
    use crate::wire::parse_timestamp;

    fn project(id: i64, pinned: bool, created_at: Option<&str>, tags: &[&str]) -> Project {
        let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        Project {
            id: ProjectId::from(id),
            business_name: format!("Project {id}"),
            business_type: String::new(),
            service_type: ServiceType::Images,
            image_after: "a.jpg".into(),
            image_before: None,
            size: Size::Medium,
            category: tags.first().cloned().unwrap_or_default(),
            tags,
            pinned,
            created_at: created_at.and_then(parse_timestamp),
        }
    }

    fn ids(items: &[Project]) -> Vec<i64> {
        items.iter().filter_map(|p| p.id.as_i64()).collect()
    }

    #[test]
    fn default_order_pinned_then_newest() {
        let items = vec![
            project(1, false, Some("2024-01-01T10:00"), &[]),
            project(2, true, Some("2024-01-01T09:00"), &[]),
            project(3, false, Some("2024-01-01T11:00"), &[]),
        ];
        assert_eq!(ids(&order(items, None)), vec![2, 3, 1]);
    }

    #[test]
    fn default_order_ties_break_on_id_descending() {
        let items = vec![
            project(4, false, Some("2024-01-01T10:00"), &[]),
            project(10, false, Some("2024-01-01T10:00"), &[]),
            project(7, false, None, &[]),
            project(9, false, None, &[]),
        ];
        assert_eq!(ids(&order(items, None)), vec![10, 4, 9, 7]);
    }

    #[test]
    fn manual_order_then_default_for_the_rest() {
        let items = vec![
            project(1, false, Some("2024-01-01T10:00"), &[]),
            project(2, false, Some("2024-01-01T11:00"), &[]),
            project(3, false, Some("2024-01-01T12:00"), &[]),
            project(4, true, Some("2024-01-01T08:00"), &[]),
            project(5, false, Some("2024-01-01T13:00"), &[]),
        ];
        let manual = [ProjectId::from(3), ProjectId::from(1), ProjectId::from(2)];
        assert_eq!(ids(&order(items, Some(&manual))), vec![3, 1, 2, 4, 5]);
    }

    #[test]
    fn manual_order_skips_unknown_and_repeated_ids() {
        let items = vec![project(1, false, None, &[]), project(2, false, None, &[])];
        let manual = [
            ProjectId::from(99),
            ProjectId::from(2),
            ProjectId::from(2),
            ProjectId::from(1),
        ];
        assert_eq!(ids(&order(items, Some(&manual))), vec![2, 1]);
    }

    #[test]
    fn partition_filter_matches_tags_and_legacy_category() {
        let mut legacy = project(3, false, None, &[]);
        legacy.category = "restaurants".into();
        let items = vec![
            project(1, false, None, &["restaurants", "retail"]),
            project(2, false, None, &["retail", "restaurants"]),
            legacy,
            project(4, false, None, &["gyms"]),
        ];
        assert_eq!(ids(&filter_by_partition(items.clone(), "restaurants")), vec![1, 2, 3]);
        assert_eq!(ids(&filter_by_partition(items.clone(), ALL_PARTITION)), vec![1, 2, 3, 4]);
        assert!(filter_by_partition(items, "cafes").is_empty());
    }

    #[test]
    fn set_replaces_rather_than_merges() {
        let mut overlay = ManualOrder::new();
        overlay.set("restaurants", vec![ProjectId::from(1), ProjectId::from(2)]);
        overlay.set("restaurants", vec![ProjectId::from(3)]);
        assert_eq!(overlay.get("restaurants"), Some(&[ProjectId::from(3)][..]));
        assert!(overlay.clear("restaurants"));
        assert!(overlay.get("restaurants").is_none());
    }

    #[test]
    fn overlay_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("order.json");

        assert_eq!(ManualOrder::load(&path).unwrap(), ManualOrder::new());

        let mut overlay = ManualOrder::new();
        overlay.set("restaurants", vec![ProjectId::from(3), ProjectId::from("abc")]);
        overlay.save(&path).unwrap();

        let loaded = ManualOrder::load(&path).unwrap();
        assert_eq!(loaded, overlay);
        assert_eq!(loaded.partitions().collect::<Vec<_>>(), vec!["restaurants"]);
    }

    #[test]
    fn corrupt_overlay_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("order.json");
        std::fs::write(&path, b"not json").unwrap();
        assert!(matches!(ManualOrder::load(&path), Err(OverlayError::Json(_))));
    }
}
