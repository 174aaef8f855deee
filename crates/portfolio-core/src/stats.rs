//! Catalog statistics, derived from the cache on every call.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::project::{Project, ServiceType};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub total: usize,
    pub pinned: usize,
    pub by_service_type: BTreeMap<ServiceType, usize>,
    /// Keyed by primary category
    pub by_category: BTreeMap<String, usize>,
    pub last_reload: Option<DateTime<Utc>>,
}

impl CatalogStats {
    pub fn compute<'a>(
        projects: impl IntoIterator<Item = &'a Project>,
        last_reload: Option<DateTime<Utc>>,
    ) -> Self {
        let mut stats = CatalogStats {
            last_reload,
            ..Default::default()
        };
        for project in projects {
            stats.total += 1;
            if project.pinned {
                stats.pinned += 1;
            }
            *stats.by_service_type.entry(project.service_type).or_insert(0) += 1;
            *stats.by_category.entry(project.category.clone()).or_insert(0) += 1;
        }
        stats
    }

    pub fn count_for(&self, service_type: ServiceType) -> usize {
        self.by_service_type.get(&service_type).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{ProjectId, Size};

    fn project(id: i64, service_type: ServiceType, category: &str, pinned: bool) -> Project {
        Project {
            id: ProjectId::from(id),
            business_name: "P".into(),
            business_type: String::new(),
            service_type,
            image_after: "a.jpg".into(),
            image_before: None,
            size: Size::Small,
            category: category.into(),
            tags: vec![category.into()],
            pinned,
            created_at: None,
        }
    }

    #[test]
    fn counts_by_service_type_and_category() {
        let projects = vec![
            project(1, ServiceType::Images, "restaurants", true),
            project(2, ServiceType::Videos, "restaurants", false),
            project(3, ServiceType::Images, "retail", false),
        ];
        let stats = CatalogStats::compute(&projects, None);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pinned, 1);
        assert_eq!(stats.count_for(ServiceType::Images), 2);
        assert_eq!(stats.count_for(ServiceType::Videos), 1);
        assert_eq!(stats.by_category.get("restaurants"), Some(&2));
        assert_eq!(stats.by_category.get("retail"), Some(&1));
    }

    #[test]
    fn empty_catalog() {
        let projects: Vec<Project> = Vec::new();
        let stats = CatalogStats::compute(&projects, None);
        assert_eq!(stats, CatalogStats::default());
        assert_eq!(stats.count_for(ServiceType::Videos), 0);
    }
}
