//! Row shapes exchanged with the remote collection and realtime channel.
//!
//! Rows use camelCase keys; snake_case keys are accepted on input so rows
//! straight from the database columns decode as well. Everything is lenient
//! on input: a row only has to carry an `id` to be ingested.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use portfolio_tags::TagVocabulary;
use serde::{Deserialize, Serialize};

use crate::project::{Project, ProjectDraft, ProjectId, ProjectPatch, ServiceType, Size};

/// A project row as the remote stores it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ProjectId>,
    #[serde(default, alias = "business_name", skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(default, alias = "business_type", skip_serializing_if = "Option::is_none")]
    pub business_type: Option<String>,
    #[serde(default, alias = "service_type", skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(default, alias = "image_after", skip_serializing_if = "Option::is_none")]
    pub image_after: Option<String>,
    #[serde(default, alias = "image_before", skip_serializing_if = "Option::is_none")]
    pub image_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
    #[serde(default, alias = "created_at", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Partial row sent with an update. Absent fields are left alone remotely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_after: Option<String>,
    /// `Some(None)` serializes as `null` and clears the column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_before: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
}

/// Identity the remote assigns to an inserted row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertReceipt {
    pub id: ProjectId,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Parse a remote timestamp.
///
/// Accepts RFC 3339, Postgres-style `YYYY-MM-DD HH:MM:SS+00`, naive
/// `YYYY-MM-DDTHH:MM[:SS[.fff]]` (taken as UTC) and bare dates.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Format a timestamp the way rows carry it.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl RawProject {
    /// Convert an inbound row into a synchronized project.
    ///
    /// Returns `None` for rows without an id; they cannot be reconciled.
    pub fn ingest(self, vocabulary: &dyn TagVocabulary, default_category: &str) -> Option<Project> {
        let Some(id) = self.id else {
            tracing::warn!(
                "Skipping row without id (businessName {:?})",
                self.business_name
            );
            return None;
        };

        let service_type = match self.service_type.as_deref() {
            Some(s) => s.parse().unwrap_or_else(|e| {
                tracing::debug!("Project {}: {}, using images", id, e);
                ServiceType::Images
            }),
            None => ServiceType::default(),
        };
        let size = match self.size.as_deref() {
            Some(s) => s.parse().unwrap_or_else(|e| {
                tracing::debug!("Project {}: {}, using medium", id, e);
                Size::Medium
            }),
            None => Size::default(),
        };
        let created_at = self.created_at.as_deref().and_then(|s| {
            let parsed = parse_timestamp(s);
            if parsed.is_none() {
                tracing::warn!("Project {}: unparseable createdAt {:?}", id, s);
            }
            parsed
        });

        let mut project = Project {
            id,
            business_name: self.business_name.unwrap_or_default(),
            business_type: self.business_type.unwrap_or_default(),
            service_type,
            image_after: self.image_after.unwrap_or_default(),
            image_before: self.image_before.filter(|s| !s.is_empty()),
            size,
            category: self.category.unwrap_or_default(),
            tags: self.tags.unwrap_or_default(),
            pinned: self.pinned.unwrap_or(false),
            created_at,
        };
        project.normalize_classification(vocabulary, default_category);
        Some(project)
    }

    /// Row for inserting a draft. The draft is expected to be synchronized.
    pub fn from_draft(draft: &ProjectDraft) -> Self {
        Self {
            id: None,
            business_name: Some(draft.business_name.clone()),
            business_type: Some(draft.business_type.clone()),
            service_type: Some(draft.service_type.as_str().to_string()),
            image_after: Some(draft.image_after.clone()),
            image_before: draft.image_before.clone(),
            size: Some(draft.size.as_str().to_string()),
            category: Some(draft.category.clone()),
            tags: Some(draft.tags.clone()),
            pinned: Some(draft.pinned),
            created_at: None,
        }
    }

    /// Apply a partial update to a stored row.
    pub fn merge_patch(&mut self, patch: &RawPatch) {
        if let Some(v) = &patch.business_name {
            self.business_name = Some(v.clone());
        }
        if let Some(v) = &patch.business_type {
            self.business_type = Some(v.clone());
        }
        if let Some(v) = &patch.service_type {
            self.service_type = Some(v.clone());
        }
        if let Some(v) = &patch.image_after {
            self.image_after = Some(v.clone());
        }
        if let Some(v) = &patch.image_before {
            self.image_before = v.clone();
        }
        if let Some(v) = &patch.size {
            self.size = Some(v.clone());
        }
        if let Some(v) = &patch.category {
            self.category = Some(v.clone());
        }
        if let Some(v) = &patch.tags {
            self.tags = Some(v.clone());
        }
        if let Some(v) = patch.pinned {
            self.pinned = Some(v);
        }
    }
}

impl From<&Project> for RawProject {
    fn from(project: &Project) -> Self {
        Self {
            id: Some(project.id.clone()),
            business_name: Some(project.business_name.clone()),
            business_type: Some(project.business_type.clone()),
            service_type: Some(project.service_type.as_str().to_string()),
            image_after: Some(project.image_after.clone()),
            image_before: project.image_before.clone(),
            size: Some(project.size.as_str().to_string()),
            category: Some(project.category.clone()),
            tags: Some(project.tags.clone()),
            pinned: Some(project.pinned),
            created_at: project.created_at.as_ref().map(format_timestamp),
        }
    }
}

impl RawPatch {
    /// Build the outbound patch for the fields `patch` touches, taking
    /// values from the already patched and synchronized `next`.
    ///
    /// Any classification change sends both `tags` and `category`.
    pub fn from_patch(patch: &ProjectPatch, next: &Project) -> Self {
        let classification = patch.touches_classification();
        Self {
            business_name: patch.business_name.as_ref().map(|_| next.business_name.clone()),
            business_type: patch.business_type.as_ref().map(|_| next.business_type.clone()),
            service_type: patch.service_type.map(|_| next.service_type.as_str().to_string()),
            image_after: patch.image_after.as_ref().map(|_| next.image_after.clone()),
            image_before: patch.image_before.as_ref().map(|_| next.image_before.clone()),
            size: patch.size.map(|_| next.size.as_str().to_string()),
            category: classification.then(|| next.category.clone()),
            tags: classification.then(|| next.tags.clone()),
            pinned: patch.pinned.map(|_| next.pinned),
        }
    }
}
