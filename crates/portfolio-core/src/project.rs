//! Project entity model.
//!
//! A [`Project`] is a persisted catalog entry; it always has a remote-assigned
//! [`ProjectId`]. Before persistence the UI works with a [`ProjectDraft`].
//! Edits are described by a [`ProjectPatch`], which produces a new value
//! rather than mutating in place.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use portfolio_tags::{normalize, TagId, TagVocabulary};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CatalogError;
use crate::wire::InsertReceipt;

/// Remote-assigned project identifier.
///
/// The remote may send ids as JSON numbers or strings. Integer ids compare
/// numerically and sort before non-integer ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id as an integer, when it is one.
    pub fn as_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for ProjectId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ProjectId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ProjectId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Ord for ProjectId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.as_i64(), other.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for ProjectId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for ProjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_i64() {
            Some(n) if n.to_string() == self.0 => serializer.serialize_i64(n),
            _ => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for ProjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum WireId {
            Int(i64),
            Text(String),
        }

        Ok(match WireId::deserialize(deserializer)? {
            WireId::Int(n) => ProjectId::from(n),
            WireId::Text(s) => ProjectId::from(s),
        })
    }
}

/// Kind of media a project showcases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    #[default]
    Images,
    Videos,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Images => "images",
            ServiceType::Videos => "videos",
        }
    }
}

impl FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "images" | "image" => Ok(ServiceType::Images),
            "videos" | "video" => Ok(ServiceType::Videos),
            other => Err(format!("unknown service type: {other}")),
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Card size in the portfolio grid. Presentation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Size {
    Small,
    #[default]
    Medium,
    Large,
}

impl Size {
    pub fn as_str(&self) -> &'static str {
        match self {
            Size::Small => "small",
            Size::Medium => "medium",
            Size::Large => "large",
        }
    }
}

impl FromStr for Size {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" => Ok(Size::Small),
            "medium" => Ok(Size::Medium),
            "large" => Ok(Size::Large),
            other => Err(format!("unknown size: {other}")),
        }
    }
}

/// A persisted catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub business_name: String,
    pub business_type: String,
    pub service_type: ServiceType,
    pub image_after: String,
    pub image_before: Option<String>,
    pub size: Size,
    /// Primary tag; equals `tags[0]` once synchronized
    pub category: TagId,
    pub tags: Vec<TagId>,
    pub pinned: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl Project {
    /// Run the tag synchronizer and restore `category == tags[0]`.
    pub fn normalize_classification(&mut self, vocabulary: &dyn TagVocabulary, default_category: &str) {
        let (tags, category) = normalize(&self.tags, &self.category, vocabulary, default_category);
        self.tags = tags;
        self.category = category;
    }

    /// Whether the project belongs to a tag partition, counting the legacy
    /// single-category field for rows ingested before tags existed.
    pub fn in_partition(&self, key: &str) -> bool {
        self.tags.iter().any(|t| t == key) || self.category == key
    }

    pub(crate) fn validate(&self) -> Result<(), CatalogError> {
        validate_required(&self.business_name, &self.image_after)
    }
}

/// A project the UI has built but the remote has not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectDraft {
    pub business_name: String,
    pub business_type: String,
    pub service_type: ServiceType,
    pub image_after: String,
    pub image_before: Option<String>,
    pub size: Size,
    pub category: TagId,
    pub tags: Vec<TagId>,
    pub pinned: bool,
}

impl ProjectDraft {
    pub fn new(business_name: impl Into<String>, image_after: impl Into<String>) -> Self {
        Self {
            business_name: business_name.into(),
            image_after: image_after.into(),
            ..Default::default()
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TagId>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_service_type(mut self, service_type: ServiceType) -> Self {
        self.service_type = service_type;
        self
    }

    pub fn with_business_type(mut self, business_type: impl Into<String>) -> Self {
        self.business_type = business_type.into();
        self
    }

    pub fn pinned(mut self, pinned: bool) -> Self {
        self.pinned = pinned;
        self
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        validate_required(&self.business_name, &self.image_after)
    }

    pub fn normalize_classification(&mut self, vocabulary: &dyn TagVocabulary, default_category: &str) {
        let (tags, category) = normalize(&self.tags, &self.category, vocabulary, default_category);
        self.tags = tags;
        self.category = category;
    }

    /// Attach the identity the remote assigned on insert.
    pub fn into_project(self, receipt: InsertReceipt) -> Project {
        Project {
            id: receipt.id,
            business_name: self.business_name,
            business_type: self.business_type,
            service_type: self.service_type,
            image_after: self.image_after,
            image_before: self.image_before,
            size: self.size,
            category: self.category,
            tags: self.tags,
            pinned: self.pinned,
            created_at: receipt.created_at,
        }
    }
}

/// Replacement values for a subset of a project's fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectPatch {
    pub business_name: Option<String>,
    pub business_type: Option<String>,
    pub service_type: Option<ServiceType>,
    pub image_after: Option<String>,
    /// `Some(None)` clears the before image
    pub image_before: Option<Option<String>>,
    pub size: Option<Size>,
    pub category: Option<TagId>,
    pub tags: Option<Vec<TagId>>,
    pub pinned: Option<bool>,
}

impl ProjectPatch {
    pub fn pinned(pinned: bool) -> Self {
        Self {
            pinned: Some(pinned),
            ..Default::default()
        }
    }

    pub fn business_name(name: impl Into<String>) -> Self {
        Self {
            business_name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether the patch changes `tags` or `category`.
    pub fn touches_classification(&self) -> bool {
        self.tags.is_some() || self.category.is_some()
    }

    /// Produce the patched project. The input is left untouched.
    ///
    /// A category change without new tags moves that category to the front
    /// of the existing tags, so the category survives synchronization.
    pub fn apply(&self, project: &Project) -> Project {
        let mut next = project.clone();
        if let Some(v) = &self.business_name {
            next.business_name = v.clone();
        }
        if let Some(v) = &self.business_type {
            next.business_type = v.clone();
        }
        if let Some(v) = self.service_type {
            next.service_type = v;
        }
        if let Some(v) = &self.image_after {
            next.image_after = v.clone();
        }
        if let Some(v) = &self.image_before {
            next.image_before = v.clone();
        }
        if let Some(v) = self.size {
            next.size = v;
        }
        if let Some(v) = self.pinned {
            next.pinned = v;
        }
        match (&self.tags, &self.category) {
            (Some(tags), category) => {
                next.tags = tags.clone();
                if let Some(c) = category {
                    next.category = c.clone();
                }
            }
            (None, Some(category)) => {
                let mut tags = vec![category.clone()];
                tags.extend(next.tags.iter().filter(|t| *t != category).cloned());
                next.tags = tags;
                next.category = category.clone();
            }
            (None, None) => {}
        }
        next
    }
}

fn validate_required(business_name: &str, image_after: &str) -> Result<(), CatalogError> {
    if business_name.trim().is_empty() {
        return Err(CatalogError::Validation("businessName is required".into()));
    }
    if image_after.trim().is_empty() {
        return Err(CatalogError::Validation("imageAfter is required".into()));
    }
    Ok(())
}
