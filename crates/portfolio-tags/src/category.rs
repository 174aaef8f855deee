//! Category records and tag id validation.

use serde::{Deserialize, Serialize};

/// A tag identifier (a slug such as `restaurants` or `real-estate`).
pub type TagId = String;

/// A category as the vocabulary provider presents it for display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    pub id: TagId,
    pub label: String,
    #[serde(default)]
    pub sort_order: i32,
}

impl Category {
    /// Create a category, validating its id.
    pub fn new(id: &str, label: &str) -> Result<Self, TagError> {
        validate_tag_id(id)?;
        Ok(Self {
            id: id.to_string(),
            label: label.to_string(),
            sort_order: 0,
        })
    }

    pub fn with_sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }
}

/// Errors raised when defining vocabulary entries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagError {
    #[error("Invalid tag id {0:?}: expected lowercase letters, digits and '-'")]
    InvalidTagId(String),
}

/// Check that a tag id is a slug: non-empty, lowercase ASCII letters, digits
/// and `-`, not starting or ending with `-`.
pub fn validate_tag_id(id: &str) -> Result<(), TagError> {
    let valid_chars = id
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if id.is_empty() || !valid_chars || id.starts_with('-') || id.ends_with('-') {
        return Err(TagError::InvalidTagId(id.to_string()));
    }
    Ok(())
}

/// Sort categories for display: `sort_order` first, then label.
pub fn sort_categories(categories: &mut [Category]) {
    categories.sort_by(|a, b| {
        a.sort_order
            .cmp(&b.sort_order)
            .then_with(|| a.label.cmp(&b.label))
    });
}
