//! Tag vocabulary providers.

use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock};

use crate::category::{Category, TagId};

/// Supplies the currently valid set of tag ids.
///
/// Implementations are expected to be cheap to call; the synchronizer asks
/// for the set on every ingestion path.
pub trait TagVocabulary: Send + Sync {
    fn valid_tags(&self) -> BTreeSet<TagId>;

    fn contains(&self, tag: &str) -> bool {
        self.valid_tags().contains(tag)
    }
}

/// A vocabulary fixed at construction time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticVocabulary {
    tags: BTreeSet<TagId>,
}

impl StaticVocabulary {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TagId>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_categories(categories: &[Category]) -> Self {
        Self::new(categories.iter().map(|c| c.id.clone()))
    }
}

impl TagVocabulary for StaticVocabulary {
    fn valid_tags(&self) -> BTreeSet<TagId> {
        self.tags.clone()
    }

    fn contains(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// A vocabulary whose contents can be swapped while shared, e.g. after the
/// category list is edited.
#[derive(Debug, Default)]
pub struct SharedVocabulary {
    categories: RwLock<Vec<Category>>,
}

impl SharedVocabulary {
    pub fn new(categories: Vec<Category>) -> Self {
        Self {
            categories: RwLock::new(categories),
        }
    }

    /// Replace the whole category list.
    pub fn replace(&self, categories: Vec<Category>) {
        *self
            .categories
            .write()
            .unwrap_or_else(PoisonError::into_inner) = categories;
    }

    /// Current categories, in stored order.
    pub fn categories(&self) -> Vec<Category> {
        self.categories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TagVocabulary for SharedVocabulary {
    fn valid_tags(&self) -> BTreeSet<TagId> {
        self.categories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|c| c.id.clone())
            .collect()
    }
}
