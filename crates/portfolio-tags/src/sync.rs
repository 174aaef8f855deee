//! Tag/category synchronization.
//!
//! Runs on every path that reads or writes a project's tags: rows coming in
//! from the remote store, rows going out for persistence, and realtime
//! deltas. The result always satisfies `category == tags[0]`.

use crate::category::TagId;
use crate::vocabulary::TagVocabulary;

/// Filter `tags` down to the vocabulary.
///
/// Order is preserved and repeated tags keep their first occurrence. When
/// nothing survives, the result is `[fallback_category]`. The function is
/// idempotent for a fixed vocabulary and fallback.
pub fn sync_tags(
    tags: &[TagId],
    fallback_category: &str,
    vocabulary: &dyn TagVocabulary,
) -> Vec<TagId> {
    let valid = vocabulary.valid_tags();
    let mut synced: Vec<TagId> = Vec::with_capacity(tags.len());
    for tag in tags {
        if valid.contains(tag) && !synced.contains(tag) {
            synced.push(tag.clone());
        }
    }
    if synced.is_empty() {
        synced.push(fallback_category.to_string());
    }
    synced
}

/// Synchronize tags and derive the primary category in one step.
///
/// `category` is the entity's prior category, used as the fallback while it
/// is still in the vocabulary; otherwise `default_category` is used.
pub fn normalize(
    tags: &[TagId],
    category: &str,
    vocabulary: &dyn TagVocabulary,
    default_category: &str,
) -> (Vec<TagId>, TagId) {
    let fallback = if vocabulary.contains(category) {
        category
    } else {
        default_category
    };
    let tags = sync_tags(tags, fallback, vocabulary);
    let primary = tags[0].clone();
    (tags, primary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::StaticVocabulary;

    fn vocab() -> StaticVocabulary {
        StaticVocabulary::new(["restaurants", "retail", "gyms"])
    }

    fn tags(list: &[&str]) -> Vec<TagId> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn drops_unknown_tags() {
        let out = sync_tags(&tags(&["retail", "bogus", "gyms"]), "other", &vocab());
        assert_eq!(out, tags(&["retail", "gyms"]));
    }

    #[test]
    fn empty_result_uses_fallback() {
        assert_eq!(sync_tags(&tags(&["bogus"]), "retail", &vocab()), tags(&["retail"]));
        assert_eq!(sync_tags(&[], "retail", &vocab()), tags(&["retail"]));
    }

    #[test]
    fn fallback_is_kept_even_when_outside_vocabulary() {
        let out = sync_tags(&[], "legacy", &vocab());
        assert_eq!(out, tags(&["legacy"]));
    }

    #[test]
    fn collapses_repeated_tags() {
        let out = sync_tags(&tags(&["gyms", "retail", "gyms"]), "other", &vocab());
        assert_eq!(out, tags(&["gyms", "retail"]));
    }

    #[test]
    fn idempotent() {
        let v = vocab();
        for input in [
            tags(&["retail", "bogus"]),
            tags(&["bogus"]),
            tags(&[]),
            tags(&["gyms", "restaurants"]),
        ] {
            let once = sync_tags(&input, "legacy", &v);
            let twice = sync_tags(&once, "legacy", &v);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn normalize_sets_primary_category() {
        let (t, category) = normalize(&tags(&["bogus", "gyms"]), "retail", &vocab(), "other");
        assert_eq!(t, tags(&["gyms"]));
        assert_eq!(category, "gyms");
    }

    #[test]
    fn normalize_keeps_prior_category_in_vocabulary() {
        let (t, category) = normalize(&tags(&["bogus"]), "retail", &vocab(), "other");
        assert_eq!(t, tags(&["retail"]));
        assert_eq!(category, "retail");
    }

    #[test]
    fn normalize_replaces_prior_category_outside_vocabulary() {
        let v = StaticVocabulary::new(["restaurants", "other"]);
        let (t, category) = normalize(&tags(&["bogus"]), "bogus", &v, "other");
        assert_eq!(t, tags(&["other"]));
        assert_eq!(category, "other");
        assert!(t.iter().all(|tag| v.contains(tag)));
    }

    #[test]
    fn normalize_falls_back_to_default_category() {
        let (t, category) = normalize(&[], "  ", &vocab(), "other");
        assert_eq!(t, tags(&["other"]));
        assert_eq!(category, "other");
    }
}
