//! Fixture and realtime script files read by the `portfolio` binary.
//!
//! A fixture is one JSON document:
//!
//! ```json
//! {
//!   "categories": [{"id": "restaurants", "label": "Restaurants"}],
//!   "projects": [{"id": 1, "businessName": "Cafe", "imageAfter": "a.jpg", "tags": ["restaurants"]}],
//!   "manualOrder": {"restaurants": [1]}
//! }
//! ```
//!
//! A script holds one realtime envelope per line.

use std::collections::BTreeMap;
use std::path::Path;

use portfolio_core::{ProjectId, RawProject, RealtimeEvent};
use portfolio_tags::{validate_tag_id, Category};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Fixture {
    pub categories: Vec<Category>,
    pub projects: Vec<RawProject>,
    #[serde(alias = "manual_order")]
    pub manual_order: BTreeMap<String, Vec<ProjectId>>,
}

impl Fixture {
    pub fn from_json_str(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }

    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let fixture = Self::from_json_str(&content)?;
        tracing::debug!(
            "Loaded fixture {:?}: {} categories, {} projects",
            path,
            fixture.categories.len(),
            fixture.projects.len()
        );
        Ok(fixture)
    }

    /// Categories whose ids are valid tag ids. The rest are logged and dropped.
    pub fn valid_categories(&self) -> Vec<Category> {
        self.categories
            .iter()
            .filter(|category| match validate_tag_id(&category.id) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("Skipping category {:?}: {}", category.label, e);
                    false
                }
            })
            .cloned()
            .collect()
    }
}

/// Decode a JSON-lines realtime script. Blank lines are skipped; lines that
/// fail to decode are logged and skipped.
pub fn parse_script(content: &str) -> Vec<RealtimeEvent> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(n, line)| {
            let decoded = serde_json::from_str::<serde_json::Value>(line)
                .map_err(Into::into)
                .and_then(RealtimeEvent::from_json);
            match decoded {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!("Script line {}: {}", n + 1, e);
                    None
                }
            }
        })
        .collect()
}
