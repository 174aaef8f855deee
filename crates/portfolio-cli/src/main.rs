//! Portfolio CLI
//!
//! Loads a fixture into an in-memory remote, runs a catalog against it and
//! prints every partition in display order, followed by catalog statistics.
//!
//! ```text
//! portfolio [--config catalog.toml] fixture.json [realtime.jsonl]
//! ```
//!
//! Set `RUST_LOG` to control log output (default `info`, written to stderr).

mod fixture;

use std::path::PathBuf;
use std::sync::Arc;

use portfolio_core::{
    realtime_channel, Catalog, CatalogConfig, InMemoryCollection, Project, ALL_PARTITION,
};
use portfolio_tags::{sort_categories, SharedVocabulary};
use serde_json::{json, Map, Value};
use tracing_subscriber::EnvFilter;

use fixture::{parse_script, Fixture};

const USAGE: &str = "usage: portfolio [--config <catalog.toml>] <fixture.json> [realtime.jsonl]";

struct Args {
    config: Option<PathBuf>,
    fixture: PathBuf,
    script: Option<PathBuf>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args, String> {
    let mut config = None;
    let mut positional = Vec::new();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().ok_or("--config requires a path")?;
                config = Some(PathBuf::from(path));
            }
            "--help" | "-h" => return Err(USAGE.to_string()),
            _ => positional.push(PathBuf::from(arg)),
        }
    }

    let mut positional = positional.into_iter();
    let fixture = positional.next().ok_or_else(|| USAGE.to_string())?;
    Ok(Args {
        config,
        fixture,
        script: positional.next(),
    })
}

fn summarize(projects: &[Project]) -> Value {
    projects
        .iter()
        .map(|p| {
            json!({
                "id": p.id,
                "businessName": p.business_name,
                "category": p.category,
                "tags": p.tags,
                "pinned": p.pinned,
            })
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let config = match &args.config {
        Some(path) => CatalogConfig::load(path)?,
        None => CatalogConfig::default(),
    };
    let fixture = Fixture::load(&args.fixture)?;

    let mut categories = fixture.valid_categories();
    sort_categories(&mut categories);
    let vocabulary = Arc::new(SharedVocabulary::new(categories.clone()));
    let remote = Arc::new(InMemoryCollection::with_rows(fixture.projects));
    let catalog = Arc::new(Catalog::new(remote, vocabulary, config));

    catalog.refresh().await?;
    for (key, ids) in fixture.manual_order {
        catalog.set_manual_order(&key, ids);
    }

    if let Some(path) = &args.script {
        let events = parse_script(&std::fs::read_to_string(path)?);
        tracing::info!("Replaying {} realtime events from {:?}", events.len(), path);
        let (tx, rx) = realtime_channel(catalog.config().realtime_buffer);
        let listener = catalog.listen(rx);
        for event in events {
            tx.send(event).await?;
        }
        drop(tx);
        listener.finished().await;
    }

    let mut partitions = Map::new();
    partitions.insert(
        ALL_PARTITION.to_string(),
        summarize(&catalog.get_by_partition(ALL_PARTITION)),
    );
    for category in &categories {
        let projects = catalog.get_by_partition(&category.id);
        if !projects.is_empty() {
            partitions.insert(category.id.clone(), summarize(&projects));
        }
    }

    let report = json!({
        "partitions": partitions,
        "stats": catalog.get_stats(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_positionals_and_config() {
        let parsed = parse_args(args(&["--config", "c.toml", "f.json", "s.jsonl"])).unwrap();
        assert_eq!(parsed.config, Some(PathBuf::from("c.toml")));
        assert_eq!(parsed.fixture, PathBuf::from("f.json"));
        assert_eq!(parsed.script, Some(PathBuf::from("s.jsonl")));
    }

    #[test]
    fn fixture_is_required() {
        assert!(parse_args(args(&[])).is_err());
        assert!(parse_args(args(&["--config"])).is_err());
    }
}
