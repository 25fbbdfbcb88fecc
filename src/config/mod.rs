// src/config/mod.rs
//! File-backed configuration: keyword categories + thresholds, and feed sources.
//!
//! Both files are TOML or JSON, located via an env var first, then
//! `config/<name>.toml`, then `config/<name>.json`.

pub mod keywords;
pub mod sources;

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::error::{DigestError, Result};

pub use keywords::{KeywordConfig, Thresholds};
pub use sources::SourcesConfig;

/// Resolve a config path: `$env_var`, then `config/{stem}.toml`, then `config/{stem}.json`.
pub(crate) fn resolve_path(env_var: &str, stem: &str) -> Result<PathBuf> {
    if let Ok(p) = std::env::var(env_var) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(pb);
        }
        return Err(DigestError::Config(format!(
            "{env_var} points to non-existent path {}",
            pb.display()
        )));
    }
    let toml_p = PathBuf::from(format!("config/{stem}.toml"));
    if toml_p.exists() {
        return Ok(toml_p);
    }
    let json_p = PathBuf::from(format!("config/{stem}.json"));
    if json_p.exists() {
        return Ok(json_p);
    }
    Err(DigestError::Config(format!(
        "no {stem} config found (set {env_var} or create config/{stem}.toml)"
    )))
}

/// Read and deserialize a TOML or JSON file, chosen by extension (TOML otherwise).
pub(crate) fn read_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .map_err(|e| DigestError::Config(format!("reading {}: {e}", path.display())))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if ext == "json" {
        parse_json(&content).map_err(|e| DigestError::Config(format!("{}: {e}", path.display())))
    } else {
        parse_toml(&content).map_err(|e| DigestError::Config(format!("{}: {e}", path.display())))
    }
}

pub(crate) fn parse_toml<T: DeserializeOwned>(s: &str) -> Result<T> {
    toml::from_str(s).map_err(|e| DigestError::Config(e.to_string()))
}

pub(crate) fn parse_json<T: DeserializeOwned>(s: &str) -> Result<T> {
    serde_json::from_str(s).map_err(|e| DigestError::Config(e.to_string()))
}

/// Trim, drop empties, dedup while keeping first-seen order.
pub(crate) fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .map(|it| it.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}
