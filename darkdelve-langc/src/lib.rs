//! Localization asset pipeline.
//!
//! Converts a directory of YAML language sources into the single JSON
//! tree the host's localization lookup consumes. Each source file
//! becomes a top-level key named after its stem. Empty source files are
//! tolerated as empty maps; any other parse failure is logged and
//! aborts the compile pass.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, warn};

/// Errors from the pipeline.
#[derive(Debug, Error)]
pub enum LangError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse {file}: {source}")]
    Parse {
        file: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Compile every `.yml`/`.yaml` file under `src` into one JSON tree at
/// `out`. Returns the number of source files folded in.
pub async fn compile(src: &Path, out: &Path) -> Result<usize, LangError> {
    let mut sources = Vec::new();
    let mut entries = fs::read_dir(src).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e == "yml" || e == "yaml")
            .unwrap_or(false);
        if is_yaml {
            sources.push(path);
        }
    }
    // Deterministic output regardless of directory order.
    sources.sort();

    let mut tree = Map::new();
    let mut count = 0usize;
    for path in sources {
        let content = fs::read_to_string(&path).await?;
        let Some(value) = parse_source(&path, &content)? else {
            debug!(file = %path.display(), "empty language source, skipped");
            continue;
        };

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        tree.insert(stem, value);
        count += 1;
    }

    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent).await?;
    }
    let rendered = serde_json::to_string_pretty(&Value::Object(tree))?;
    fs::write(out, rendered).await?;
    info!(files = count, out = %out.display(), "compiled language tree");
    Ok(count)
}

/// Parse one YAML source. The single whitelisted benign failure is an
/// empty document (blank file or explicit null), which yields `None`;
/// everything else is logged and surfaced as [`LangError::Parse`].
fn parse_source(path: &Path, content: &str) -> Result<Option<Value>, LangError> {
    if content.trim().is_empty() {
        return Ok(None);
    }
    match serde_yaml::from_str::<serde_yaml::Value>(content) {
        Ok(serde_yaml::Value::Null) => Ok(None),
        Ok(value) => Ok(Some(yaml_to_json(value))),
        Err(source) => {
            error!(file = %path.display(), %source, "language source failed to parse");
            Err(LangError::Parse {
                file: path.to_path_buf(),
                source,
            })
        }
    }
}

fn yaml_to_json(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else {
                Value::from(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(seq) => {
            Value::Array(seq.into_iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                let key = match key {
                    serde_yaml::Value::String(s) => s,
                    other => serde_json::to_string(&other).unwrap_or_default(),
                };
                out.insert(key, yaml_to_json(value));
            }
            Value::Object(out)
        }
        // Tags have no JSON counterpart; keep the inner value.
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

/// Remove the generated tree. A missing output is not an error.
pub async fn clean(out: &Path) -> Result<(), LangError> {
    match fs::remove_file(out).await {
        Ok(()) => {
            info!(out = %out.display(), "removed generated language tree");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Signature of a source directory: file count plus newest mtime. Used
/// by the watcher to detect changes between polls.
async fn scan_signature(src: &Path) -> Result<(usize, SystemTime), LangError> {
    let mut count = 0usize;
    let mut newest = SystemTime::UNIX_EPOCH;
    let mut entries = fs::read_dir(src).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e == "yml" || e == "yaml")
            .unwrap_or(false);
        if !is_yaml {
            continue;
        }
        count += 1;
        if let Ok(modified) = entry.metadata().await.and_then(|m| m.modified()) {
            if modified > newest {
                newest = modified;
            }
        }
    }
    Ok((count, newest))
}

/// Poll `src` on an interval and recompile when it changes. Parse
/// failures are logged and watching continues; IO failures end the
/// watch. Runs until cancelled.
pub async fn watch(src: &Path, out: &Path, period: Duration) -> Result<(), LangError> {
    info!(src = %src.display(), period_ms = period.as_millis() as u64, "watching language sources");

    match compile(src, out).await {
        Ok(_) => {}
        Err(LangError::Parse { file, .. }) => {
            warn!(file = %file.display(), "initial compile failed, waiting for changes");
        }
        Err(e) => return Err(e),
    }
    let mut last = scan_signature(src).await?;

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let current = scan_signature(src).await?;
        if current == last {
            continue;
        }
        last = current;
        match compile(src, out).await {
            Ok(count) => debug!(files = count, "recompiled after change"),
            Err(LangError::Parse { file, .. }) => {
                warn!(file = %file.display(), "compile failed, waiting for changes");
            }
            Err(e) => return Err(e),
        }
    }
}
