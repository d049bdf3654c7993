//! Sample loading for `analyze`.
//!
//! Accepts JSON files (a top-level array contributes every element),
//! newline-delimited JSON (`.ndjson`, `.jsonl`) and directories, which are
//! walked for files with those extensions.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use partial_json::{ParseState, parse_partial_json};
use serde_json::Value;
use tracing::{debug, warn};
use walkdir::WalkDir;

const EXTENSIONS: [&str; 3] = ["json", "ndjson", "jsonl"];

/// Expand directories into the sample files they contain, sorted.
pub fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|p| has_sample_extension(p))
                .collect();
            found.sort();
            debug!(dir = %path.display(), files = found.len(), "directory scanned");
            files.extend(found);
        } else if path.exists() {
            files.push(path.clone());
        } else {
            bail!("input {} does not exist", path.display());
        }
    }
    Ok(files)
}

fn has_sample_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| EXTENSIONS.contains(&ext))
}

fn is_line_delimited(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("ndjson" | "jsonl")
    )
}

/// Parse one document, optionally completing truncated text.
pub fn parse_document(raw: &str, repair: bool) -> Result<Value> {
    if !repair {
        return serde_json::from_str(raw).context("parsing json");
    }
    let parsed = parse_partial_json(Some(raw));
    match (parsed.state, parsed.value) {
        (ParseState::RepairedParse, Some(value)) => {
            warn!("input was truncated and has been repaired");
            Ok(value)
        }
        (_, Some(value)) => Ok(value),
        (state, None) => bail!("unparseable json ({state:?})"),
    }
}

/// Read every sample from `files`.
pub fn load_samples(files: &[PathBuf], repair: bool) -> Result<Vec<Value>> {
    let mut samples = Vec::new();
    for file in files {
        let raw = fs::read_to_string(file)
            .with_context(|| format!("reading {}", file.display()))?;
        let before = samples.len();

        if is_line_delimited(file) {
            for (n, line) in raw.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let value = parse_document(line, repair).with_context(|| {
                    format!("{} line {}", file.display(), n + 1)
                })?;
                samples.push(value);
            }
        } else {
            match parse_document(&raw, repair)
                .with_context(|| format!("parsing {}", file.display()))?
            {
                Value::Array(items) => samples.extend(items),
                other => samples.push(other),
            }
        }

        debug!(
            file = %file.display(),
            samples = samples.len() - before,
            "samples loaded"
        );
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_load_mixed_inputs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), r#"[{"id": 1}, {"id": 2}]"#).unwrap();
        fs::write(dir.path().join("b.jsonl"), "{\"id\": 3}\n\n{\"id\": 4}\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let files = collect_files(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(files.len(), 2);

        let samples = load_samples(&files, false).unwrap();
        assert_eq!(
            samples,
            vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3}), json!({"id": 4})]
        );
    }

    #[test]
    fn test_single_document_is_one_sample() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.json");
        fs::write(&path, r#"{"id": 1}"#).unwrap();
        assert_eq!(load_samples(&[path], false).unwrap(), vec![json!({"id": 1})]);
    }

    #[test]
    fn test_truncated_input_needs_repair() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cut.json");
        fs::write(&path, r#"[{"id": 1}, {"id": 2, "name": "bo"#).unwrap();

        assert!(load_samples(&[path.clone()], false).is_err());
        let samples = load_samples(&[path], true).unwrap();
        assert_eq!(samples[1], json!({"id": 2, "name": "bo"}));
    }

    #[test]
    fn test_missing_input() {
        let err = collect_files(&[PathBuf::from("/definitely/not/here.json")])
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
