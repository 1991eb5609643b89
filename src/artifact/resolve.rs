// ABOUTME: Expands configured artifact paths into concrete archive files.
// ABOUTME: Patterns are workspace globs; '*' stays inside one segment, '**' spans directories.

use globset::{GlobBuilder, GlobMatcher};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no artifact matches {0}")]
    NoMatch(String),

    #[error("invalid artifact pattern {pattern}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("cannot read directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Resolve `pattern` relative to `base`. Matches come back sorted by path.
pub fn resolve_artifacts(base: &Path, pattern: &str) -> Result<Vec<PathBuf>, ResolveError> {
    let pattern = pattern.trim_start_matches("./");

    if !has_glob(pattern) {
        let full = base.join(pattern);
        return if full.is_file() {
            Ok(vec![full])
        } else {
            Err(ResolveError::NoMatch(pattern.to_string()))
        };
    }

    let matcher = compile(pattern)?;
    let root = base.join(literal_prefix(pattern));
    if !root.is_dir() {
        return Err(ResolveError::NoMatch(pattern.to_string()));
    }

    let mut matches = Vec::new();
    for entry in WalkDir::new(&root).follow_links(true) {
        let entry = entry.map_err(|source| ResolveError::Io {
            path: root.clone(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(base) else {
            continue;
        };
        if matcher.is_match(relative) {
            matches.push(entry.into_path());
        }
    }

    if matches.is_empty() {
        return Err(ResolveError::NoMatch(pattern.to_string()));
    }

    matches.sort();
    Ok(matches)
}

fn compile(pattern: &str) -> Result<GlobMatcher, ResolveError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|source| ResolveError::Pattern {
            pattern: pattern.to_string(),
            source,
        })
}

fn has_glob(segment: &str) -> bool {
    segment.contains(['*', '?', '[', '{'])
}

/// Leading directories of `pattern` that contain no glob syntax.
fn literal_prefix(pattern: &str) -> PathBuf {
    let mut segments: Vec<&str> = pattern.split('/').collect();
    segments.pop();
    segments.into_iter().take_while(|s| !has_glob(s)).collect()
}
