//! Reads submissions from disk: every immediate child of a root directory
//! is one entrant.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ignore::WalkBuilder;
use tracing::{debug, warn};

use crate::error::Result;
use crate::submission::{Source, SubmissionStore, strip_extension};
use crate::types::{LoadOptions, LoadOutcome, LoadStats};
use crate::util::fnv1a64;

/// Loads the entries under each of `roots` into a store ordered by id.
/// Entries with byte-identical content to an earlier one are skipped.
pub fn load_submissions(
    roots: &[PathBuf],
    options: &LoadOptions,
) -> Result<LoadOutcome<SubmissionStore>> {
    let mut stats = LoadStats::default();
    let mut entries: Vec<(String, PathBuf)> = Vec::new();

    for root in roots {
        for dirent in fs::read_dir(root)? {
            let dirent = dirent?;
            let name = dirent.file_name().to_string_lossy().into_owned();
            if options.skip_hidden && name.starts_with('.') {
                stats.skipped_hidden = stats.skipped_hidden.saturating_add(1);
                continue;
            }
            entries.push((name, dirent.path()));
        }
    }
    entries.sort_by(|a, b| {
        strip_extension(&a.0)
            .cmp(strip_extension(&b.0))
            .then_with(|| a.0.cmp(&b.0))
    });
    stats.entries = entries.len() as u64;

    let mut store = SubmissionStore::new();
    let mut seen: HashMap<u64, String> = HashMap::new();
    for (name, path) in entries {
        let sources = read_entry(&path, options, &mut stats)?;
        if sources.is_empty() {
            debug!(entry = %name, "no readable sources");
            stats.skipped_empty = stats.skipped_empty.saturating_add(1);
            continue;
        }

        let mut code = Vec::new();
        for source in &sources {
            code.extend_from_slice(source.code.as_bytes());
        }
        let hash = fnv1a64(&code);
        if let Some(first) = seen.get(&hash) {
            warn!(entry = %name, duplicate_of = %first, "identical submission skipped");
            stats.skipped_duplicate = stats.skipped_duplicate.saturating_add(1);
            continue;
        }

        let index = store.add(&name, sources)?;
        if let Some(sub) = store.get(index) {
            seen.insert(hash, sub.id().to_string());
        }
        stats.submissions = stats.submissions.saturating_add(1);
    }

    Ok(LoadOutcome {
        result: store,
        stats,
    })
}

fn read_entry(path: &Path, options: &LoadOptions, stats: &mut LoadStats) -> Result<Vec<Source>> {
    let metadata = fs::metadata(path)?;
    if !metadata.is_dir() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        return Ok(read_source(path, name, options, stats)?.into_iter().collect());
    }

    let ignore_dirs = options.ignore_dirs.clone();
    let walk_errors = Arc::new(AtomicU64::new(0));

    let mut builder = WalkBuilder::new(path);
    builder
        .hidden(options.skip_hidden)
        .ignore(false)
        .git_ignore(options.respect_gitignore)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .require_git(false)
        .sort_by_file_name(|a, b| a.cmp(b));
    let walker = builder
        .filter_entry(move |entry| {
            if entry.depth() == 0 {
                return true;
            }
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            match entry.file_name().to_str() {
                Some(name) if is_dir => !ignore_dirs_contains(&ignore_dirs, name),
                _ => true,
            }
        })
        .build();

    let mut sources = Vec::new();
    for result in walker {
        let entry = match result {
            Ok(e) => e,
            Err(err) => {
                debug!(entry = %path.display(), error = %err, "walk error");
                walk_errors.fetch_add(1, Ordering::Relaxed);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let name = rel_path(path, entry.path());
        if let Some(source) = read_source(entry.path(), name, options, stats)? {
            sources.push(source);
        }
    }
    stats.skipped_walk_errors = stats
        .skipped_walk_errors
        .saturating_add(walk_errors.load(Ordering::Relaxed));
    Ok(sources)
}

/// Reads one text file; binary and oversized files yield `None`.
fn read_source(
    path: &Path,
    name: String,
    options: &LoadOptions,
    stats: &mut LoadStats,
) -> io::Result<Option<Source>> {
    let metadata = fs::metadata(path)?;
    if let Some(max) = options.max_file_size
        && metadata.len() > max
    {
        stats.skipped_too_large = stats.skipped_too_large.saturating_add(1);
        return Ok(None);
    }

    let bytes = fs::read(path)?;
    if bytes.contains(&0) {
        stats.skipped_binary = stats.skipped_binary.saturating_add(1);
        return Ok(None);
    }
    stats.files = stats.files.saturating_add(1);
    stats.bytes = stats.bytes.saturating_add(bytes.len() as u64);
    let code = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    };
    Ok(Some(Source::new(name, code)))
}

fn rel_path(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

fn ignore_dirs_contains(ignore_dirs: &HashSet<String>, name: &str) -> bool {
    if ignore_dirs.contains(name) {
        return true;
    }
    #[cfg(windows)]
    {
        ignore_dirs.iter().any(|d| d.eq_ignore_ascii_case(name))
    }
    #[cfg(not(windows))]
    {
        false
    }
}

#[cfg(test)]
mod tests;
