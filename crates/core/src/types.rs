use std::collections::HashSet;
use std::num::NonZeroUsize;

/// Scheduling knobs for an [`crate::Analysis`].
#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    /// Worker threads for the pairwise matrix; `None` uses available parallelism.
    pub workers: Option<usize>,
}

impl AnalysisOptions {
    pub fn worker_count(&self) -> usize {
        match self.workers {
            Some(n) if n > 0 => n,
            _ => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub ignore_dirs: HashSet<String>,
    pub max_file_size: Option<u64>,
    pub respect_gitignore: bool,
    pub skip_hidden: bool,
}

pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            ignore_dirs: default_ignore_dirs(),
            max_file_size: Some(DEFAULT_MAX_FILE_SIZE_BYTES),
            respect_gitignore: true,
            skip_hidden: true,
        }
    }
}

pub fn default_ignore_dirs() -> HashSet<String> {
    [".git", ".hg", ".svn", "node_modules", "target", "build", "out"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadStats {
    pub entries: u64,
    pub submissions: u64,
    pub files: u64,
    pub bytes: u64,
    pub skipped_hidden: u64,
    pub skipped_binary: u64,
    pub skipped_too_large: u64,
    pub skipped_empty: u64,
    pub skipped_duplicate: u64,
    pub skipped_walk_errors: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome<T> {
    pub result: T,
    pub stats: LoadStats,
}

/// One unordered pair of submissions (by store index) and its distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairResult {
    pub a: usize,
    pub b: usize,
    pub distance: f32,
}

impl PairResult {
    pub fn is_failed(&self) -> bool {
        self.distance < 0.0 || self.distance.is_nan()
    }
}
