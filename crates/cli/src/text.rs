use copy_check_core::{Dendrogram, LoadStats, PairResult};

use crate::json::is_suspicious;

pub(crate) fn format_load_stats(stats: &LoadStats) -> String {
    let mut out = String::new();
    out.push_str("== load stats ==\n");
    out.push_str(&format!(
        "entries={} submissions={} files={} bytes={}\n",
        stats.entries, stats.submissions, stats.files, stats.bytes
    ));

    let mut skips: Vec<(&str, u64)> = vec![
        ("hidden", stats.skipped_hidden),
        ("binary", stats.skipped_binary),
        ("too_large", stats.skipped_too_large),
        ("empty", stats.skipped_empty),
        ("duplicate", stats.skipped_duplicate),
        ("walk_errors", stats.skipped_walk_errors),
    ];
    skips.retain(|(_, v)| *v > 0);
    if !skips.is_empty() {
        out.push_str("skipped:\n");
        for (k, v) in skips {
            out.push_str(&format!("- {k}={v}\n"));
        }
    }
    out.push('\n');
    out
}

pub(crate) struct PairListing<'a> {
    pub(crate) key: &'a str,
    pub(crate) ids: &'a [String],
    pub(crate) pairs: &'a [PairResult],
    pub(crate) alpha: f64,
    pub(crate) threshold: Option<f64>,
    pub(crate) limit: usize,
}

pub(crate) fn format_pairs(listing: &PairListing<'_>) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "== {}: {} submissions, {} pairs ==\n",
        listing.key,
        listing.ids.len(),
        listing.pairs.len()
    ));
    match listing.threshold {
        Some(t) => out.push_str(&format!("threshold (alpha={}): {t:.4}\n", listing.alpha)),
        None => out.push_str("threshold: n/a\n"),
    }
    out.push('\n');

    for pair in listing.pairs.iter().take(listing.limit) {
        let mark = if is_suspicious(pair, listing.threshold) {
            '*'
        } else {
            ' '
        };
        let distance = if pair.is_failed() {
            "failed".to_string()
        } else {
            format!("{:.4}", pair.distance)
        };
        out.push_str(&format!(
            "{mark} {distance} {} {}\n",
            listing.ids[pair.a], listing.ids[pair.b]
        ));
    }
    if listing.pairs.len() > listing.limit {
        out.push_str(&format!(
            "... {} more\n",
            listing.pairs.len() - listing.limit
        ));
    }
    out.push('\n');
    out
}

/// The tree dump, followed by the groups that merge below `threshold`.
pub(crate) fn format_tree(tree: &Dendrogram, threshold: Option<f64>) -> String {
    let mut out = String::new();
    out.push_str(&format!("== dendrogram ({}) ==\n", tree.linkage()));
    out.push_str(&tree.dump());

    if let Some(t) = threshold {
        let groups: Vec<Vec<&str>> = tree
            .clusters_at_level(t as f32)
            .into_iter()
            .map(|id| tree.leaves(id))
            .filter(|leaves| leaves.len() > 1)
            .map(|leaves| leaves.into_iter().map(|i| tree.label(i)).collect())
            .collect();
        out.push_str(&format!("\nclusters below {t:.4}: {}\n", groups.len()));
        for group in groups {
            out.push_str(&format!("- {}\n", group.join(" ")));
        }
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    use copy_check_core::{DistanceMatrix, Linkage};

    fn ids() -> Vec<String> {
        ["ann", "ben", "cat"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn pairs_mark_suspicious_and_failed_entries() {
        let ids = ids();
        let pairs = [
            PairResult { a: 0, b: 1, distance: 0.05 },
            PairResult { a: 1, b: 2, distance: 0.7 },
            PairResult { a: 0, b: 2, distance: -1.0 },
        ];
        let out = format_pairs(&PairListing {
            key: "tokenvector",
            ids: &ids,
            pairs: &pairs,
            alpha: 0.05,
            threshold: Some(0.2),
            limit: 2,
        });
        assert!(out.starts_with("== tokenvector: 3 submissions, 3 pairs ==\n"));
        assert!(out.contains("threshold (alpha=0.05): 0.2000\n"));
        assert!(out.contains("* 0.0500 ann ben\n"));
        assert!(out.contains("  0.7000 ben cat\n"));
        assert!(out.contains("... 1 more\n"));
        assert!(!out.contains("failed"));
    }

    #[test]
    fn tree_lists_groups_under_the_threshold() {
        let matrix = DistanceMatrix::from_rows(vec![
            vec![0.0, 0.1, 0.9],
            vec![0.1, 0.0, 0.8],
            vec![0.9, 0.8, 0.0],
        ]);
        let tree = Dendrogram::build(&matrix, ids(), Linkage::Single).unwrap();
        let out = format_tree(&tree, Some(0.5));
        assert!(out.starts_with("== dendrogram (single) ==\n"));
        assert!(out.contains("clusters below 0.5000: 1\n- ann ben\n"));
    }

    #[test]
    fn load_stats_only_list_nonzero_skips() {
        let stats = LoadStats {
            entries: 3,
            submissions: 2,
            skipped_duplicate: 1,
            ..LoadStats::default()
        };
        let out = format_load_stats(&stats);
        assert!(out.contains("entries=3 submissions=2"));
        assert!(out.contains("- duplicate=1\n"));
        assert!(!out.contains("binary"));
    }
}
