mod args;
mod json;
mod path;
mod text;

use std::env;
use std::io;
use std::path::PathBuf;

use copy_check_core::{
    Analysis, AnalysisOptions, AnalysisRecord, Metric, Ncd, RunState, TokenFrequency, Variance,
    compressor_by_name, load_submissions, tokenizer_by_name,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use crate::args::{Command, MetricChoice, ParsedArgs, parse_args, print_help};
use crate::json::{JsonLoadStats, JsonReport, map_pairs, map_tree, write_json};
use crate::path::resolve_path;
use crate::text::{PairListing, format_load_stats, format_pairs, format_tree};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() {
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let parsed = match parse_args(&args) {
        Ok(Command::Run(parsed)) => parsed,
        Ok(Command::Help) => {
            print_help();
            return;
        }
        Ok(Command::Version) => {
            println!("copy-check {}", env!("CARGO_PKG_VERSION"));
            return;
        }
        Err(message) => {
            eprintln!("Error: {message}\n");
            print_help();
            std::process::exit(2);
        }
    };

    let roots: Vec<PathBuf> = match parsed
        .roots
        .iter()
        .map(|p| resolve_path(p))
        .collect::<io::Result<Vec<_>>>()
    {
        Ok(v) => v,
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(&parsed, &roots) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

/// Metrics in command-line order; each variance wraps the metric before it.
fn build_metrics(parsed: &ParsedArgs) -> copy_check_core::Result<Vec<Metric>> {
    let mut metrics: Vec<Metric> = Vec::with_capacity(parsed.metrics.len());
    for choice in &parsed.metrics {
        let metric: Metric = match choice {
            MetricChoice::TokenFrequency => {
                TokenFrequency::new(tokenizer_by_name(&parsed.tokenizer)?).into()
            }
            MetricChoice::Ncd => Ncd::tokenized(
                compressor_by_name(&parsed.compressor)?,
                tokenizer_by_name(&parsed.tokenizer)?,
            )
            .into(),
            MetricChoice::RawNcd => Ncd::raw(
                compressor_by_name(&parsed.compressor)?,
                parsed.ignore_whitespace,
            )
            .into(),
            MetricChoice::CommentNcd => Ncd::comments(
                compressor_by_name(&parsed.compressor)?,
                tokenizer_by_name(&parsed.tokenizer)?,
            )
            .into(),
            MetricChoice::Variance => {
                let base = metrics.last().map(|m| m.key().to_string()).ok_or_else(|| {
                    copy_check_core::Error::InvalidConfig {
                        kind: "variance".to_string(),
                        message: "no base metric".to_string(),
                    }
                })?;
                Variance::new(base, parsed.outlier_importance).into()
            }
        };
        metrics.push(metric);
    }
    Ok(metrics)
}

fn run(parsed: &ParsedArgs, roots: &[PathBuf]) -> copy_check_core::Result<()> {
    let outcome = load_submissions(roots, &parsed.options)?;
    if parsed.stats {
        eprint!("{}", format_load_stats(&outcome.stats));
    }
    let ids: Vec<String> = outcome.result.iter().map(|s| s.id().to_string()).collect();

    let mut analysis = Analysis::new(
        outcome.result,
        AnalysisOptions {
            workers: parsed.workers,
        },
    );

    if let Some(load) = &parsed.load {
        let record = AnalysisRecord::load(load)?;
        info!(path = %load.display(), metrics = record.metrics.len(), "restoring analysis");
        analysis.restore(&record)?;
    }

    let metrics = build_metrics(parsed)?;
    let report_key = metrics
        .last()
        .map(|m| m.key().to_string())
        .or_else(|| analysis.applied().last().map(|m| m.key().to_string()));
    if analysis.run_all(metrics)? == RunState::Cancelled {
        return Err(io::Error::other("analysis was cancelled").into());
    }

    if let Some(save) = &parsed.save {
        analysis.to_record().save(save)?;
        info!(path = %save.display(), "analysis saved");
    }

    let Some(key) = report_key else {
        return Err(io::Error::other("no metric to report").into());
    };
    let pairs = analysis.sorted_pairs(&key)?;
    let threshold = match analysis.suggested_threshold(&key, parsed.alpha) {
        Ok(t) => Some(t),
        Err(err) => {
            warn!(key = %key, error = %err, "no threshold");
            None
        }
    };
    let tree = if parsed.tree {
        Some(analysis.dendrogram(&key, parsed.linkage)?)
    } else {
        None
    };

    if parsed.json {
        let report = JsonReport {
            key: key.clone(),
            submissions: ids.clone(),
            alpha: parsed.alpha,
            threshold,
            total_pairs: pairs.len(),
            pairs: map_pairs(&ids, &pairs, threshold, parsed.max_pairs),
            tree: tree.as_ref().map(map_tree),
            load_stats: parsed.stats.then(|| JsonLoadStats::from(outcome.stats.clone())),
        };
        write_json(&report)?;
    } else {
        print!(
            "{}",
            format_pairs(&PairListing {
                key: &key,
                ids: &ids,
                pairs: &pairs,
                alpha: parsed.alpha,
                threshold,
                limit: parsed.max_pairs,
            })
        );
        if let Some(tree) = &tree {
            print!("{}", format_tree(tree, threshold));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(args: &[&str]) -> ParsedArgs {
        let argv: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        match parse_args(&argv).unwrap() {
            Command::Run(parsed) => *parsed,
            other => panic!("expected a run, got {other:?}"),
        }
    }

    #[test]
    fn variance_wraps_the_preceding_metric() {
        let metrics = build_metrics(&parsed(&[
            "--metric",
            "raw-ncd",
            "--compressor",
            "deflate",
            "--ignore-whitespace",
            "--metric",
            "variance",
            "--outlier-importance",
            "0.5",
            ".",
        ]))
        .unwrap();
        let keys: Vec<&str> = metrics.iter().map(Metric::key).collect();
        assert_eq!(
            keys,
            vec![
                "deflate_collapsed_raw_ncd_sim",
                "variance_on_deflate_collapsed_raw_ncd_sim_0.5"
            ]
        );
    }

    #[test]
    fn whitespace_tokenizer_changes_keys() {
        let metrics = build_metrics(&parsed(&[
            "--tokenizer",
            "whitespace",
            "--metric",
            "token-frequency",
            "--metric",
            "ncd",
            ".",
        ]))
        .unwrap();
        let keys: Vec<&str> = metrics.iter().map(Metric::key).collect();
        assert_eq!(keys, vec!["tokenvector_whitespace", "zstd_whitespace_ncd_sim"]);
    }

    #[test]
    fn comment_ncd_gets_its_own_key() {
        let metrics = build_metrics(&parsed(&[
            "--metric",
            "ncd",
            "--metric",
            "comment-ncd",
            "--metric",
            "variance",
            ".",
        ]))
        .unwrap();
        let keys: Vec<&str> = metrics.iter().map(Metric::key).collect();
        assert_eq!(
            keys,
            vec![
                "zstd_ncd_sim",
                "zstd_comment_ncd_sim",
                "variance_on_zstd_comment_ncd_sim_0.5"
            ]
        );
    }
}
