use std::env;
use std::path::PathBuf;

use copy_check_core::{COMPRESSOR_NAMES, DEFAULT_ALPHAS, Linkage, LoadOptions, TOKENIZER_NAMES};

const HELP_TEXT: &str = concat!(
    "copy-check (pairwise source similarity, clustering and suspicious thresholds)\n",
    "\n",
    "Usage:\n",
    "  copy-check [options] [root ...]\n",
    "\n",
    "Every immediate child of a root (file or directory) is one submission.\n",
    "\n",
    "Options:\n",
    "  --metric <name>         token-frequency | ncd | raw-ncd | comment-ncd | variance\n",
    "                          (repeatable; default: token-frequency)\n",
    "  --compressor <name>     NCD compressor: deflate | gzip | zlib | zstd | tar (default: zstd)\n",
    "  --tokenizer <name>      Tokenizer: code | whitespace (default: code)\n",
    "  --ignore-whitespace     raw-ncd: collapse whitespace runs before compressing\n",
    "  --outlier-importance <f>  variance: weight 0..1 of the outlier factor (default: 0.5)\n",
    "  --linkage <name>        single | average | complete (default: average)\n",
    "  --alpha <f>             Threshold false-positive rate: 0.01 | 0.05 (default: 0.05)\n",
    "  --tree                  Print the dendrogram\n",
    "  --json                  Output JSON\n",
    "  --stats                 Print load stats to stderr\n",
    "  --max-pairs <n>         Limit listed pairs (default: 200)\n",
    "  --workers <n>           Worker threads (default: available parallelism)\n",
    "  --load <file>           Restore metrics and annotations from a saved analysis\n",
    "  --save <file>           Save the analysis (metrics and annotations) as JSON\n",
    "  --no-gitignore          Do not respect .gitignore rules\n",
    "  --gitignore             Respect .gitignore rules (default: on)\n",
    "  --max-file-size <n>     Skip files larger than n bytes (default: 10485760)\n",
    "  --ignore-dir <name>     Add an ignored directory name (repeatable)\n",
    "  -V, --version           Show version\n",
    "  -h, --help              Show help\n",
    "\n",
    "Notes:\n",
    "  - variance re-weights the metric listed just before it\n",
    "  - pairs are listed most similar first; pairs below the threshold are marked with *\n",
    "  - set RUST_LOG=info to follow progress on stderr\n",
    "\n",
    "Examples:\n",
    "  copy-check submissions/\n",
    "  copy-check --metric ncd --compressor deflate --tree submissions/\n",
    "  copy-check --metric token-frequency --metric variance --save run.json submissions/\n",
    "\n"
);

pub(crate) fn print_help() {
    print!("{HELP_TEXT}");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MetricChoice {
    TokenFrequency,
    Ncd,
    RawNcd,
    CommentNcd,
    Variance,
}

impl MetricChoice {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "token-frequency" | "tokens" => Some(Self::TokenFrequency),
            "ncd" => Some(Self::Ncd),
            "raw-ncd" => Some(Self::RawNcd),
            "comment-ncd" | "comments" => Some(Self::CommentNcd),
            "variance" => Some(Self::Variance),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Command {
    Help,
    Version,
    Run(Box<ParsedArgs>),
}

#[derive(Debug, Clone)]
pub(crate) struct ParsedArgs {
    pub(crate) json: bool,
    pub(crate) stats: bool,
    pub(crate) tree: bool,
    pub(crate) metrics: Vec<MetricChoice>,
    pub(crate) compressor: String,
    pub(crate) tokenizer: String,
    pub(crate) ignore_whitespace: bool,
    pub(crate) outlier_importance: f64,
    pub(crate) linkage: Linkage,
    pub(crate) alpha: f64,
    pub(crate) max_pairs: usize,
    pub(crate) workers: Option<usize>,
    pub(crate) load: Option<PathBuf>,
    pub(crate) save: Option<PathBuf>,
    pub(crate) roots: Vec<PathBuf>,
    pub(crate) options: LoadOptions,
}

pub(crate) const DEFAULT_MAX_PAIRS: usize = 200;

fn parse_u64(name: &str, raw: &str) -> Result<u64, String> {
    raw.parse::<u64>()
        .map_err(|_| format!("{name} must be an integer"))
}

fn parse_u32_in_range(name: &str, raw: &str, min: u32, max: u32) -> Result<u32, String> {
    let value = raw
        .parse::<u32>()
        .map_err(|_| format!("{name} must be an integer"))?;
    if !(min..=max).contains(&value) {
        return Err(format!("{name} must be {min}..{max}"));
    }
    Ok(value)
}

fn parse_f64(name: &str, raw: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .map_err(|_| format!("{name} must be a number"))
}

fn value<'a>(argv: &'a [String], i: usize, name: &str) -> Result<&'a str, String> {
    argv.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| format!("{name} requires a value"))
}

fn one_of(name: &str, raw: &str, allowed: &[&str]) -> Result<String, String> {
    let lowered = raw.trim().to_ascii_lowercase();
    if allowed.contains(&lowered.as_str()) {
        Ok(lowered)
    } else {
        Err(format!("{name} must be one of: {}", allowed.join(", ")))
    }
}

pub(crate) fn parse_args(argv: &[String]) -> Result<Command, String> {
    let mut roots: Vec<PathBuf> = Vec::new();
    let mut ignore_dirs: Vec<String> = Vec::new();
    let mut metrics: Vec<MetricChoice> = Vec::new();
    let mut json = false;
    let mut stats = false;
    let mut tree = false;
    let mut compressor = "zstd".to_string();
    let mut tokenizer = "code".to_string();
    let mut ignore_whitespace = false;
    let mut outlier_importance = 0.5;
    let mut linkage = Linkage::default();
    let mut alpha = 0.05;
    let mut max_pairs = DEFAULT_MAX_PAIRS;
    let mut workers: Option<usize> = None;
    let mut load: Option<PathBuf> = None;
    let mut save: Option<PathBuf> = None;
    let mut respect_gitignore = true;
    let mut max_file_size: Option<u64> = None;

    let mut i = 0;
    while i < argv.len() {
        let arg = argv[i].as_str();
        match arg {
            "--" => {
                roots.extend(argv[(i + 1)..].iter().map(PathBuf::from));
                break;
            }
            "-h" | "--help" => return Ok(Command::Help),
            "-V" | "--version" => return Ok(Command::Version),
            "--json" => json = true,
            "--stats" => stats = true,
            "--tree" => tree = true,
            "--ignore-whitespace" => ignore_whitespace = true,
            "--no-gitignore" => respect_gitignore = false,
            "--gitignore" => respect_gitignore = true,
            "--metric" => {
                let raw = value(argv, i, arg)?;
                let choice = MetricChoice::parse(raw).ok_or_else(|| {
                    "--metric must be one of: token-frequency, ncd, raw-ncd, comment-ncd, variance".to_string()
                })?;
                metrics.push(choice);
                i += 1;
            }
            "--compressor" => {
                compressor = one_of(arg, value(argv, i, arg)?, COMPRESSOR_NAMES)?;
                i += 1;
            }
            "--tokenizer" => {
                tokenizer = one_of(arg, value(argv, i, arg)?, TOKENIZER_NAMES)?;
                i += 1;
            }
            "--outlier-importance" => {
                let v = parse_f64(arg, value(argv, i, arg)?)?;
                if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                    return Err("--outlier-importance must be 0..1".to_string());
                }
                outlier_importance = v;
                i += 1;
            }
            "--linkage" => {
                linkage = value(argv, i, arg)?
                    .parse::<Linkage>()
                    .map_err(|_| "--linkage must be one of: single, average, complete".to_string())?;
                i += 1;
            }
            "--alpha" => {
                let v = parse_f64(arg, value(argv, i, arg)?)?;
                if !DEFAULT_ALPHAS.iter().any(|a| (a - v).abs() < 1e-12) {
                    return Err("--alpha must be 0.01 or 0.05".to_string());
                }
                alpha = v;
                i += 1;
            }
            "--max-pairs" => {
                max_pairs = parse_u32_in_range(arg, value(argv, i, arg)?, 0, u32::MAX)? as usize;
                i += 1;
            }
            "--workers" => {
                workers =
                    Some(parse_u32_in_range(arg, value(argv, i, arg)?, 1, 4096)? as usize);
                i += 1;
            }
            "--load" => {
                load = Some(PathBuf::from(value(argv, i, arg)?));
                i += 1;
            }
            "--save" => {
                save = Some(PathBuf::from(value(argv, i, arg)?));
                i += 1;
            }
            "--max-file-size" => {
                max_file_size = Some(parse_u64(arg, value(argv, i, arg)?)?);
                i += 1;
            }
            "--ignore-dir" => {
                ignore_dirs.push(value(argv, i, arg)?.to_string());
                i += 1;
            }
            _ if arg.starts_with('-') => return Err(format!("Unknown option: {arg}")),
            _ => roots.push(PathBuf::from(arg)),
        }
        i += 1;
    }

    if metrics.first() == Some(&MetricChoice::Variance)
        || metrics
            .windows(2)
            .any(|w| w == [MetricChoice::Variance, MetricChoice::Variance])
    {
        return Err("--metric variance must follow the metric it re-weights".to_string());
    }
    if metrics.is_empty() && load.is_none() {
        metrics.push(MetricChoice::TokenFrequency);
    }

    let mut options = LoadOptions {
        respect_gitignore,
        ..LoadOptions::default()
    };
    if let Some(max_file_size) = max_file_size {
        options.max_file_size = Some(max_file_size);
    }
    options.ignore_dirs.extend(ignore_dirs);

    let roots = if roots.is_empty() {
        vec![env::current_dir().map_err(|e| format!("failed to get cwd: {e}"))?]
    } else {
        roots
    };

    Ok(Command::Run(Box::new(ParsedArgs {
        json,
        stats,
        tree,
        metrics,
        compressor,
        tokenizer,
        ignore_whitespace,
        outlier_importance,
        linkage,
        alpha,
        max_pairs,
        workers,
        load,
        save,
        roots,
        options,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn run_args(args: &[&str]) -> ParsedArgs {
        match parse_args(&argv(args)).unwrap() {
            Command::Run(parsed) => *parsed,
            other => panic!("expected a run, got {other:?}"),
        }
    }

    #[test]
    fn defaults_to_token_frequency() {
        let parsed = run_args(&["subs"]);
        assert_eq!(parsed.metrics, vec![MetricChoice::TokenFrequency]);
        assert_eq!(parsed.linkage, Linkage::Average);
        assert_eq!(parsed.alpha, 0.05);
        assert_eq!(parsed.roots, vec![PathBuf::from("subs")]);
        assert!(parsed.options.respect_gitignore);
    }

    #[test]
    fn metrics_keep_their_order() {
        let parsed = run_args(&[
            "--metric",
            "ncd",
            "--metric",
            "variance",
            "--compressor",
            "Deflate",
            "--outlier-importance",
            "0.25",
            ".",
        ]);
        assert_eq!(parsed.metrics, vec![MetricChoice::Ncd, MetricChoice::Variance]);
        assert_eq!(parsed.compressor, "deflate");
        assert_eq!(parsed.outlier_importance, 0.25);
    }

    #[test]
    fn comment_ncd_is_selectable() {
        let parsed = run_args(&["--metric", "comment-ncd", "--metric", "variance", "."]);
        assert_eq!(parsed.metrics, vec![MetricChoice::CommentNcd, MetricChoice::Variance]);
    }

    #[test]
    fn variance_needs_a_base() {
        let err = parse_args(&argv(&["--metric", "variance", "."])).unwrap_err();
        assert!(err.contains("must follow"));
    }

    #[test]
    fn rejects_unsupported_values() {
        assert!(parse_args(&argv(&["--alpha", "0.1"])).unwrap_err().contains("0.01 or 0.05"));
        assert!(parse_args(&argv(&["--compressor", "lzma"])).unwrap_err().contains("zstd"));
        assert!(parse_args(&argv(&["--linkage", "ward"])).unwrap_err().contains("average"));
        assert!(parse_args(&argv(&["--outlier-importance", "2"])).is_err());
        assert!(parse_args(&argv(&["--workers", "0"])).is_err());
        assert!(parse_args(&argv(&["--metric"])).unwrap_err().contains("requires a value"));
        assert!(parse_args(&argv(&["--bogus"])).unwrap_err().contains("Unknown option"));
    }

    #[test]
    fn load_without_metrics_runs_nothing_new() {
        let parsed = run_args(&["--load", "run.json", "--ignore-dir", "vendor", "."]);
        assert!(parsed.metrics.is_empty());
        assert_eq!(parsed.load, Some(PathBuf::from("run.json")));
        assert!(parsed.options.ignore_dirs.contains("vendor"));
    }

    #[test]
    fn help_and_version_short_circuit() {
        assert!(matches!(parse_args(&argv(&["-h", "--bogus"])), Ok(Command::Help)));
        assert!(matches!(parse_args(&argv(&["-V"])), Ok(Command::Version)));
    }

    #[test]
    fn double_dash_ends_options() {
        let parsed = run_args(&["--", "--weird-dir"]);
        assert_eq!(parsed.roots, vec![PathBuf::from("--weird-dir")]);
    }
}
