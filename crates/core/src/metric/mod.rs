//! Distance metrics: a per-submission preprocessing step and a per-pair
//! scoring step, each writing into the submissions' side-tables.

mod ncd;
mod record;
mod token_frequency;
mod variance;

pub use ncd::{Ncd, NcdInput};
pub use record::{MetricRecord, metric_from_record, metric_kinds};
pub use token_frequency::TokenFrequency;
pub use variance::Variance;

use tracing::debug;

use crate::error::{Error, MetricError, Result};
use crate::submission::{Submission, Value};
use crate::tokenize::{Tokenizer, comment_key, token_key};
use crate::util::is_valid_key;

/// Score recorded for a pair whose computation failed.
pub const FAILED_SCORE: f32 = -1.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub key: String,
    pub requires: Vec<String>,
    pub provides: Vec<String>,
    pub preprocess_independent: bool,
    pub score_independent: bool,
}

#[derive(Debug, Clone)]
pub enum Metric {
    TokenFrequency(TokenFrequency),
    Ncd(Ncd),
    Variance(Variance),
}

impl Metric {
    pub fn kind(&self) -> &'static str {
        match self {
            Metric::TokenFrequency(_) => "token-frequency",
            Metric::Ncd(_) => "ncd",
            Metric::Variance(_) => "variance",
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Metric::TokenFrequency(m) => m.key(),
            Metric::Ncd(m) => m.key(),
            Metric::Variance(m) => m.key(),
        }
    }

    pub fn descriptor(&self) -> MetricDescriptor {
        let key = self.key().to_string();
        let requires = match self {
            Metric::Variance(m) => vec![m.base_key().to_string()],
            _ => Vec::new(),
        };
        // Only the compression metrics are declared parallel-safe.
        let independent = matches!(self, Metric::Ncd(_));
        MetricDescriptor {
            provides: vec![key.clone()],
            key,
            requires,
            preprocess_independent: independent,
            score_independent: independent,
        }
    }

    /// Rejects empty keys, keys containing whitespace and out-of-range settings.
    pub fn validate(&self) -> Result<()> {
        if let Metric::Variance(m) = self
            && !(0.0..=1.0).contains(&m.outlier_importance())
        {
            return Err(Error::InvalidConfig {
                kind: self.kind().to_string(),
                message: format!(
                    "outlier importance {} is outside [0, 1]",
                    m.outlier_importance()
                ),
            });
        }
        let descriptor = self.descriptor();
        let keys = std::iter::once(&descriptor.key)
            .chain(&descriptor.requires)
            .chain(&descriptor.provides);
        for key in keys {
            if !is_valid_key(key) {
                return Err(Error::MalformedKey(key.clone()));
            }
        }
        Ok(())
    }

    /// Fills the side-table entries scoring relies on. Entries already present
    /// are reused, so running this twice is harmless.
    pub fn preprocess(&self, sub: &mut Submission) -> std::result::Result<(), MetricError> {
        match self {
            Metric::TokenFrequency(m) => m.preprocess(sub),
            Metric::Ncd(m) => m.preprocess(sub),
            Metric::Variance(m) => m.preprocess(sub),
        }
    }

    /// Distance in `[0, 1]` between two preprocessed submissions.
    pub fn score(&self, a: &Submission, b: &Submission) -> std::result::Result<f32, MetricError> {
        match self {
            Metric::TokenFrequency(m) => m.score(a, b),
            Metric::Ncd(m) => m.score(a, b),
            Metric::Variance(m) => m.score(a, b),
        }
    }

    pub fn to_record(&self) -> MetricRecord {
        let descriptor = self.descriptor();
        let config = match self {
            Metric::TokenFrequency(m) => m.config(),
            Metric::Ncd(m) => m.config(),
            Metric::Variance(m) => m.config(),
        };
        MetricRecord {
            kind: self.kind().to_string(),
            key: descriptor.key,
            requires: descriptor.requires,
            provides: descriptor.provides,
            config,
        }
    }
}

impl From<TokenFrequency> for Metric {
    fn from(m: TokenFrequency) -> Self {
        Metric::TokenFrequency(m)
    }
}

impl From<Ncd> for Metric {
    fn from(m: Ncd) -> Self {
        Metric::Ncd(m)
    }
}

impl From<Variance> for Metric {
    fn from(m: Variance) -> Self {
        Metric::Variance(m)
    }
}

/// Tokenizes every source of `sub` once per tokenizer and caches the stream.
pub(crate) fn ensure_tokens(
    sub: &mut Submission,
    tokenizer: &dyn Tokenizer,
) -> std::result::Result<(), MetricError> {
    let key = token_key(tokenizer);
    if sub.contains(&key) {
        return Ok(());
    }
    let mut stream = String::new();
    for source in sub.sources() {
        let label = format!("{}/{}", sub.id(), source.name);
        let tokens = tokenizer.tokenize(&source.code, &label)?;
        stream.push_str(&tokens);
        if !stream.ends_with(char::is_whitespace) {
            stream.push('\n');
        }
    }
    debug!(id = %sub.id(), tokenizer = tokenizer.name(), bytes = stream.len(), "tokenized");
    sub.insert(key, Value::Text(stream));
    Ok(())
}

/// Collects the comments of every source of `sub` once per tokenizer. A
/// submission without comments caches an empty stream.
pub(crate) fn ensure_comments(
    sub: &mut Submission,
    tokenizer: &dyn Tokenizer,
) -> std::result::Result<(), MetricError> {
    let key = comment_key(tokenizer);
    if sub.contains(&key) {
        return Ok(());
    }
    let mut stream = String::new();
    for source in sub.sources() {
        let label = format!("{}/{}", sub.id(), source.name);
        stream.push_str(&tokenizer.retrieve_comments(&source.code, &label)?);
        if !stream.is_empty() && !stream.ends_with(char::is_whitespace) {
            stream.push('\n');
        }
    }
    debug!(id = %sub.id(), tokenizer = tokenizer.name(), bytes = stream.len(), "comments collected");
    sub.insert(key, Value::Text(stream));
    Ok(())
}
