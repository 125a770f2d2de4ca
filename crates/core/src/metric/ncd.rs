use std::sync::Arc;

use crate::compress::Compressor;
use crate::error::MetricError;
use crate::submission::{Submission, Value};
use crate::tokenize::{CodeTokenizer, Tokenizer, comment_key, token_key};
use crate::util::collapse_whitespace;

use super::{ensure_comments, ensure_tokens};

/// What gets compressed: the token stream, the raw concatenated sources, or
/// only the comments the tokenizer finds.
#[derive(Debug, Clone)]
pub enum NcdInput {
    Tokens(Arc<dyn Tokenizer>),
    Raw { ignore_whitespace: bool },
    Comments(Arc<dyn Tokenizer>),
}

/// Normalized compression distance.
#[derive(Debug, Clone)]
pub struct Ncd {
    prefix: String,
    key: String,
    size_key: String,
    stream_key: String,
    compressor: Arc<dyn Compressor>,
    input: NcdInput,
}

impl Ncd {
    pub fn tokenized(compressor: Arc<dyn Compressor>, tokenizer: Arc<dyn Tokenizer>) -> Self {
        let prefix = tokenizer_prefix(compressor.as_ref(), tokenizer.as_ref());
        Self::with_prefix(prefix, compressor, NcdInput::Tokens(tokenizer))
    }

    pub fn comments(compressor: Arc<dyn Compressor>, tokenizer: Arc<dyn Tokenizer>) -> Self {
        let prefix = tokenizer_prefix(compressor.as_ref(), tokenizer.as_ref());
        Self::with_prefix(prefix, compressor, NcdInput::Comments(tokenizer))
    }

    pub fn raw(compressor: Arc<dyn Compressor>, ignore_whitespace: bool) -> Self {
        let prefix = if ignore_whitespace {
            format!("{}_collapsed", compressor.name())
        } else {
            compressor.name().to_string()
        };
        Self::with_prefix(prefix, compressor, NcdInput::Raw { ignore_whitespace })
    }

    pub fn with_prefix(
        prefix: impl Into<String>,
        compressor: Arc<dyn Compressor>,
        input: NcdInput,
    ) -> Self {
        let prefix = prefix.into();
        let (key, size_key, stream_key) = match &input {
            NcdInput::Tokens(tokenizer) => (
                format!("{prefix}_ncd_sim"),
                format!("{prefix}_ncd_size"),
                token_key(tokenizer.as_ref()),
            ),
            NcdInput::Raw { .. } => (
                format!("{prefix}_raw_ncd_sim"),
                format!("{prefix}_raw_ncd_size"),
                format!("{prefix}_raw_ncd_source"),
            ),
            NcdInput::Comments(tokenizer) => (
                format!("{prefix}_comment_ncd_sim"),
                format!("{prefix}_comment_ncd_size"),
                comment_key(tokenizer.as_ref()),
            ),
        };
        Self {
            prefix,
            key,
            size_key,
            stream_key,
            compressor,
            input,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn compressor(&self) -> &dyn Compressor {
        self.compressor.as_ref()
    }

    pub(crate) fn config(&self) -> serde_json::Value {
        match &self.input {
            NcdInput::Tokens(tokenizer) => serde_json::json!({
                "prefix": self.prefix,
                "compressor": self.compressor.name(),
                "input": "tokens",
                "tokenizer": tokenizer.name(),
            }),
            NcdInput::Raw { ignore_whitespace } => serde_json::json!({
                "prefix": self.prefix,
                "compressor": self.compressor.name(),
                "input": "raw",
                "ignoreWhitespace": ignore_whitespace,
            }),
            NcdInput::Comments(tokenizer) => serde_json::json!({
                "prefix": self.prefix,
                "compressor": self.compressor.name(),
                "input": "comments",
                "tokenizer": tokenizer.name(),
            }),
        }
    }

    pub(crate) fn preprocess(&self, sub: &mut Submission) -> Result<(), MetricError> {
        if sub.contains(&self.size_key) && sub.contains(&self.stream_key) {
            return Ok(());
        }
        match &self.input {
            NcdInput::Tokens(tokenizer) => ensure_tokens(sub, tokenizer.as_ref())?,
            NcdInput::Raw { ignore_whitespace } => {
                let mut source = sub.code();
                if *ignore_whitespace {
                    source = collapse_whitespace(&source);
                }
                sub.insert(self.stream_key.clone(), Value::Text(source));
            }
            NcdInput::Comments(tokenizer) => ensure_comments(sub, tokenizer.as_ref())?,
        }
        let size = self
            .compressor
            .compressed_size(sub.text(&self.stream_key)?.as_bytes())?;
        sub.insert(self.size_key.clone(), Value::Size(size));
        Ok(())
    }

    pub(crate) fn score(&self, a: &Submission, b: &Submission) -> Result<f32, MetricError> {
        let text_a = a.text(&self.stream_key)?;
        let text_b = b.text(&self.stream_key)?;
        let za = a.size(&self.size_key)?;
        let zb = b.size(&self.size_key)?;

        let mut joined = Vec::with_capacity(text_a.len() + text_b.len());
        joined.extend_from_slice(text_a.as_bytes());
        joined.extend_from_slice(text_b.as_bytes());
        let zab = self.compressor.compressed_size(&joined)?;
        Ok(normalized_distance(za, zb, zab))
    }
}

fn tokenizer_prefix(compressor: &dyn Compressor, tokenizer: &dyn Tokenizer) -> String {
    if tokenizer.name() == CodeTokenizer.name() {
        compressor.name().to_string()
    } else {
        format!("{}_{}", compressor.name(), tokenizer.name())
    }
}

/// `(Z(xy) - min(Z(x), Z(y))) / max(Z(x), Z(y))`, clamped into `[0, 1]`.
pub(crate) fn normalized_distance(za: usize, zb: usize, zab: usize) -> f32 {
    let min = za.min(zb) as f64;
    let max = za.max(zb) as f64;
    if max <= 0.0 {
        return 0.0;
    }
    ((zab as f64 - min) / max).clamp(0.0, 1.0) as f32
}
