use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::MetricError;
use crate::submission::{Submission, Value};
use crate::tokenize::{CodeTokenizer, Tokenizer, token_key};

use super::ensure_tokens;

/// Empirical stretch so typical distances spread over `[0, 1]`.
const SCALE: f64 = 3.0;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenFrequencyConfig {
    pub(crate) tokenizer: String,
}

/// Euclidean distance between L2-normalized token-id histograms.
#[derive(Debug, Clone)]
pub struct TokenFrequency {
    key: String,
    vector_key: String,
    tokenizer: Arc<dyn Tokenizer>,
}

impl TokenFrequency {
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        let key = if tokenizer.name() == CodeTokenizer.name() {
            "tokenvector".to_string()
        } else {
            format!("tokenvector_{}", tokenizer.name())
        };
        Self::with_key(tokenizer, key)
    }

    pub fn with_key(tokenizer: Arc<dyn Tokenizer>, key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            vector_key: format!("{key}_vec"),
            key,
            tokenizer,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn config(&self) -> serde_json::Value {
        serde_json::json!({ "tokenizer": self.tokenizer.name() })
    }

    pub(crate) fn preprocess(&self, sub: &mut Submission) -> Result<(), MetricError> {
        if sub.contains(&self.vector_key) {
            return Ok(());
        }
        ensure_tokens(sub, self.tokenizer.as_ref())?;
        let tokens = sub.text(&token_key(self.tokenizer.as_ref()))?;

        let mut counts: BTreeMap<u32, u64> = BTreeMap::new();
        for token in tokens.split_whitespace() {
            *counts.entry(self.tokenizer.token_id(token)).or_default() += 1;
        }
        let vector = normalize(&counts);
        sub.insert(self.vector_key.clone(), Value::Vector(vector));
        Ok(())
    }

    pub(crate) fn score(&self, a: &Submission, b: &Submission) -> Result<f32, MetricError> {
        let va = a.vector(&self.vector_key)?;
        let vb = b.vector(&self.vector_key)?;
        Ok(scaled_distance(va, vb))
    }
}

fn normalize(counts: &BTreeMap<u32, u64>) -> BTreeMap<u32, f64> {
    let sum_sq: f64 = counts.values().map(|&c| (c as f64) * (c as f64)).sum();
    if sum_sq == 0.0 {
        return BTreeMap::new();
    }
    let length = sum_sq.sqrt();
    counts
        .iter()
        .map(|(&id, &c)| (id, c as f64 / length))
        .collect()
}

/// Walks both sorted maps once, visiting the union of their ids.
pub(crate) fn scaled_distance(a: &BTreeMap<u32, f64>, b: &BTreeMap<u32, f64>) -> f32 {
    let mut total = 0.0f64;
    let mut ia = a.iter().peekable();
    let mut ib = b.iter().peekable();
    loop {
        let diff = match (ia.peek(), ib.peek()) {
            (None, None) => break,
            (Some(&(_, &x)), None) => {
                ia.next();
                x
            }
            (None, Some(&(_, &y))) => {
                ib.next();
                y
            }
            (Some(&(ka, &x)), Some(&(kb, &y))) => {
                if ka < kb {
                    ia.next();
                    x
                } else if kb < ka {
                    ib.next();
                    y
                } else {
                    ia.next();
                    ib.next();
                    x - y
                }
            }
        };
        total += diff * diff;
    }
    (total.sqrt() * SCALE).min(1.0) as f32
}
