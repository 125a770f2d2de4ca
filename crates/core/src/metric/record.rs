use serde::{Deserialize, Serialize};

use crate::compress::compressor_by_name;
use crate::error::{Error, Result};
use crate::tokenize::tokenizer_by_name;

use super::token_frequency::TokenFrequencyConfig;
use super::{Metric, Ncd, NcdInput, TokenFrequency, Variance};

/// Serializable description of a metric, re-instantiated by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRecord {
    pub kind: String,
    pub key: String,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub config: serde_json::Value,
}

type Constructor = fn(&MetricRecord) -> Result<Metric>;

const REGISTRY: &[(&str, Constructor)] = &[
    ("token-frequency", token_frequency_from_record),
    ("ncd", ncd_from_record),
    ("variance", variance_from_record),
];

pub fn metric_kinds() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|(kind, _)| *kind)
}

pub fn metric_from_record(record: &MetricRecord) -> Result<Metric> {
    let constructor = REGISTRY
        .iter()
        .find(|(kind, _)| *kind == record.kind)
        .map(|(_, c)| *c)
        .ok_or_else(|| Error::UnknownMetric(record.kind.clone()))?;
    let metric = constructor(record)?;
    metric.validate()?;
    Ok(metric)
}

fn parse_config<T: for<'de> Deserialize<'de>>(record: &MetricRecord) -> Result<T> {
    serde_json::from_value(record.config.clone()).map_err(|e| Error::InvalidConfig {
        kind: record.kind.clone(),
        message: e.to_string(),
    })
}

fn token_frequency_from_record(record: &MetricRecord) -> Result<Metric> {
    let config: TokenFrequencyConfig = parse_config(record)?;
    let tokenizer = tokenizer_by_name(&config.tokenizer)?;
    Ok(TokenFrequency::with_key(tokenizer, record.key.clone()).into())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NcdConfig {
    prefix: String,
    compressor: String,
    input: String,
    #[serde(default)]
    tokenizer: Option<String>,
    #[serde(default)]
    ignore_whitespace: bool,
}

fn ncd_from_record(record: &MetricRecord) -> Result<Metric> {
    let config: NcdConfig = parse_config(record)?;
    let compressor = compressor_by_name(&config.compressor)?;
    let input = match config.input.as_str() {
        "tokens" => {
            let name = config.tokenizer.as_deref().unwrap_or("code");
            NcdInput::Tokens(tokenizer_by_name(name)?)
        }
        "raw" => NcdInput::Raw {
            ignore_whitespace: config.ignore_whitespace,
        },
        "comments" => {
            let name = config.tokenizer.as_deref().unwrap_or("code");
            NcdInput::Comments(tokenizer_by_name(name)?)
        }
        other => {
            return Err(Error::InvalidConfig {
                kind: record.kind.clone(),
                message: format!("unknown input {other:?}"),
            });
        }
    };
    let metric = Ncd::with_prefix(config.prefix, compressor, input);
    if metric.key() != record.key {
        return Err(Error::InvalidConfig {
            kind: record.kind.clone(),
            message: format!("key {} does not match prefix, expected {}", record.key, metric.key()),
        });
    }
    Ok(metric.into())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VarianceConfig {
    base: String,
    outlier_importance: f64,
}

fn variance_from_record(record: &MetricRecord) -> Result<Metric> {
    let config: VarianceConfig = parse_config(record)?;
    Ok(Variance::with_key(record.key.clone(), config.base, config.outlier_importance).into())
}
