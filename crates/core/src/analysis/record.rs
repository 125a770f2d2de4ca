use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::metric::MetricRecord;
use crate::submission::Annotation;

pub const RECORD_VERSION: &str = "2.0";

/// Saved state of an analysis: which metrics ran, in order, and the
/// annotations keyed by submission id. Matrices are recomputed on restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub version: String,
    #[serde(default)]
    pub metrics: Vec<MetricRecord>,
    #[serde(default)]
    pub annotations: BTreeMap<String, Vec<Annotation>>,
}

impl Default for AnalysisRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisRecord {
    pub fn new() -> Self {
        Self {
            version: RECORD_VERSION.to_string(),
            metrics: Vec::new(),
            annotations: BTreeMap::new(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut text = self.to_json()?;
        text.push('\n');
        fs::write(path, text)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}
