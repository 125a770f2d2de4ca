use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, MetricError, Result};
use crate::util::fnv1a64;

/// A cached per-submission result stored in the side-table.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Size(usize),
    Vector(BTreeMap<u32, f64>),
    Row(Vec<f32>),
    Number(f64),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Size(_) => "size",
            Value::Vector(_) => "vector",
            Value::Row(_) => "row",
            Value::Number(_) => "number",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub name: String,
    pub code: String,
}

impl Source {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Label {
    Duplicate,
    Copy,
    NotCopy,
    Suspect,
    Other,
}

/// A reviewer's note attached to one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub labels: Vec<Label>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commentary: Option<String>,
    /// Seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<u64>,
}

impl Annotation {
    pub fn new(author: impl Into<String>, label: Label) -> Self {
        let date = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()
            .map(|d| d.as_secs());
        Self {
            author: Some(author.into()),
            labels: vec![label],
            target: None,
            commentary: None,
            date,
        }
    }
}

/// One entrant: identity, sources and the side-table shared by metrics.
#[derive(Debug, Clone)]
pub struct Submission {
    id: String,
    index: usize,
    sources: Vec<Source>,
    data: HashMap<String, Value>,
    annotations: Vec<Annotation>,
}

impl Submission {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// All source code, concatenated in file order.
    pub fn code(&self) -> String {
        let mut out = String::new();
        for source in &self.sources {
            out.push_str(&source.code);
        }
        out
    }

    pub fn content_hash(&self) -> u64 {
        fnv1a64(self.code().as_bytes())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn add_annotation(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
    }

    fn lookup(&self, key: &str) -> std::result::Result<&Value, MetricError> {
        self.data
            .get(key)
            .ok_or_else(|| MetricError::MissingKey(key.to_string()))
    }

    pub(crate) fn text(&self, key: &str) -> std::result::Result<&str, MetricError> {
        match self.lookup(key)? {
            Value::Text(s) => Ok(s),
            other => Err(wrong_type(key, "text", other)),
        }
    }

    pub(crate) fn size(&self, key: &str) -> std::result::Result<usize, MetricError> {
        match self.lookup(key)? {
            Value::Size(n) => Ok(*n),
            other => Err(wrong_type(key, "size", other)),
        }
    }

    pub(crate) fn vector(
        &self,
        key: &str,
    ) -> std::result::Result<&BTreeMap<u32, f64>, MetricError> {
        match self.lookup(key)? {
            Value::Vector(v) => Ok(v),
            other => Err(wrong_type(key, "vector", other)),
        }
    }

    pub(crate) fn number(&self, key: &str) -> std::result::Result<f64, MetricError> {
        match self.lookup(key)? {
            Value::Number(n) => Ok(*n),
            other => Err(wrong_type(key, "number", other)),
        }
    }

    /// The matrix row stored under `key`.
    pub fn row(&self, key: &str) -> std::result::Result<&[f32], MetricError> {
        match self.lookup(key)? {
            Value::Row(r) => Ok(r),
            other => Err(wrong_type(key, "row", other)),
        }
    }

    /// Distance from this submission to `other` under the matrix stored as `key`.
    pub fn distance_to(&self, key: &str, other: usize) -> std::result::Result<f32, MetricError> {
        self.row(key)?
            .get(other)
            .copied()
            .ok_or_else(|| MetricError::MissingColumn {
                key: key.to_string(),
                index: other,
            })
    }
}

fn wrong_type(key: &str, expected: &'static str, found: &Value) -> MetricError {
    MetricError::WrongType {
        key: key.to_string(),
        expected,
        found: found.kind(),
    }
}

/// Drops everything from the last `.` on; names without a stem stay intact.
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(pos) if pos > 0 => &name[..pos],
        _ => name,
    }
}

/// The ordered set of submissions for one run, with unique ids.
#[derive(Debug, Clone, Default)]
pub struct SubmissionStore {
    submissions: Vec<Submission>,
    by_id: HashMap<String, usize>,
}

impl SubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a submission named after `entry_name` (extension stripped) and
    /// returns its index.
    pub fn add(&mut self, entry_name: &str, sources: Vec<Source>) -> Result<usize> {
        let id = strip_extension(entry_name).to_string();
        if self.by_id.contains_key(&id) {
            return Err(Error::DuplicateSubmission(id));
        }
        let index = self.submissions.len();
        info!(id = %id, index, files = sources.len(), "submission created");
        self.by_id.insert(id.clone(), index);
        self.submissions.push(Submission {
            id,
            index,
            sources,
            data: HashMap::new(),
            annotations: Vec::new(),
        });
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.submissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Submission> {
        self.submissions.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Submission> {
        self.submissions.get_mut(index)
    }

    pub fn by_id(&self, id: &str) -> Option<&Submission> {
        self.by_id.get(id).map(|&i| &self.submissions[i])
    }

    pub fn by_id_mut(&mut self, id: &str) -> Option<&mut Submission> {
        let index = *self.by_id.get(id)?;
        self.submissions.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Submission> {
        self.submissions.iter()
    }

    pub fn as_slice(&self) -> &[Submission] {
        &self.submissions
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Submission] {
        &mut self.submissions
    }
}

#[cfg(test)]
mod tests;
