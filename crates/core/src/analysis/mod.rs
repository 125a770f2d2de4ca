//! One analysis session: a submission store plus the metrics applied to it.

mod record;

pub use record::{AnalysisRecord, RECORD_VERSION};

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::cluster::{Dendrogram, Linkage};
use crate::error::{Error, Result};
use crate::matrix::{DistanceMatrix, RunControl, compute_matrix};
use crate::metric::{FAILED_SCORE, Metric, metric_from_record};
use crate::outlier::hampel;
use crate::submission::{Submission, SubmissionStore, Value};
use crate::types::{AnalysisOptions, PairResult};

/// How a metric run ended. Cancellation is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Completed,
    Cancelled,
}

#[derive(Debug)]
pub struct Analysis {
    store: SubmissionStore,
    options: AnalysisOptions,
    control: RunControl,
    applied: Vec<Metric>,
}

impl Analysis {
    pub fn new(store: SubmissionStore, options: AnalysisOptions) -> Self {
        Self {
            store,
            options,
            control: RunControl::new(),
            applied: Vec::new(),
        }
    }

    pub fn with_control(mut self, control: RunControl) -> Self {
        self.control = control;
        self
    }

    pub fn control(&self) -> &RunControl {
        &self.control
    }

    pub fn store(&self) -> &SubmissionStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SubmissionStore {
        &mut self.store
    }

    pub fn into_store(self) -> SubmissionStore {
        self.store
    }

    /// Applied metrics, in the order they finished.
    pub fn applied(&self) -> &[Metric] {
        &self.applied
    }

    pub fn applied_metric(&self, key: &str) -> Option<&Metric> {
        self.applied.iter().find(|m| m.key() == key)
    }

    pub fn is_applied(&self, key: &str) -> bool {
        self.applied_metric(key).is_some()
    }

    /// True when an applied metric provides `key`, or every submission
    /// already carries a matrix row under it.
    pub fn has_results_for_key(&self, key: &str) -> bool {
        if self
            .applied
            .iter()
            .any(|m| m.descriptor().provides.iter().any(|p| p == key))
        {
            return true;
        }
        !self.store.is_empty()
            && self
                .store
                .iter()
                .all(|s| matches!(s.get(key), Some(Value::Row(_))))
    }

    /// Worker threads for a step; steps not declared independent run on one.
    fn workers(&self, independent: bool) -> usize {
        if independent {
            self.options.worker_count()
        } else {
            1
        }
    }

    /// Runs `metric`'s preprocessing over every submission. The first
    /// failure aborts with the submission id attached. A cancellation
    /// requested before this call is cleared.
    pub fn prepare(&mut self, metric: &Metric) -> Result<RunState> {
        metric.validate()?;
        self.control.reset();
        let workers = self.workers(metric.descriptor().preprocess_independent);
        let control = &self.control;
        let subs = self.store.as_mut_slice();
        let chunk = subs.len().div_ceil(workers).max(1);

        if workers <= 1 || subs.len() <= chunk {
            preprocess_chunk(metric, subs, control)?;
        } else {
            let outcomes: Vec<Result<()>> = std::thread::scope(|scope| {
                let handles: Vec<_> = subs
                    .chunks_mut(chunk)
                    .map(|part| scope.spawn(move || preprocess_chunk(metric, part, control)))
                    .collect();
                handles
                    .into_iter()
                    .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                    .collect()
            });
            outcomes.into_iter().collect::<Result<()>>()?;
        }

        if self.control.is_cancelled() {
            return Ok(RunState::Cancelled);
        }
        debug!(key = metric.key(), submissions = self.store.len(), "preprocessed");
        Ok(RunState::Completed)
    }

    /// Scores every pair of a prepared metric and, unless cancelled, stores
    /// row `i` on submission `i` and marks the metric applied. Like
    /// [`prepare`](Self::prepare), it starts from a cleared cancel flag.
    pub fn run(&mut self, metric: Metric) -> Result<RunState> {
        let key = metric.key().to_string();
        if self.is_applied(&key) {
            return Err(Error::AlreadyApplied(key));
        }
        self.control.reset();
        let workers = self.workers(metric.descriptor().score_independent);

        let subs = self.store.as_slice();
        let matrix = compute_matrix(subs.len(), workers, &self.control, |i, j| {
            score_pair(&metric, &subs[i], &subs[j])
        });
        let Some(matrix) = matrix else {
            info!(key = %key, "metric cancelled");
            return Ok(RunState::Cancelled);
        };

        for (sub, row) in self.store.as_mut_slice().iter_mut().zip(matrix.into_rows()) {
            sub.insert(key.clone(), Value::Row(row));
        }
        info!(key = %key, kind = metric.kind(), submissions = self.store.len(), "metric applied");
        self.applied.push(metric);
        Ok(RunState::Completed)
    }

    /// [`prepare`](Self::prepare) followed by [`run`](Self::run).
    pub fn apply(&mut self, metric: Metric) -> Result<RunState> {
        if self.is_applied(metric.key()) {
            return Err(Error::AlreadyApplied(metric.key().to_string()));
        }
        if self.prepare(&metric)? == RunState::Cancelled {
            return Ok(RunState::Cancelled);
        }
        self.run(metric)
    }

    /// Applies `metrics` in an order where each one's requirements are met
    /// first. The order is fixed before anything runs, so an unsatisfiable
    /// set fails without side effects.
    pub fn run_all(&mut self, metrics: Vec<Metric>) -> Result<RunState> {
        for metric in &metrics {
            metric.validate()?;
        }
        for metric in self.schedule(metrics)? {
            if self.apply(metric)? == RunState::Cancelled {
                return Ok(RunState::Cancelled);
            }
        }
        Ok(RunState::Completed)
    }

    fn schedule(&self, metrics: Vec<Metric>) -> Result<Vec<Metric>> {
        let mut available: HashSet<String> = HashSet::new();
        let mut pending = metrics;
        let mut order = Vec::with_capacity(pending.len());

        while !pending.is_empty() {
            let ready = pending.iter().position(|m| {
                m.descriptor()
                    .requires
                    .iter()
                    .all(|k| available.contains(k) || self.has_results_for_key(k))
            });
            let Some(pos) = ready else {
                let pending: Vec<String> = pending.iter().map(|m| m.key().to_string()).collect();
                return Err(Error::UnsatisfiableDependencies { pending });
            };
            if pos > 0 {
                for waiting in &pending[..pos] {
                    warn!(key = waiting.key(), "metric postponed until its inputs exist");
                }
            }

            let metric = pending.remove(pos);
            if self.is_applied(metric.key()) || available.contains(metric.key()) {
                debug!(key = metric.key(), "metric already provided, skipping");
                continue;
            }
            available.extend(metric.descriptor().provides);
            order.push(metric);
        }
        Ok(order)
    }

    /// The full matrix stored under `key`.
    pub fn matrix(&self, key: &str) -> Result<DistanceMatrix> {
        if self.store.is_empty() && self.is_applied(key) {
            return Ok(DistanceMatrix::from_rows(Vec::new()));
        }
        let rows = self
            .store
            .iter()
            .map(|s| {
                s.row(key)
                    .map(<[f32]>::to_vec)
                    .map_err(|_| Error::MissingResults(key.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        if rows.is_empty() {
            return Err(Error::MissingResults(key.to_string()));
        }
        Ok(DistanceMatrix::from_rows(rows))
    }

    /// Every unordered pair once, most similar first; failed pairs last.
    pub fn sorted_pairs(&self, key: &str) -> Result<Vec<PairResult>> {
        let matrix = self.matrix(key)?;
        let mut pairs: Vec<PairResult> = matrix
            .lower_triangle()
            .map(|(i, j, distance)| PairResult {
                a: j,
                b: i,
                distance,
            })
            .collect();
        pairs.sort_by(|x, y| {
            x.is_failed()
                .cmp(&y.is_failed())
                .then(x.distance.total_cmp(&y.distance))
                .then(x.a.cmp(&y.a))
                .then(x.b.cmp(&y.b))
        });
        Ok(pairs)
    }

    /// Off-diagonal distances under `key`, excluding failed pairs.
    pub fn distances(&self, key: &str) -> Result<Vec<f64>> {
        Ok(self
            .matrix(key)?
            .lower_triangle()
            .filter(|&(_, _, d)| d >= 0.0)
            .map(|(_, _, d)| f64::from(d))
            .collect())
    }

    /// Clusters the matrix under `key`, labelling leaves with submission ids.
    pub fn dendrogram(&self, key: &str, linkage: Linkage) -> Result<Dendrogram> {
        let matrix = self.matrix(key)?;
        let labels = self.store.iter().map(|s| s.id().to_string()).collect();
        Dendrogram::build(&matrix, labels, linkage)
    }

    /// Hampel cutoff over the distances stored under `key`.
    pub fn suggested_threshold(&self, key: &str, alpha: f64) -> Result<f64> {
        hampel(&self.distances(key)?, alpha)
    }

    /// Applied metrics and annotations, ready to be serialized.
    pub fn to_record(&self) -> AnalysisRecord {
        let mut record = AnalysisRecord::new();
        record.metrics = self.applied.iter().map(Metric::to_record).collect();
        for sub in self.store.iter().filter(|s| !s.annotations().is_empty()) {
            record
                .annotations
                .insert(sub.id().to_string(), sub.annotations().to_vec());
        }
        record
    }

    /// Reattaches the saved annotations and re-applies the saved metrics.
    pub fn restore(&mut self, record: &AnalysisRecord) -> Result<RunState> {
        if record.version != RECORD_VERSION {
            warn!(version = %record.version, expected = RECORD_VERSION, "record version differs");
        }
        let metrics = record
            .metrics
            .iter()
            .map(metric_from_record)
            .collect::<Result<Vec<_>>>()?;

        for (id, annotations) in &record.annotations {
            match self.store.by_id_mut(id) {
                Some(sub) => {
                    for annotation in annotations {
                        sub.add_annotation(annotation.clone());
                    }
                }
                None => warn!(id = %id, "annotations for unknown submission dropped"),
            }
        }
        self.run_all(metrics)
    }
}

fn preprocess_chunk(metric: &Metric, part: &mut [Submission], control: &RunControl) -> Result<()> {
    for sub in part {
        if control.is_cancelled() {
            return Ok(());
        }
        metric.preprocess(sub).map_err(|source| Error::Preprocess {
            submission: sub.id().to_string(),
            key: metric.key().to_string(),
            source,
        })?;
    }
    Ok(())
}

fn score_pair(metric: &Metric, a: &Submission, b: &Submission) -> f32 {
    match metric.score(a, b) {
        Ok(distance) if distance.is_nan() => {
            warn!(a = %a.id(), b = %b.id(), key = metric.key(), "pair scored NaN");
            FAILED_SCORE
        }
        Ok(distance) => distance,
        Err(err) => {
            warn!(a = %a.id(), b = %b.id(), key = metric.key(), error = %err, "pair scoring failed");
            FAILED_SCORE
        }
    }
}
