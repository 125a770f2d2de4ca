use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use tracing::debug;

/// Symmetric N x N distances; row `i` belongs to submission `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    rows: Vec<Vec<f32>>,
}

impl DistanceMatrix {
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.rows[i][j]
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.rows[i]
    }

    pub fn into_rows(self) -> Vec<Vec<f32>> {
        self.rows
    }

    /// Off-diagonal lower-triangle cells, row by row.
    pub fn lower_triangle(&self) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(i, row)| row[..i].iter().enumerate().map(move |(j, &d)| (i, j, d)))
    }
}

/// Row boundaries `L[0..=P]` giving every worker about the same number of
/// lower-triangle pairs.
pub fn slice_bounds(n: usize, workers: usize) -> Vec<usize> {
    let workers = workers.max(1);
    let per_worker = (n as f64) * (n as f64) / workers as f64;
    let mut bounds = Vec::with_capacity(workers + 1);
    bounds.push(0usize);
    let mut prev = 0usize;
    for _ in 1..workers {
        let next = (per_worker + (prev as f64) * (prev as f64)).sqrt().round() as usize;
        prev = next.clamp(prev, n);
        bounds.push(prev);
    }
    bounds.push(n);
    bounds
}

/// Shared flag that stops a running matrix computation.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

type ProgressObserver = Arc<dyn Fn(f32) + Send + Sync>;

/// Cancellation and progress reporting for one analysis session.
#[derive(Clone, Default)]
pub struct RunControl {
    cancel: CancelHandle,
    progress: Arc<AtomicU32>,
    observer: Option<ProgressObserver>,
}

impl fmt::Debug for RunControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunControl")
            .field("cancelled", &self.is_cancelled())
            .field("progress", &self.progress())
            .finish_non_exhaustive()
    }
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls `observer` from the monitoring worker each time progress grows.
    pub fn on_progress(mut self, observer: impl Fn(f32) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Clears a pending cancellation and the published progress. Every
    /// `Analysis::prepare` and `Analysis::run` starts with this, so a
    /// cancelled session can simply be re-run.
    pub fn reset(&self) {
        self.cancel.reset();
        self.reset_progress();
    }

    /// Last published fraction in `[0, 1]`; may lag behind the workers.
    pub fn progress(&self) -> f32 {
        f32::from_bits(self.progress.load(Ordering::Relaxed))
    }

    pub(crate) fn reset_progress(&self) {
        self.progress.store(0f32.to_bits(), Ordering::Relaxed);
    }

    // Non-negative floats order the same as their bit patterns.
    pub(crate) fn publish(&self, fraction: f32) {
        let bits = fraction.clamp(0.0, 1.0).to_bits();
        let prev = self.progress.fetch_max(bits, Ordering::Relaxed);
        if bits > prev
            && let Some(observer) = &self.observer
        {
            observer(f32::from_bits(bits));
        }
    }
}

/// Fills the lower triangle with `score(i, j)` for every `j < i`, splitting
/// rows by [`slice_bounds`], then mirrors it. Returns `None` if the run was
/// cancelled; the partial matrix is dropped.
pub(crate) fn compute_matrix<F>(
    n: usize,
    workers: usize,
    control: &RunControl,
    score: F,
) -> Option<DistanceMatrix>
where
    F: Fn(usize, usize) -> f32 + Sync,
{
    control.reset_progress();
    let mut rows: Vec<Vec<f32>> = vec![vec![0.0; n]; n];
    let bounds = slice_bounds(n, workers);
    debug!(n, workers, ?bounds, "matrix slices");

    if bounds.len() <= 2 {
        fill_slice(&mut rows, 0, true, control, &score);
    } else {
        std::thread::scope(|scope| {
            let mut rest: &mut [Vec<f32>] = &mut rows;
            for (k, window) in bounds.windows(2).enumerate() {
                let (chunk, tail) = std::mem::take(&mut rest).split_at_mut(window[1] - window[0]);
                rest = tail;
                if chunk.is_empty() {
                    continue;
                }
                let start = window[0];
                let score = &score;
                scope.spawn(move || fill_slice(chunk, start, k == 0, control, score));
            }
        });
    }

    if control.is_cancelled() {
        return None;
    }

    for i in 0..n {
        for j in 0..i {
            rows[j][i] = rows[i][j];
        }
    }
    control.publish(1.0);
    Some(DistanceMatrix { rows })
}

fn fill_slice<F>(chunk: &mut [Vec<f32>], start: usize, monitor: bool, control: &RunControl, score: &F)
where
    F: Fn(usize, usize) -> f32 + Sync,
{
    let end = start + chunk.len();
    let total = (end * end - start * start) as f64 / 2.0;
    let step = ((total / 1000.0) as usize).max(1);
    let mut done = 0usize;

    for (offset, row) in chunk.iter_mut().enumerate() {
        let i = start + offset;
        for (j, cell) in row.iter_mut().take(i).enumerate() {
            if control.is_cancelled() {
                return;
            }
            *cell = score(i, j);
            done += 1;
            if monitor && done % step == 0 {
                control.publish((done as f64 / total) as f32);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn slices_cover_every_pair_exactly_once() {
        for n in [0usize, 1, 2, 3, 7, 10, 64, 101] {
            for p in [1usize, 2, 3, 4, 8, 16, 200] {
                let bounds = slice_bounds(n, p);
                assert_eq!(bounds.len(), p + 1);
                assert_eq!(bounds[0], 0);
                assert_eq!(bounds[p], n);
                assert!(bounds.windows(2).all(|w| w[0] <= w[1]), "{bounds:?}");

                let mut seen = vec![0u8; n * n];
                for w in bounds.windows(2) {
                    for i in w[0]..w[1] {
                        for j in 0..i {
                            seen[i * n + j] += 1;
                        }
                    }
                }
                for i in 0..n {
                    for j in 0..i {
                        assert_eq!(seen[i * n + j], 1, "n={n} p={p} ({i},{j})");
                    }
                }
            }
        }
    }

    #[test]
    fn slices_balance_pair_counts() {
        let bounds = slice_bounds(1000, 4);
        let pairs: Vec<usize> = bounds
            .windows(2)
            .map(|w| (w[0]..w[1]).sum::<usize>())
            .collect();
        let max = *pairs.iter().max().unwrap() as f64;
        let min = *pairs.iter().min().unwrap() as f64;
        assert!(max / min < 1.02, "{pairs:?}");
    }

    #[test]
    fn parallel_fill_matches_serial_and_is_symmetric() {
        let score = |i: usize, j: usize| ((i * 31 + j * 17) % 97) as f32 / 97.0;
        let control = RunControl::new();
        let serial = compute_matrix(23, 1, &control, score).unwrap();
        let parallel = compute_matrix(23, 5, &control, score).unwrap();
        assert_eq!(serial, parallel);
        for i in 0..23 {
            for j in 0..23 {
                assert_eq!(parallel.get(i, j).to_bits(), parallel.get(j, i).to_bits());
            }
        }
        assert_eq!(control.progress(), 1.0);
    }

    #[test]
    fn only_the_lower_triangle_is_scored() {
        let calls = AtomicUsize::new(0);
        let control = RunControl::new();
        compute_matrix(40, 3, &control, |i, j| {
            assert!(j < i);
            calls.fetch_add(1, Ordering::Relaxed);
            0.5
        })
        .unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 40 * 39 / 2);
    }

    #[test]
    fn cancelling_mid_run_discards_the_matrix() {
        let control = RunControl::new();
        let handle = control.cancel_handle();
        let control = control.on_progress(move |p| {
            if p >= 0.2 {
                handle.cancel();
            }
        });
        let calls = AtomicUsize::new(0);
        let result = compute_matrix(100, 4, &control, |_, _| {
            calls.fetch_add(1, Ordering::Relaxed);
            std::thread::sleep(std::time::Duration::from_micros(50));
            0.25
        });
        assert!(result.is_none());
        assert!(control.is_cancelled());
        assert!(calls.load(Ordering::Relaxed) < 100 * 99 / 2);
    }

    #[test]
    fn reset_clears_cancellation_for_every_handle() {
        let control = RunControl::new();
        let handle = control.cancel_handle();
        handle.cancel();
        assert!(control.is_cancelled());
        assert!(compute_matrix(10, 2, &control, |_, _| 0.5).is_none());

        control.reset();
        assert!(!handle.is_cancelled());
        assert_eq!(control.progress(), 0.0);
        assert!(compute_matrix(10, 2, &control, |_, _| 0.5).is_some());
    }

    #[test]
    fn progress_never_decreases() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let control = RunControl::new().on_progress(move |p| {
            if let Ok(mut v) = sink.lock() {
                v.push(p);
            }
        });
        compute_matrix(60, 3, &control, |_, _| 0.0).unwrap();
        let seen = seen.lock().unwrap();
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.last().copied(), Some(1.0));
    }
}
