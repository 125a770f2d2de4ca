mod analysis;
mod cluster;
mod compress;
mod error;
mod load;
mod matrix;
mod metric;
mod outlier;
mod submission;
mod tokenize;
mod types;
mod util;

pub use analysis::{Analysis, AnalysisRecord, RECORD_VERSION, RunState};

pub use cluster::{Dendrogram, Linkage, Node, NodeId};

pub use compress::{
    COMPRESSOR_NAMES, Compressor, FlateCompressor, FlateFormat, TarArchiver, ZstdCompressor,
    compressor_by_name,
};

pub use error::{CompressError, Error, MetricError, Result, TokenizeError};

pub use load::load_submissions;

pub use matrix::{CancelHandle, DistanceMatrix, RunControl, slice_bounds};

pub use metric::{
    FAILED_SCORE, Metric, MetricDescriptor, MetricRecord, Ncd, NcdInput, TokenFrequency, Variance,
    metric_from_record, metric_kinds,
};

pub use outlier::{
    DEFAULT_ALPHAS, EPSILON, GaussianPool, Interpolator, analytic_k, hampel, hampel_thresholds,
    hampel_with_k, madn, median, montecarlo_grid, montecarlo_k, percentile,
};

pub use submission::{Annotation, Label, Source, Submission, SubmissionStore, Value, strip_extension};

pub use tokenize::{CodeTokenizer, TOKENIZER_NAMES, Tokenizer, WhitespaceTokenizer, tokenizer_by_name};

pub use types::{
    AnalysisOptions, DEFAULT_MAX_FILE_SIZE_BYTES, LoadOptions, LoadOutcome, LoadStats, PairResult,
    default_ignore_dirs,
};
