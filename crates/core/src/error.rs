use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed metric key: {0:?}")]
    MalformedKey(String),
    #[error("unknown metric kind: {0}")]
    UnknownMetric(String),
    #[error("unknown tokenizer: {0}")]
    UnknownTokenizer(String),
    #[error("unknown compressor: {0}")]
    UnknownCompressor(String),
    #[error("invalid configuration for {kind} metric: {message}")]
    InvalidConfig { kind: String, message: String },
    #[error("no execution order satisfies the dependencies of: {}", .pending.join(", "))]
    UnsatisfiableDependencies { pending: Vec<String> },
    #[error("metric {0} is already applied")]
    AlreadyApplied(String),
    #[error("unsupported alpha {0}: only 0.01 and 0.05 are tabulated")]
    UnsupportedAlpha(f64),
    #[error("sample is empty")]
    EmptySample,
    #[error("invalid interpolation grid: {0}")]
    InvalidGrid(String),
    #[error("coordinate {value} lies outside the grid on axis {axis}")]
    OffGrid { axis: usize, value: f64 },
    #[error("duplicate submission id: {0}")]
    DuplicateSubmission(String),
    #[error("expected {expected} labels, got {got}")]
    LabelCount { expected: usize, got: usize },
    #[error("no results available for key {0}")]
    MissingResults(String),
    #[error("preprocessing {key} failed for submission {submission}: {source}")]
    Preprocess {
        submission: String,
        key: String,
        #[source]
        source: MetricError,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single preprocessing or scoring step.
#[derive(Error, Debug)]
pub enum MetricError {
    #[error("side-table key {0} is missing")]
    MissingKey(String),
    #[error("side-table key {key} holds {found}, expected {expected}")]
    WrongType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("row {key} has no column {index}")]
    MissingColumn { key: String, index: usize },
    #[error("base score under {key} is a failure sentinel")]
    FailedBase { key: String },
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),
    #[error(transparent)]
    Compress(#[from] CompressError),
}

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("operation not supported by the {0} compressor")]
    NotSupported(&'static str),
    #[error("compressor IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot tokenize {file}: {message}")]
pub struct TokenizeError {
    pub file: String,
    pub message: String,
}
