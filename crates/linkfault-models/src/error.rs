use std::error::Error;
use std::fmt;
use std::io;

pub type Result<T> = std::result::Result<T, EvalError>;

/// Errors raised by the evaluation harness.
#[derive(Debug)]
pub enum EvalError {
    LengthMismatch { left: usize, right: usize },
    /// `validate` was given only one of X and y.
    PartialOverride,
    ZeroDivision(&'static str),
    UndefinedMetric(&'static str),
    MissingSnapshotPath,
    /// The model was loaded from a snapshot and carries no train/test split.
    NoDataset,
    InsufficientSamples { requested: usize, available: usize },
    /// Input columns differ from the ones the predictor was trained on.
    FeatureMismatch { expected: Vec<String>, found: Vec<String> },
    UnsupportedOption(String),
    InvalidSplit(String),
    EmptyParamGrid,
    Fit(String),
    /// Attributions could not be computed for the given rows.
    Explain(String),
    Serialization(String),
    Io(io::Error),
    Csv(csv::Error),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EvalError::LengthMismatch { left, right } => {
                write!(f, "Length mismatch: {} rows vs {} rows", left, right)
            }
            EvalError::PartialOverride => {
                write!(f, "X and y must both be given or both be omitted")
            }
            EvalError::ZeroDivision(metric) => write!(f, "Division by zero computing {}", metric),
            EvalError::UndefinedMetric(reason) => write!(f, "Metric undefined: {}", reason),
            EvalError::MissingSnapshotPath => write!(
                f,
                "Bad use of the ModelDriver API: without a model a snapshot file must be given"
            ),
            EvalError::NoDataset => write!(f, "Model has no train/test split attached"),
            EvalError::InsufficientSamples {
                requested,
                available,
            } => write!(
                f,
                "Requested {} benchmark samples but the test split holds {}",
                requested, available
            ),
            EvalError::FeatureMismatch { expected, found } => write!(
                f,
                "Feature columns [{}] do not match the trained columns [{}]",
                found.join(", "),
                expected.join(", ")
            ),
            EvalError::UnsupportedOption(msg) => write!(f, "Unsupported option: {}", msg),
            EvalError::InvalidSplit(msg) => write!(f, "Invalid split: {}", msg),
            EvalError::EmptyParamGrid => write!(f, "Parameter grid has no candidates"),
            EvalError::Fit(msg) => write!(f, "Failed to fit predictor: {}", msg),
            EvalError::Explain(msg) => write!(f, "Failed to explain predictions: {}", msg),
            EvalError::Serialization(msg) => write!(f, "Serialization failed: {}", msg),
            EvalError::Io(e) => write!(f, "I/O error: {}", e),
            EvalError::Csv(e) => write!(f, "CSV error: {}", e),
        }
    }
}

impl Error for EvalError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EvalError::Io(e) => Some(e),
            EvalError::Csv(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for EvalError {
    fn from(e: io::Error) -> Self {
        EvalError::Io(e)
    }
}

impl From<csv::Error> for EvalError {
    fn from(e: csv::Error) -> Self {
        EvalError::Csv(e)
    }
}

impl From<serde_json::Error> for EvalError {
    fn from(e: serde_json::Error) -> Self {
        EvalError::Serialization(e.to_string())
    }
}
