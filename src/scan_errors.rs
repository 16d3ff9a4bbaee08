use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid scan time range: start {start} must precede end {end}")]
    InvalidTimeRange { start: f64, end: f64 },

    #[error("Invalid window duration bounds: min {min}, max {max}")]
    InvalidDurationBounds { min: f64, max: f64 },

    #[error("Invalid minimum step size: {0}")]
    InvalidStep(f64),

    #[error("Invalid absolute time string: {0}")]
    InvalidTimeString(String),

    #[error("No detector data available for [{start}, {end}]")]
    DataUnavailable { start: f64, end: f64 },

    #[error("Output file already exists, refusing to overwrite: {0}")]
    OutputFileExists(String),

    #[error("Unknown spectrum label: {0}")]
    UnknownSpectrumLabel(String),

    #[error("Invalid sky prior weights: {0}")]
    InvalidPriorWeights(String),

    #[error("Sky grid step {0} degrees produced an empty grid")]
    EmptySkyGrid(f64),

    #[error("Response table shape mismatch: {0}")]
    ResponseShape(String),

    #[error("Background fit returned arrays of length {got}, expected {expected}")]
    FitShape { got: usize, expected: usize },

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),
}
