use ringfinder_core::FieldError;

/// Errors returned by the vote accumulator.
#[derive(thiserror::Error, Debug)]
pub enum HoughError {
    #[error("vote accumulation needs a 2-dimensional mask, got {ndim} dimensions")]
    MaskRank { ndim: usize },
    #[error("radius step must be >= 1")]
    ZeroStep,
    #[error("minimum radius must be >= 1")]
    ZeroRadius,
    #[error("vote volume of shape {dims:?} does not end in {bins} radius bins")]
    VolumeShape { dims: Vec<usize>, bins: usize },
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    Field(#[from] FieldError),
}

/// Errors returned by ring detectors and ring statistics.
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error("circle thickness must be finite and >= 1 (got {0})")]
    InvalidThickness(f64),
    #[error("sensitivity ceiling must be finite and > 0 (got {0})")]
    InvalidSensitivity(f64),
    #[error("ring has {ring} coordinates but the channel has {channel} dimensions")]
    DimensionMismatch { ring: usize, channel: usize },
    #[error("extremum search worker for chunk {chunk} failed")]
    WorkerFailed { chunk: usize },
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    Field(#[from] FieldError),
}
