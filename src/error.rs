use thiserror::Error;

pub type Result<T> = std::result::Result<T, DiffusionMapError>;

/// Errors arising while building or applying a diffusion map.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DiffusionMapError {
    #[error("at least {expected} points are required, but only {found} were provided")]
    InsufficientData { expected: usize, found: usize },
    #[error("the density exponent alpha must lie in [0, 1]")]
    AlphaOutOfRange,
    #[error("the number of neighbours must be positive")]
    NeighboursZero,
    #[error("the number of eigenpairs must be positive")]
    EvecsZero,
    #[error("a fixed kernel bandwidth must be positive")]
    NonPositiveBandwidth,
    #[error("the eigensolver iteration budget must be positive")]
    MaxIterationsZero,
    #[error("the power extension step budget must be positive")]
    ExtensionStepsZero,
    #[error("the change of measure is negative or non-finite at point {0}")]
    InvalidMeasure(usize),
    #[error("the eigensolver did not produce a decomposition within its iteration budget")]
    NoConvergence,
    #[error("the power extension did not settle within {0} steps")]
    ExtensionDiverged(usize),
    #[error(transparent)]
    LinalgError(#[from] linfa_linalg::LinalgError),
    #[error(transparent)]
    NearestNeighbourError(#[from] linfa_nn::NnError),
    #[error(transparent)]
    NearestNeighbourBuildError(#[from] linfa_nn::BuildError),
    #[error(transparent)]
    LinfaError(#[from] linfa::error::Error),
}
