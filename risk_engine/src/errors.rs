use market_data_ingestor::providers::ProviderError;
use thiserror::Error;

use crate::volatility::ModelFitError;

/// The market data for an asset could not be obtained or is unusable.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// The provider call itself failed (unreachable, timeout, rate limit, API error).
    #[error("provider request failed: {0}")]
    Provider(#[from] ProviderError),

    /// The provider answered but had no bars for the symbol.
    #[error("provider returned no bars")]
    Empty,

    #[error("insufficient history: {got} bars, need at least {need}")]
    InsufficientHistory { got: usize, need: usize },

    #[error("malformed price series: {0}")]
    Malformed(String),
}

/// Step of the per-asset pipeline a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Forecast,
}

/// Any failure that sends an asset down the fallback path.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error("volatility model failed: {0}")]
    ModelFit(#[from] ModelFitError),
}

impl AnalysisError {
    pub fn stage(&self) -> Stage {
        match self {
            AnalysisError::Acquisition(_) => Stage::Fetch,
            AnalysisError::ModelFit(_) => Stage::Forecast,
        }
    }
}
