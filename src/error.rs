//! Error types for the tempo estimation engine

use thiserror::Error;

/// Errors that can occur during tempo analysis
///
/// Every variant is a fail-fast condition: the engine performs no I/O and
/// never returns partial results. Degenerate-but-valid input (empty signal,
/// no candidates) is reported through empty results instead.
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    /// Invalid input parameters (precondition violation)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Processing error during analysis
    #[error("Processing error: {0}")]
    ProcessingError(String),

    /// Numerical error (overflow, non-finite values, etc.)
    #[error("Numerical error: {0}")]
    NumericalError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnalysisError::InvalidInput("negative ODF value".to_string());
        assert_eq!(err.to_string(), "Invalid input: negative ODF value");

        let err = AnalysisError::ProcessingError("worker failed".to_string());
        assert!(err.to_string().starts_with("Processing error"));
    }
}
