use thiserror::Error;

#[derive(Error, Debug)]
pub enum CavityError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid mechanical mode spec: {0}")]
    InvalidModeSpec(String),

    #[error("Invalid sample time: Ts={0} (must be finite and > 0)")]
    InvalidSampleTime(f64),

    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Solver diverged at iteration {iteration}: {message}")]
    SolverDiverged { iteration: usize, message: String },

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("Linear algebra error: {0}")]
    LinAlg(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CavityResult<T> = Result<T, CavityError>;
