use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Domain error: {0}")]
    Domain(String),

    #[error("Computation diverged: {0}")]
    Diverged(String),

    #[error("Precision error: {0}")]
    Precision(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Experiment interrupted before any trial completed")]
    Interrupted,

    #[error("{0} worker thread(s) panicked")]
    WorkerFailed(usize),

    #[error("Recovered state does not match the initial state")]
    Mismatch,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
