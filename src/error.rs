use thiserror::Error;

/// The crate's unified error taxonomy.
///
/// `Config` and `Fatal` abort a run; `Malformed`/`WindowUnderflow` are
/// recovered by the caller (dropped, counted, processing continues) and
/// should never propagate out of the ingestion layer.
#[derive(Error, Debug)]
pub enum CepError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("malformed event: {0}")]
    Malformed(String),

    #[error("window underflow: event start_time precedes previous event's")]
    WindowUnderflow,

    #[error("internal invariant violation: {0}")]
    Fatal(String),
}

pub type Result<T> = std::result::Result<T, CepError>;
