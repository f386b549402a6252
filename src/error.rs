use thiserror::Error;

pub type Result<T> = core::result::Result<T, TuneError>;

/// Failures of the outer surfaces: reading topology descriptions and
/// persisting snapshots. The cost model itself never fails.
#[derive(Debug, Error)]
pub enum TuneError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Invalid topology: {reason}")]
    InvalidTopology { reason: String },
}
