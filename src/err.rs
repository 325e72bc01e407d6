//! Error kinds for the `matesv` caller (spec §7).

/// Top-level, fatal error kinds. All of these abort the run with exit code 1.
#[derive(thiserror::Error, Debug, Clone)]
pub enum CallerError {
    /// Missing or invalid command line flags / configuration values.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The mask file could not be read or parsed.
    #[error("could not load mask file: {0}")]
    MaskLoadError(String),

    /// The external aligner/decoder collaborator produced no records, or the
    /// record stream terminated abnormally.
    #[error("aligner IO error: {0}")]
    AlignerIOError(String),

    /// Background-noise threshold could not be satisfied at any `sigma <= 3`.
    #[error("poor library: {0}")]
    PoorLibraryError(String),

    /// The inferred inward and outward insert-size intervals overlap (or are
    /// not discrete).
    #[error("non-deconvolvable library: {0}")]
    NonDeconvolvableLibraryError(String),
}

/// Non-fatal per-record condition. Callers count these and log an advisory
/// line; they are never propagated as an `Err`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("malformed record: {0}")]
pub struct MalformedRecord(pub String);
