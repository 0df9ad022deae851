use thiserror::Error;

/// Startup configuration errors
///
/// Raised once during initialization; the card catalogs and credentials are
/// validated before the first draw, never at draw time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,

    #[error("Invalid card catalog: {0}")]
    Catalog(String),
}

/// Interpretation-service errors
///
/// Every failure of a `generateContent` call collapses into one of these;
/// there is no partial result. The client never retries on its own.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server error ({status}): {message}")]
    Service { status: u16, message: String },

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    #[error("Response is missing required field '{0}'")]
    MissingField(&'static str),
}
