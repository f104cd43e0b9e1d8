use thiserror::Error;

pub type Result<T> = std::result::Result<T, GoogleError>;

#[derive(Debug, Error)]
pub enum GoogleError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Geocoding answered 200 but with a non-`OK` status (e.g. `ZERO_RESULTS`).
    #[error("Geocoding status {status}: {message}")]
    Status { status: String, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for GoogleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GoogleError::Parse(err.to_string())
        } else {
            GoogleError::Network(err.to_string())
        }
    }
}
