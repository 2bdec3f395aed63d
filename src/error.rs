use thiserror::Error;

/// Failure of a single relay call. Every variant is terminal for that call.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("no API key configured; set `openai_api_key` in config.toml or {0}")]
    MissingApiKey(&'static str),

    #[error("could not reach the model service: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model service returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed response from the model service: {0}")]
    MalformedResponse(String),
}

impl RelayError {
    /// Whether the failure happened before any network traffic
    pub fn is_configuration(&self) -> bool {
        matches!(self, RelayError::MissingApiKey(_))
    }
}

/// Failure to turn a local file into an attachable image
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("could not read image file '{0}': {1}")]
    Io(String, #[source] std::io::Error),

    #[error("unsupported image format for file '{0}'")]
    UnsupportedFormat(String),

    #[error("could not decode image '{0}': {1}")]
    Decode(String, String),

    #[error("could not encode image: {0}")]
    Encode(String),

    #[error("image '{0}' is {1} bytes after re-encoding, above the {2} byte limit")]
    TooLarge(String, usize, usize),
}
