use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("event stream: {0}")]
    Stream(String),
}

pub type Result<T> = std::result::Result<T, Error>;
