use thiserror::Error;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response from history endpoint")]
    InvalidResponse,
}
