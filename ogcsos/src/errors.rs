use thiserror::Error;

#[derive(Error, Debug)]
pub enum SosError {
    #[error("SOS server answered HTTP status {status}: {body}")]
    Transport { status: u16, body: String },
    #[error("HTTP request failed: {0}")]
    Http(#[from] ureq::Error),
    #[error("{0} was not found")]
    NotFound(String),
    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),
    #[error("Cannot serialize request document: {0}")]
    Serialize(#[from] xmltree::Error),
}

impl SosError {
    pub fn not_found(what: &str) -> Self {
        SosError::NotFound(what.to_string())
    }

    pub fn invalid_time_range(message: &str) -> Self {
        SosError::InvalidTimeRange(message.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SosError>;
