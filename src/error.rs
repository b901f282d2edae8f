//! Error types for content serving

use hyper::StatusCode;
use thiserror::Error;

/// Result type for serving operations
pub type Result<T> = std::result::Result<T, ServeError>;

/// Failures that can occur while answering a file request.
///
/// Everything here is decided before the response head is handed to hyper,
/// so each variant maps onto exactly one status code.
#[derive(Error, Debug)]
pub enum ServeError {
    /// Malformed or inconsistent Range header
    #[error("invalid range")]
    InvalidRange,

    /// Requested ranges add up to more than the resource itself
    #[error("requested ranges exceed resource size")]
    OverlongRangeSet,

    /// Content source could not be repositioned
    #[error("seeker can't seek: {0}")]
    SeekFailed(#[source] std::io::Error),

    /// Size of the content source could not be determined
    #[error("size unavailable: {0}")]
    SizeUnavailable(#[source] std::io::Error),

    /// Resource does not exist or cannot be opened
    #[error("not found")]
    NotFound,
}

impl ServeError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRange | Self::OverlongRangeSet => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::SeekFailed(_) | Self::SizeUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }
}
