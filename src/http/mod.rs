//! HTTP protocol layer module
//!
//! Range parsing, validator checks, content typing and multipart encoding,
//! independent of where the served bytes come from.

pub mod body;
pub mod cache;
pub mod conditional;
pub mod date;
pub mod mime;
pub mod multipart;
pub mod range;
pub mod response;
pub mod sniff;

// Re-export commonly used types
pub use body::ServeBody;
pub use range::{parse_range, ByteRange};
pub use response::{
    build_404_response, build_416_response, build_error_response, build_html_response,
    build_redirect_response, ResponseHead,
};
