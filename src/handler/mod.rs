//! Request handler module
//!
//! Maps requests onto the served root: path lookup and redirects, directory
//! listings, and conditional or partial file content.

pub mod content;
pub mod listing;
pub mod router;
pub mod static_files;

// Re-export main entry point
pub use router::handle_request;
