// Application state module
// Immutable state shared by every connection

use std::path::PathBuf;

use super::types::Config;
use crate::handler::listing::{category_for_extension, Listing};

/// Application state, built once at start-up
pub struct AppState {
    pub config: Config,
    /// Canonical form of `server.root`, when it resolves
    pub root: PathBuf,
    pub listing: Listing,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let root = PathBuf::from(&config.server.root);
        let root = root.canonicalize().unwrap_or(root);
        let listing = Listing::new(
            config.http.server_name.clone(),
            config.listing.show_hidden,
            category_for_extension,
        );

        Self {
            config: config.clone(),
            root,
            listing,
        }
    }
}
