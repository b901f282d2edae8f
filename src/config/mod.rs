// Configuration module entry point
// Loads typed configuration and builds the shared application state

mod state;
mod types;

use crate::logger::LogLevel;
use std::net::SocketAddr;
use std::path::Path;

// Re-export public types
pub use state::AppState;
pub use types::{
    Config, HttpConfig, ListingConfig, LoggingConfig, PerformanceConfig, ServerConfig,
};

/// Default server name, also shown in listing footers
pub fn default_server_name() -> String {
    format!("Helix FileServer/{}", env!("CARGO_PKG_VERSION"))
}

impl Config {
    /// Load configuration from specified file path (without extension)
    ///
    /// The file is optional; `FILESERVER__SECTION__KEY` environment variables
    /// override it, and every key has a default.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("FILESERVER")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 4545)?
            .set_default("server.root", ".")?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive", true)?
            .set_default("performance.read_timeout", 30)?
            .set_default("http.server_name", default_server_name())?
            .set_default("http.etag", true)?
            .set_default("http.ignore_overlong_ranges", true)?
            .set_default("listing.enabled", true)?
            .set_default("listing.show_hidden", false)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    /// Reject settings the server cannot start with
    pub fn validate(&self) -> Result<(), String> {
        let root = Path::new(&self.server.root);
        if !root.is_dir() {
            return Err(format!(
                "Root directory '{}' does not exist or is not a directory",
                self.server.root
            ));
        }
        self.logging.level.parse::<LogLevel>()?;
        if self.server.workers == Some(0) {
            return Err("server.workers must be at least 1".to_string());
        }
        Ok(())
    }

    /// Default configuration serving `root`, for tests
    #[cfg(test)]
    pub fn for_root(root: &Path) -> Self {
        let mut config = Self::load_from("fileserver-test-no-such-config").unwrap();
        config.server.root = root.to_string_lossy().into_owned();
        config
    }
}
