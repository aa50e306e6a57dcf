//! Configuration management for treepack.
//!
//! Options come from command-line arguments via clap, with environment
//! variable fallbacks using the `TREEPACK_` prefix and defaults for all
//! optional settings.
//!
//! # Commands
//!
//! - `serve` - Run the item ingestion HTTP service
//! - `inspect` - Decode an encoded document and print its outline
//!
//! # Environment Variables
//!
//! - `TREEPACK_HOST` - Server bind address (default: 0.0.0.0)
//! - `TREEPACK_PORT` - Server port (default: 3000)
//! - `TREEPACK_STORAGE_DIR` - Item storage directory (default: in-memory)
//! - `TREEPACK_FETCH_TIMEOUT` - Upstream request timeout in seconds (default: 60)
//! - `TREEPACK_BACKENDS` - Array compression preference, comma-separated (default: zstd)
//! - `TREEPACK_NO_IMAGE_PATH` - Disable the image path for large arrays
//! - `TREEPACK_IMAGE_FORMAT` - Still-image format, png or jpeg (default: jpeg)
//! - `TREEPACK_JPEG_QUALITY` - JPEG quality (default: 95)
//! - `TREEPACK_CORS_ORIGINS` - Allowed CORS origins, comma-separated

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::codec::{EncodeOptions, ImageFormat, ImageOptions, DEFAULT_JPEG_QUALITY};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default upstream request timeout in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;

/// Default array compression preference.
pub const DEFAULT_BACKENDS: &str = "zstd";

/// Default still-image format for the image path.
pub const DEFAULT_IMAGE_FORMAT: &str = "jpeg";

// =============================================================================
// CLI
// =============================================================================

/// treepack - self-describing JSON codec for value trees.
#[derive(Parser, Debug, Clone)]
#[command(name = "treepack")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the item ingestion HTTP service.
    Serve(ServeConfig),

    /// Decode an encoded document and print an outline of its tree.
    Inspect(InspectConfig),
}

// =============================================================================
// Serve
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "TREEPACK_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "TREEPACK_PORT")]
    pub port: u16,

    // =========================================================================
    // Storage and Transport
    // =========================================================================
    /// Directory for stored items.
    ///
    /// If not specified, items are kept in memory and lost on exit.
    #[arg(long, env = "TREEPACK_STORAGE_DIR")]
    pub storage_dir: Option<PathBuf>,

    /// Timeout for upstream document downloads, in seconds.
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT_SECS, env = "TREEPACK_FETCH_TIMEOUT")]
    pub fetch_timeout: u64,

    // =========================================================================
    // Encoding
    // =========================================================================
    /// Array compression backends in order of preference (zlib, lz4, zstd).
    #[arg(
        long,
        default_value = DEFAULT_BACKENDS,
        env = "TREEPACK_BACKENDS",
        value_delimiter = ','
    )]
    pub backends: Vec<String>,

    /// Store large arrays losslessly instead of through the image path.
    #[arg(long, default_value_t = false, env = "TREEPACK_NO_IMAGE_PATH")]
    pub no_image_path: bool,

    /// Still-image format for the image path (png or jpeg).
    #[arg(long, default_value = DEFAULT_IMAGE_FORMAT, env = "TREEPACK_IMAGE_FORMAT")]
    pub image_format: String,

    /// JPEG quality for the image path (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "TREEPACK_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "TREEPACK_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.fetch_timeout == 0 {
            return Err("fetch_timeout must be greater than 0".to_string());
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }

        if let Some(ref dir) = self.storage_dir {
            if dir.as_os_str().is_empty() {
                return Err("storage_dir must not be empty".to_string());
            }
        }

        self.encode_options().map(|_| ())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn fetch_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout)
    }

    /// Encoding options for deployed items.
    pub fn encode_options(&self) -> Result<EncodeOptions, String> {
        let backends = EncodeOptions::parse_backends(&self.backends).map_err(|e| e.to_string())?;
        let options = EncodeOptions::fallback().with_backends(backends);

        if self.no_image_path {
            return Ok(options);
        }

        let format = self
            .image_format
            .parse::<ImageFormat>()
            .map_err(|e| e.to_string())?;
        Ok(options.with_image(ImageOptions::new(format, self.jpeg_quality)))
    }
}

// =============================================================================
// Inspect
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct InspectConfig {
    /// Path or http(s) URL of an encoded JSON document.
    pub source: String,

    /// Timeout for URL downloads, in seconds.
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl InspectConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.source.trim().is_empty() {
            return Err("A document path or URL is required".to_string());
        }
        if self.timeout == 0 {
            return Err("timeout must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Whether the source should be downloaded rather than read from disk.
    pub fn is_url(&self) -> bool {
        self.source.starts_with("http://") || self.source.starts_with("https://")
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

// =============================================================================
// Tests
// =============================================================================
