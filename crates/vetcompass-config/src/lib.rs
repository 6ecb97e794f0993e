//! Configuration for VetCompass clients.
//!
//! Credentials and connection settings live in a small TOML file under the
//! user config directory, with environment variable overrides. See
//! [`client`] for the file format.

pub mod client;
pub mod error;

pub use client::{
    client_config_path, config_dir, load_client_config, load_client_config_file,
    load_client_config_from, save_client_config_to, ClientConfig, ResolvedConfig,
    BASE_URL_ENV, CLIENT_ID_ENV, CONFIG_DIR_ENV, SHARED_SECRET_ENV, TIMEOUT_MS_ENV,
};
pub use error::{ConfigError, Result};
