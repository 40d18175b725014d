//! Save service configuration.

use std::path::PathBuf;

use serde::Deserialize;

/// Expected `_version` of the definition source.
pub const EXPECTED_DEFINITIONS_VERSION: &str = "4.0";

/// Expected checksum of the shipped definition source.
pub const EXPECTED_DEFINITIONS_CHECKSUM: &str = "dd74550b6c99afee2c15b5d33c03c962725a239e";

/// Save service configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SaveServiceConfig {
    /// Installation home; relative definition paths resolve against it
    pub home: PathBuf,
    /// Definition source file, relative to `home` unless absolute
    pub definitions_file: PathBuf,
    /// Version the running code expects in `_version`
    pub expected_version: String,
    /// Checksum the running code expects for the definition source (None = skip)
    pub expected_checksum: Option<String>,
    /// Charset used when the definitions declare no `_file_encoding`
    pub default_encoding: String,
    /// Producing application version written into test plan envelopes
    pub application_version: String,
}

impl SaveServiceConfig {
    /// Full path of the definition source.
    pub fn definitions_path(&self) -> PathBuf {
        if self.definitions_file.is_absolute() {
            self.definitions_file.clone()
        } else {
            self.home.join(&self.definitions_file)
        }
    }
}

impl Default for SaveServiceConfig {
    fn default() -> Self {
        Self {
            home: PathBuf::from("."),
            definitions_file: PathBuf::from("bin/saveservice.properties"),
            expected_version: EXPECTED_DEFINITIONS_VERSION.to_string(),
            expected_checksum: Some(EXPECTED_DEFINITIONS_CHECKSUM.to_string()),
            default_encoding: "UTF-8".to_string(),
            application_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
