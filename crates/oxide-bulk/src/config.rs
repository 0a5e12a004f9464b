//! Executor configuration.

use oxide_bulk_core::{CompileOptions, DEFAULT_CHUNK_SIZE, MAX_BIND_PARAMS};
use serde::{Deserialize, Serialize};

/// Default prefix of staging table names.
pub const DEFAULT_STAGING_PREFIX: &str = "_oxide_bulk_stage";

/// Settings shared by every operation of a [`crate::BulkExecutor`].
///
/// Missing keys take their default when deserialized:
///
/// ```rust
/// use oxide_bulk::BulkConfig;
///
/// let config: BulkConfig = serde_json::from_str(r#"{"server_version": 150004}"#).unwrap();
/// assert_eq!(config.server_version, 150_004);
/// assert_eq!(config.max_params, 65_535);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkConfig {
    /// Above this many parameters a batch is sent as unnested arrays.
    pub max_params: usize,
    /// Bytes per COPY data message.
    pub copy_chunk_size: usize,
    /// Prefix of staging table names.
    pub staging_prefix: String,
    /// `server_version_num` statements are compiled for.
    pub server_version: u32,
}

impl Default for BulkConfig {
    fn default() -> Self {
        let options = CompileOptions::default();
        Self {
            max_params: MAX_BIND_PARAMS,
            copy_chunk_size: DEFAULT_CHUNK_SIZE,
            staging_prefix: String::from(DEFAULT_STAGING_PREFIX),
            server_version: options.server_version,
        }
    }
}

impl BulkConfig {
    /// Returns the compiler options of this configuration.
    #[must_use]
    pub const fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            max_params: self.max_params,
            server_version: self.server_version,
        }
    }
}
