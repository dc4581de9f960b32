//! Merge rules: built-in defaults, lowest precedence of every layer.

use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

pub const DEFAULT_STORE_PATH: &str = ".movetree/store";
pub const DEFAULT_PUSH_BATCH_LIMIT: i64 = 64;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("replica.peer_id", 1_i64)?
        .set_default("replica.peers", Vec::<i64>::new())?
        .set_default("replica.store_path", DEFAULT_STORE_PATH)?
        .set_default("replica.push_batch_limit", DEFAULT_PUSH_BATCH_LIMIT)
}
