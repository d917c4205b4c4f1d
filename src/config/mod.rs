//! Configuration for the store and the `treestore` binary.

mod loader;
mod types;

pub use loader::ConfigError;
pub use types::{Config, LoggingConfig, StoreConfig};
