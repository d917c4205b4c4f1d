//! A single-instance reactive state container.
//!
//! The whole application state is one immutable tree ([`Value`]). Every
//! change is an [`Action`] dispatched into the [`Store`], rewritten by
//! pre-processors, reduced by processors and published as a new snapshot.
//! Async processors turn an action into `::START`/`::NEXT`/`::ERROR`/
//! `::COMPLETE` lifecycle actions, and [`ScopedStore`] confines a consumer
//! to a sub-path.

pub mod action;
pub mod config;
pub mod error;
pub mod instance;
pub mod lifecycle;
pub mod logging;
pub mod notifier;
pub mod orchestrator;
pub mod path;
pub mod pipeline;
pub mod scope;
pub mod select;
pub mod store;
mod stream;
pub mod tree;

pub use action::{Action, Lifecycle, TypeFilter, Verb};
pub use config::{Config, ConfigError, LoggingConfig, StoreConfig};
pub use error::StoreError;
pub use instance::StoreContext;
pub use notifier::{PostAction, PostActionListener, Subscription};
pub use orchestrator::{AsyncHandle, AsyncProcessor, AsyncSource};
pub use path::{combine_paths, ensure_array, resolve_path, Path};
pub use pipeline::{Flow, Handle, HandlerCounts, HandlerId, IntoFlow, PreProcessor, Processor};
pub use scope::ScopedStore;
pub use select::SelectSettings;
pub use store::{Store, WeakStore};
pub use tree::Value;
