//! Wrap bundler output in a SystemJS `System.register` envelope
//!
//! Import requests matching the configured rules are redirected to stub modules
//! during resolution, so the bundle does not contain them. The emitted entry
//! chunks are wrapped in an envelope that declares those requests as loader
//! dependencies, binds them through setters and forwards the entry module's
//! exports to the loader.

pub mod classifier;
pub mod compositor;
pub mod config;
pub mod dirs;
pub mod entry;
pub mod envelope;
pub mod error;
pub mod interceptor;
pub mod naming;
pub mod pipeline;
pub mod stub;

pub use error::{ConfigError, Error, Result};
pub use pipeline::{BuildSummary, Pipeline};
