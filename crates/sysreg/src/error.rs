//! Error types shared by every pipeline stage
//!
//! Configuration problems are reported before any build work starts. Everything
//! after that is fatal for the build: there is no partial-success mode.

use std::path::PathBuf;

use thiserror::Error;

/// Malformed or contradictory options, detected while validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("systemjsDeps entry {index} is an empty string")]
    EmptyDependency { index: usize },

    #[error("systemjsDeps entry {index} has an invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        index: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("publicPath.useSystemJSLocateDir requires registerName to be set")]
    PublicPathWithoutRegisterName,

    #[error("invalid publicPath.bootstrapPattern `{pattern}`: {source}")]
    InvalidBootstrapPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("publicPath.bootstrapPattern `{0}` has no capture group named `target`")]
    BootstrapPatternWithoutTarget(String),

    #[error("registerName must not be empty")]
    EmptyRegisterName,

    #[error("registerName `{0}` contains a quote, backslash or line break")]
    UnquotableRegisterName(String),

    #[error("SystemJS dependency '{0}' cannot also be a bundler external")]
    ExternalCollision(String),

    #[error("registerName '{0}' collides with a bundler external of the same name")]
    RegisterNameCollision(String),

    #[error("invalid value `{value}` for environment variable {name}")]
    InvalidEnv { name: &'static str, value: String },
}

/// Any fatal error raised while running the pipeline
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Writing a stub artifact failed; the build cannot continue
    #[error("failed to synthesize stub for '{request}' at {path}: {source}")]
    Resolution {
        request: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Only raised when `strictEntries` is enabled
    #[error("entry '{entry}' ({path}) does not match any module in the graph")]
    Seal { entry: String, path: String },

    #[error("chunk '{chunk}' lists file '{file}' which has no emitted asset")]
    MissingAsset { chunk: String, file: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
