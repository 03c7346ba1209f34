//! Entry module detection
//!
//! Once the bundler has sealed its module graph, the modules whose raw request
//! equals a configured entry path get a call appended that forwards their
//! `exports` object to the envelope's export helper.

use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    envelope::EXPORTS_HELPER,
    error::{Error, Result},
};

/// Entry name used when the configuration names a single unnamed entry
pub const DEFAULT_ENTRY_NAME: &str = "main";

/// The configured entry map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryPoints {
    /// A single path, treated as an entry named `main`
    Single(String),
    Named(IndexMap<String, String>),
}

impl EntryPoints {
    /// Iterate `(name, path)` pairs in configuration order
    pub fn iter(&self) -> Box<dyn Iterator<Item = (&str, &str)> + '_> {
        match self {
            Self::Single(path) => Box::new(std::iter::once((DEFAULT_ENTRY_NAME, path.as_str()))),
            Self::Named(map) => Box::new(map.iter().map(|(k, v)| (k.as_str(), v.as_str()))),
        }
    }
}

/// A module of the sealed graph, as far as entry detection is concerned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedModule {
    /// Request as written at the import site or in the entry configuration
    pub raw_request: Option<String>,
    /// Module source before the bundler assembles the chunk
    pub source: String,
}

impl SealedModule {
    pub fn new(raw_request: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            raw_request: Some(raw_request.into()),
            source: source.into(),
        }
    }
}

/// The statement appended to entry modules
pub fn forwarding_statement() -> String {
    format!("\n{EXPORTS_HELPER}(exports);")
}

/// Append the export-forwarding call to every module that matches an entry
///
/// Returns the names of the entries that matched. An entry without a matching
/// module is skipped with a warning, or fails the seal when `strict` is set.
pub fn mark_entry_modules(
    entries: &EntryPoints,
    modules: &mut [SealedModule],
    strict: bool,
) -> Result<Vec<String>> {
    let statement = forwarding_statement();
    let mut matched = Vec::new();

    for (name, path) in entries.iter() {
        let mut found = false;
        for module in modules
            .iter_mut()
            .filter(|m| m.raw_request.as_deref() == Some(path))
        {
            found = true;
            if module.source.ends_with(&statement) {
                continue;
            }
            module.source.push_str(&statement);
            debug!("Forwarding exports of entry '{name}' ({path})");
        }

        if found {
            matched.push(name.to_owned());
        } else if strict {
            return Err(Error::Seal {
                entry: name.to_owned(),
                path: path.to_owned(),
            });
        } else {
            warn!("Entry '{name}' ({path}) matched no module; its exports will not be forwarded");
        }
    }

    Ok(matched)
}
