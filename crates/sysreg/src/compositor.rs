//! Per-chunk envelope application
//!
//! Runs after the bundler has emitted its chunks. Only initial (entry) chunks
//! are wrapped; lazily loaded split chunks are left alone.

use std::borrow::Cow;

use indexmap::IndexMap;
use log::{debug, warn};
use regex::{Captures, Regex};

use crate::{
    envelope::{Envelope, PUBLIC_PATH_VAR},
    error::{Error, Result},
};

/// Emitted text keyed by output file name
pub type Assets = IndexMap<String, String>;

/// An emitted chunk as reported by the bundler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub name: String,
    /// Entry chunk, as opposed to a lazily loaded one
    pub initial: bool,
    /// Output files belonging to this chunk
    pub files: Vec<String>,
}

impl Chunk {
    pub fn initial(name: impl Into<String>, files: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            initial: true,
            files: files.into_iter().map(Into::into).collect(),
        }
    }

    pub fn lazy(name: impl Into<String>, files: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            initial: false,
            ..Self::initial(name, files)
        }
    }
}

/// Replace the bundler runtime's hard-coded public path with the negotiated one
///
/// `pattern` must capture the assignment target as `target`. Only the first
/// assignment is replaced. Returns `None` when the chunk has no assignment.
pub fn override_public_path<'a>(pattern: &Regex, chunk: &'a str) -> Option<Cow<'a, str>> {
    if !pattern.is_match(chunk) {
        return None;
    }
    Some(pattern.replacen(chunk, 1, |caps: &Captures<'_>| {
        format!("{} = {PUBLIC_PATH_VAR};", &caps["target"])
    }))
}

/// Wraps chunk assets in the registration envelope
#[derive(Debug, Clone)]
pub struct Compositor {
    envelope: Envelope,
    bootstrap_pattern: Option<Regex>,
}

impl Compositor {
    /// `bootstrap_pattern` is only consulted when the envelope negotiates a public path
    pub fn new(envelope: Envelope, bootstrap_pattern: Option<Regex>) -> Self {
        Self {
            envelope,
            bootstrap_pattern,
        }
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Wrap one emitted file
    pub fn wrap(&self, file: &str, text: &str) -> String {
        let body = match (&self.bootstrap_pattern, self.envelope.public_path) {
            (Some(pattern), true) => override_public_path(pattern, text).unwrap_or_else(|| {
                warn!("No public path assignment found in {file}; leaving it unchanged");
                Cow::Borrowed(text)
            }),
            _ => Cow::Borrowed(text),
        };
        self.envelope.wrap(&body)
    }

    /// Wrap every file of every initial chunk, returning the number of files wrapped
    pub fn compose(&self, chunks: &[Chunk], assets: &mut Assets) -> Result<usize> {
        let mut wrapped = 0;
        for chunk in chunks.iter().filter(|chunk| chunk.initial) {
            for file in &chunk.files {
                let Some(text) = assets.get_mut(file) else {
                    return Err(Error::MissingAsset {
                        chunk: chunk.name.clone(),
                        file: file.clone(),
                    });
                };
                *text = self.wrap(file, text);
                wrapped += 1;
                debug!("Wrapped {file} of chunk '{}'", chunk.name);
            }
        }
        Ok(wrapped)
    }
}
