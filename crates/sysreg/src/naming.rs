//! Identifier derivation for externalized requests
//!
//! Every external request gets a JavaScript identifier that is used both by its
//! stub module and by the envelope's local binding. Names are derived from the
//! request text alone, so the same request always yields the same name.

use rustc_hash::FxHashSet;

/// Suffix appended to a derived name to form the envelope's local binding
pub const LOCAL_SUFFIX: &str = "Var";

/// Remove a loader prefix (`css!./style.css` -> `./style.css`)
///
/// Only the text before the first `!` is dropped; later `!` characters are kept
/// and handled like any other separator by [`derive_name`].
pub fn strip_loader_prefix(request: &str) -> &str {
    request.split_once('!').map_or(request, |(_, rest)| rest)
}

/// Derive a lower-camel-case identifier from an import request
///
/// The loader prefix is stripped and the remainder is split into words: on
/// every character that is not ASCII alphanumeric, and at case humps
/// (`reactDOM` -> `react`, `DOM`; `XMLHttp` -> `XML`, `Http`). Each word is
/// lowercased and all but the first are capitalized. The result never starts
/// with a digit and never contains a separator.
pub fn derive_name(request: &str) -> String {
    let stripped = strip_loader_prefix(request);
    let mut name = String::with_capacity(stripped.len());

    for word in stripped
        .split(|c: char| !c.is_ascii_alphanumeric())
        .flat_map(split_case_humps)
    {
        let mut chars = word.chars();
        let Some(first) = chars.next() else {
            continue;
        };
        if name.is_empty() {
            name.push(first.to_ascii_lowercase());
        } else {
            name.push(first.to_ascii_uppercase());
        }
        name.extend(chars.map(|c| c.to_ascii_lowercase()));
    }

    if name.is_empty() {
        return "dep".to_owned();
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// Split an ASCII alphanumeric run where a new word starts
fn split_case_humps(part: &str) -> Vec<&str> {
    let bytes = part.as_bytes();
    let mut words = Vec::new();
    let mut start = 0;
    for i in 1..bytes.len() {
        let (prev, cur) = (bytes[i - 1], bytes[i]);
        let hump = cur.is_ascii_uppercase()
            && (prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase()
                    && bytes.get(i + 1).is_some_and(u8::is_ascii_lowercase)));
        if hump {
            words.push(&part[start..i]);
            start = i;
        }
    }
    if start < part.len() {
        words.push(&part[start..]);
    }
    words
}

/// Name of the local variable the envelope binds a dependency to
pub fn local_binding(derived_name: &str) -> String {
    format!("{derived_name}{LOCAL_SUFFIX}")
}

/// Hands out derived names, disambiguating requests that collapse to the same name
///
/// `react-dom` and `react/dom` both derive `reactDom`; the second one to be
/// allocated becomes `reactDom2`.
#[derive(Debug, Default)]
pub struct NameAllocator {
    taken: FxHashSet<String>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, request: &str) -> String {
        let base = derive_name(request);
        if self.taken.insert(base.clone()) {
            return base;
        }

        let mut counter = 2usize;
        loop {
            let candidate = format!("{base}{counter}");
            if self.taken.insert(candidate.clone()) {
                log::debug!("Derived name '{base}' already taken, using '{candidate}' for '{request}'");
                return candidate;
            }
            counter += 1;
        }
    }
}
