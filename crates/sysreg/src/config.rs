//! Configuration loading and validation
//!
//! Options are assembled from several layers, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. the user config file (`$XDG_CONFIG_HOME/sysreg/sysreg.toml`)
//! 3. the project config file (`--config` or `./sysreg.toml`)
//! 4. `SYSREG_*` environment variables
//! 5. command line flags
//!
//! Each layer is a [`ConfigLayer`] whose unset fields fall through to the layer
//! below. The merged [`RegistrationOptions`] are validated exactly once, before
//! any build work starts, into [`ValidatedOptions`].

use std::{
    fs,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    classifier::{Classifier, ExternalizationRule, MatchMode},
    dirs,
    entry::EntryPoints,
    error::ConfigError,
    stub::StubStoreKind,
};

/// Matches webpack's runtime assignment `__webpack_require__.p = "...";`
pub const DEFAULT_BOOTSTRAP_PATTERN: &str =
    r#"(?P<target>__webpack_require__\.p)\s*=\s*(?:"[^"]*"|'[^']*');?"#;

/// One `systemjsDeps` entry as written in the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DepRule {
    Literal(String),
    Pattern { pattern: String },
}

/// `[publicPath]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PublicPathLayer {
    #[serde(rename = "useSystemJSLocateDir")]
    pub use_systemjs_locate_dir: Option<bool>,
    pub bootstrap_pattern: Option<String>,
}

/// One configuration source; unset fields defer to lower layers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigLayer {
    pub register_name: Option<String>,
    pub systemjs_deps: Option<Vec<DepRule>>,
    pub minify: Option<bool>,
    pub public_path: Option<PublicPathLayer>,
    pub match_mode: Option<MatchMode>,
    pub strict_entries: Option<bool>,
    pub interop: Option<bool>,
    pub stub_store: Option<StubStoreKind>,
    pub entry: Option<EntryPoints>,
    pub externals: Option<IndexMap<String, String>>,
}

impl ConfigLayer {
    /// Parse a layer from TOML text
    pub fn parse(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded configuration layer from {}", path.display());
        Self::parse(&text, path)
    }

    /// Read the `SYSREG_*` variables through `lookup`
    pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut layer = Self {
            register_name: lookup("SYSREG_REGISTER_NAME"),
            ..Self::default()
        };
        if let Some(value) = lookup("SYSREG_MINIFY") {
            layer.minify = Some(parse_bool("SYSREG_MINIFY", &value)?);
        }
        if let Some(value) = lookup("SYSREG_PUBLIC_PATH") {
            layer.public_path = Some(PublicPathLayer {
                use_systemjs_locate_dir: Some(parse_bool("SYSREG_PUBLIC_PATH", &value)?),
                bootstrap_pattern: None,
            });
        }
        if let Some(value) = lookup("SYSREG_DEPS") {
            layer.systemjs_deps = Some(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|dep| !dep.is_empty())
                    .map(|dep| DepRule::Literal(dep.to_owned()))
                    .collect(),
            );
        }
        Ok(layer)
    }

    /// Overlay `higher` on top of `self`
    #[must_use]
    pub fn merge(self, higher: Self) -> Self {
        let public_path = match (self.public_path, higher.public_path) {
            (Some(low), Some(high)) => Some(PublicPathLayer {
                use_systemjs_locate_dir: high.use_systemjs_locate_dir.or(low.use_systemjs_locate_dir),
                bootstrap_pattern: high.bootstrap_pattern.or(low.bootstrap_pattern),
            }),
            (low, high) => high.or(low),
        };
        Self {
            register_name: higher.register_name.or(self.register_name),
            systemjs_deps: higher.systemjs_deps.or(self.systemjs_deps),
            minify: higher.minify.or(self.minify),
            public_path,
            match_mode: higher.match_mode.or(self.match_mode),
            strict_entries: higher.strict_entries.or(self.strict_entries),
            interop: higher.interop.or(self.interop),
            stub_store: higher.stub_store.or(self.stub_store),
            entry: higher.entry.or(self.entry),
            externals: higher.externals.or(self.externals),
        }
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            name,
            value: value.to_owned(),
        }),
    }
}

/// Fully merged options, not yet validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationOptions {
    pub register_name: Option<String>,
    pub systemjs_deps: Vec<DepRule>,
    pub minify: bool,
    pub use_systemjs_locate_dir: bool,
    pub bootstrap_pattern: String,
    pub match_mode: MatchMode,
    pub strict_entries: bool,
    pub interop: bool,
    pub stub_store: StubStoreKind,
    pub entry: Option<EntryPoints>,
    pub externals: IndexMap<String, String>,
}

impl Default for RegistrationOptions {
    fn default() -> Self {
        Self::from_layer(ConfigLayer::default())
    }
}

impl RegistrationOptions {
    pub fn from_layer(layer: ConfigLayer) -> Self {
        let public_path = layer.public_path.unwrap_or_default();
        Self {
            register_name: layer.register_name,
            systemjs_deps: layer.systemjs_deps.unwrap_or_default(),
            minify: layer.minify.unwrap_or(false),
            use_systemjs_locate_dir: public_path.use_systemjs_locate_dir.unwrap_or(false),
            bootstrap_pattern: public_path
                .bootstrap_pattern
                .unwrap_or_else(|| DEFAULT_BOOTSTRAP_PATTERN.to_owned()),
            match_mode: layer.match_mode.unwrap_or_default(),
            strict_entries: layer.strict_entries.unwrap_or(false),
            interop: layer.interop.unwrap_or(true),
            stub_store: layer.stub_store.unwrap_or_default(),
            entry: layer.entry,
            externals: layer.externals.unwrap_or_default(),
        }
    }

    /// Load every layer up to the environment; `cli` is applied last
    pub fn load(config_path: Option<&Path>, cli: ConfigLayer) -> Result<Self, ConfigError> {
        let project = config_path
            .map(Path::to_path_buf)
            .or_else(dirs::project_config_file);
        Self::load_from(
            dirs::user_config_file().as_deref(),
            project.as_deref(),
            |name| std::env::var(name).ok(),
            cli,
        )
    }

    /// Load with explicit sources; missing user config files are skipped
    pub fn load_from(
        user_config: Option<&Path>,
        project_config: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
        cli: ConfigLayer,
    ) -> Result<Self, ConfigError> {
        let mut layer = ConfigLayer::default();
        if let Some(path) = user_config.filter(|path| path.is_file()) {
            layer = layer.merge(ConfigLayer::from_file(path)?);
        }
        if let Some(path) = project_config {
            layer = layer.merge(ConfigLayer::from_file(path)?);
        }
        layer = layer.merge(ConfigLayer::from_env(env)?).merge(cli);
        Ok(Self::from_layer(layer))
    }

    /// Check the options and normalize the externalization rules
    pub fn validate(&self) -> Result<ValidatedOptions, ConfigError> {
        if let Some(name) = &self.register_name {
            if name.is_empty() {
                return Err(ConfigError::EmptyRegisterName);
            }
            if name.contains(['\'', '\\', '\n', '\r']) {
                return Err(ConfigError::UnquotableRegisterName(name.clone()));
            }
            if self.externals.contains_key(name) {
                return Err(ConfigError::RegisterNameCollision(name.clone()));
            }
        }

        if self.use_systemjs_locate_dir && self.register_name.is_none() {
            return Err(ConfigError::PublicPathWithoutRegisterName);
        }

        let rules = self
            .systemjs_deps
            .iter()
            .enumerate()
            .map(|(index, rule)| normalize_rule(index, rule))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(collision) = rules
            .iter()
            .filter_map(ExternalizationRule::literal_name)
            .find(|name| self.externals.contains_key(*name))
        {
            return Err(ConfigError::ExternalCollision(collision.to_owned()));
        }

        let bootstrap_pattern =
            Regex::new(&self.bootstrap_pattern).map_err(|source| ConfigError::InvalidBootstrapPattern {
                pattern: self.bootstrap_pattern.clone(),
                source,
            })?;
        if !bootstrap_pattern.capture_names().any(|name| name == Some("target")) {
            return Err(ConfigError::BootstrapPatternWithoutTarget(
                self.bootstrap_pattern.clone(),
            ));
        }

        Ok(ValidatedOptions {
            register_name: self.register_name.clone(),
            classifier: Classifier::new(rules, self.match_mode),
            minify: self.minify,
            public_path: self.use_systemjs_locate_dir,
            bootstrap_pattern,
            strict_entries: self.strict_entries,
            interop: self.interop,
            stub_store: self.stub_store,
            entry: self.entry.clone(),
        })
    }
}

fn normalize_rule(index: usize, rule: &DepRule) -> Result<ExternalizationRule, ConfigError> {
    match rule {
        DepRule::Literal(name) if name.is_empty() => Err(ConfigError::EmptyDependency { index }),
        DepRule::Literal(name) => Ok(ExternalizationRule::Literal(name.clone())),
        DepRule::Pattern { pattern } => ExternalizationRule::pattern(pattern)
            .map_err(|source| ConfigError::InvalidPattern {
                index,
                pattern: pattern.clone(),
                source,
            }),
    }
}

/// Options of one pipeline instance, checked and immutable
#[derive(Debug, Clone)]
pub struct ValidatedOptions {
    pub register_name: Option<String>,
    pub classifier: Classifier,
    pub minify: bool,
    pub public_path: bool,
    pub bootstrap_pattern: Regex,
    pub strict_entries: bool,
    pub interop: bool,
    pub stub_store: StubStoreKind,
    pub entry: Option<EntryPoints>,
}

impl ValidatedOptions {
    /// Requests named by literal rules, in configuration order
    pub fn literal_dependencies(&self) -> impl Iterator<Item = &str> {
        self.classifier
            .rules()
            .iter()
            .filter_map(ExternalizationRule::literal_name)
    }
}

#[cfg(test)]
mod tests;
