//! Sync configuration: which languages and which file pairs to process.
//!
//! ```yaml
//! backup: true
//! languages:
//!   - fr
//!   - code: zh-CN
//!     lproj: zh-Hans
//! files:
//!   - source: downloads/{lang}/Localizable.strings
//!     target: App/{lproj}.lproj/Localizable.strings
//!     keys: ["onboarding.*"]
//! ```
//!
//! Relative paths are resolved against the directory holding the config file.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::validation::validate_language_code;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in `{}`: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid TOML in `{}`: {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unsupported config extension for `{}` (expected .yaml, .yml or .toml)", .0.display())]
    UnsupportedExtension(PathBuf),

    #[error("invalid language `{code}`: {reason}")]
    InvalidLanguage { code: String, reason: String },

    #[error("{0}")]
    Invalid(String),
}

/// A language as the translation service names it, plus the `.lproj`
/// directory name used in the project when it differs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LanguageSpec {
    Code(String),
    Mapped {
        code: String,
        #[serde(default, deserialize_with = "optional_string")]
        lproj: Option<String>,
    },
}

impl LanguageSpec {
    pub fn code(&self) -> &str {
        match self {
            LanguageSpec::Code(code) => code,
            LanguageSpec::Mapped { code, .. } => code,
        }
    }

    pub fn lproj(&self) -> &str {
        match self {
            LanguageSpec::Mapped {
                lproj: Some(lproj), ..
            } => lproj,
            _ => self.code(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileMapping {
    /// Downloaded file, may contain `{lang}` and `{lproj}`.
    pub source: String,
    /// Project resource file, may contain `{lang}` and `{lproj}`.
    pub target: String,
    /// Keys or glob patterns to sync; absent or empty syncs every key.
    #[serde(default, deserialize_with = "optional_keys")]
    pub keys: Option<Vec<String>>,
    #[serde(default)]
    pub prune: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SyncConfig {
    pub languages: Vec<LanguageSpec>,
    pub files: Vec<FileMapping>,
    #[serde(default)]
    pub backup: bool,
    #[serde(default)]
    pub prune: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub sort: bool,
    #[serde(default)]
    pub jobs: Option<usize>,
}

/// One resolved source/target pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPair {
    pub lang: String,
    pub source: PathBuf,
    pub target: PathBuf,
    pub keys: Vec<String>,
    pub prune: bool,
}

impl SyncConfig {
    /// Loads a YAML or TOML config, chosen by extension, and validates it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let config = match ext.as_deref() {
            Some("yaml" | "yml") => Self::from_yaml(&text).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?,
            Some("toml") => Self::from_toml(&text).map_err(|source| ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            })?,
            _ => return Err(ConfigError::UnsupportedExtension(path.to_path_buf())),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.languages.is_empty() {
            return Err(ConfigError::Invalid("no languages configured".to_string()));
        }
        if self.files.is_empty() {
            return Err(ConfigError::Invalid("no file mappings configured".to_string()));
        }
        for lang in &self.languages {
            validate_language_code(lang.code()).map_err(|reason| ConfigError::InvalidLanguage {
                code: lang.code().to_string(),
                reason,
            })?;
        }
        for file in &self.files {
            if file.source.trim().is_empty() || file.target.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "file mapping needs both `source` and `target`".to_string(),
                ));
            }
            if self.languages.len() > 1 && !has_placeholder(&file.target) {
                return Err(ConfigError::Invalid(format!(
                    "target `{}` has no {{lang}} or {{lproj}} placeholder but {} languages are configured",
                    file.target,
                    self.languages.len()
                )));
            }
        }
        if self.jobs == Some(0) {
            return Err(ConfigError::Invalid("`jobs` must be at least 1".to_string()));
        }

        // Pairs run concurrently, so each target may belong to one pair only.
        let mut writers: HashMap<PathBuf, SyncPair> = HashMap::new();
        for pair in self.pairs(Path::new(""), &[]) {
            let target: PathBuf = pair.target.components().collect();
            if let Some(first) = writers.get(&target) {
                return Err(ConfigError::Invalid(format!(
                    "target `{}` is written by two mappings (`{}` for {} and `{}` for {})",
                    target.display(),
                    first.source.display(),
                    first.lang,
                    pair.source.display(),
                    pair.lang
                )));
            }
            writers.insert(target, pair);
        }
        Ok(())
    }

    /// Expands every file mapping for every language, in config order.
    /// `only` restricts the languages when non-empty; `base` anchors relative
    /// paths.
    pub fn pairs(&self, base: &Path, only: &[String]) -> Vec<SyncPair> {
        let mut pairs = Vec::new();
        for lang in &self.languages {
            if !only.is_empty() && !only.iter().any(|o| o == lang.code()) {
                continue;
            }
            for file in &self.files {
                let source = locsync::sync::expand_path(&file.source, lang.code(), lang.lproj());
                let target = locsync::sync::expand_path(&file.target, lang.code(), lang.lproj());
                pairs.push(SyncPair {
                    lang: lang.code().to_string(),
                    source: base.join(source),
                    target: base.join(target),
                    keys: file.keys.clone().unwrap_or_default(),
                    prune: file.prune.unwrap_or(self.prune),
                });
            }
        }
        pairs
    }
}

fn has_placeholder(template: &str) -> bool {
    template.contains("{lang}") || template.contains("{lproj}")
}

/// Reads an optional string, treating an empty string or the literal `null`
/// as absent.
fn optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !is_null_sentinel(s)))
}

/// Reads a key list given as a sequence, a single comma-separated string, or
/// nothing (`null`, `"null"`, `""`). Sequence items are kept verbatim so keys
/// with surrounding spaces can be named; comma-separated items are trimmed.
fn optional_keys<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Keys {
        List(Vec<String>),
        One(String),
    }

    let keys: Vec<String> = match Option::<Keys>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(Keys::List(list)) => list.into_iter().filter(|k| !k.is_empty()).collect(),
        Some(Keys::One(one)) if is_null_sentinel(&one) => return Ok(None),
        Some(Keys::One(one)) => one
            .split(',')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect(),
    };
    Ok((!keys.is_empty()).then_some(keys))
}

fn is_null_sentinel(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || s.eq_ignore_ascii_case("null")
}
