//! Key selection: which source entries take part in a merge.

use std::collections::BTreeSet;

use globset::{Glob, GlobBuilder, GlobMatcher};

use crate::{error::Error, types::Document};

/// Prefix that marks a requested key as a glob pattern in every case.
pub const GLOB_PREFIX: &str = "glob:";

/// One requested key.
///
/// A plain request names a key exactly. When it contains `*`, `?` or `[` and
/// no source key equals it, it is also tried as a glob. A request written as
/// `glob:<pattern>` is always a glob.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    request: String,
    explicit: bool,
    matcher: Option<GlobMatcher>,
}

impl KeyPattern {
    pub fn new(request: &str) -> Result<Self, Error> {
        if let Some(pattern) = request.strip_prefix(GLOB_PREFIX) {
            let matcher = compile(pattern).map_err(|message| Error::InvalidPattern {
                pattern: pattern.to_string(),
                message,
            })?;
            return Ok(KeyPattern {
                request: request.to_string(),
                explicit: true,
                matcher: Some(matcher),
            });
        }
        // A key such as `Delete [item` is not a valid glob; it stays a name.
        let matcher = has_glob_meta(request)
            .then(|| compile(request).ok())
            .flatten();
        Ok(KeyPattern {
            request: request.to_string(),
            explicit: false,
            matcher,
        })
    }

    /// The request as it was given.
    pub fn as_str(&self) -> &str {
        &self.request
    }

    pub fn is_explicit_glob(&self) -> bool {
        self.explicit
    }

    /// Whether this request names `key`: equal to it, or an explicit glob
    /// matching it.
    pub fn names(&self, key: &str) -> bool {
        if self.explicit {
            self.glob_matches(key)
        } else {
            self.request == key
        }
    }

    /// Whether `key` could be selected by this request, exact or as a glob.
    pub fn matches(&self, key: &str) -> bool {
        self.names(key) || self.glob_matches(key)
    }

    fn glob_matches(&self, key: &str) -> bool {
        self.matcher.as_ref().is_some_and(|m| m.is_match(key))
    }
}

fn compile(pattern: &str) -> Result<GlobMatcher, String> {
    let glob: Glob = GlobBuilder::new(pattern)
        .literal_separator(false)
        .backslash_escape(true)
        .build()
        .map_err(|e| e.kind().to_string())?;
    Ok(glob.compile_matcher())
}

fn has_glob_meta(s: &str) -> bool {
    s.bytes().any(|b| matches!(b, b'*' | b'?' | b'['))
}

/// The keys a caller asked to sync. An empty request means "every key in the
/// source".
#[derive(Debug, Clone, Default)]
pub struct KeyRequest {
    patterns: Vec<KeyPattern>,
}

impl KeyRequest {
    /// Request every key of the source.
    pub fn all() -> Self {
        KeyRequest::default()
    }

    /// Builds a request from keys or patterns, in the order given. Keys are
    /// taken verbatim, surrounding spaces included; empty strings and repeats
    /// are ignored.
    pub fn new<I, S>(keys: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns: Vec<KeyPattern> = Vec::new();
        for key in keys {
            let key = key.as_ref();
            if key.is_empty() || patterns.iter().any(|p| p.as_str() == key) {
                continue;
            }
            patterns.push(KeyPattern::new(key)?);
        }
        Ok(KeyRequest { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[KeyPattern] {
        &self.patterns
    }

    /// Whether `key` may be touched by a merge with this request. An empty
    /// request covers everything.
    pub fn matches(&self, key: &str) -> bool {
        self.is_empty() || self.patterns.iter().any(|p| p.matches(key))
    }

    /// Whether `key` is named by the request, exactly or through an explicit
    /// `glob:` pattern. Only named keys are ever pruned; an empty request
    /// names nothing, so a full sync never prunes.
    pub fn names(&self, key: &str) -> bool {
        self.patterns.iter().any(|p| p.names(key))
    }
}

/// The outcome of key selection.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Source keys taking part in the merge.
    pub effective: BTreeSet<String>,
    /// Requested keys (or patterns) that matched nothing in the source.
    pub missing: Vec<String>,
    request: KeyRequest,
}

impl Selection {
    /// The request this selection was made from.
    pub fn request(&self) -> &KeyRequest {
        &self.request
    }
}

/// Determines the effective key set for merging `source`.
///
/// Only the source document is consulted: a requested key that is absent from
/// the source ends up in [`Selection::missing`], not in an error.
pub fn select(source: &Document, request: &KeyRequest) -> Selection {
    if request.is_empty() {
        return Selection {
            effective: source.keys().map(str::to_string).collect(),
            missing: Vec::new(),
            request: request.clone(),
        };
    }

    let mut effective = BTreeSet::new();
    let mut missing = Vec::new();
    for pattern in request.patterns() {
        let mut matched = false;
        if !pattern.is_explicit_glob() && source.contains_key(pattern.as_str()) {
            matched = true;
            effective.insert(pattern.as_str().to_string());
        } else {
            for key in source.keys().filter(|key| pattern.matches(key)) {
                matched = true;
                effective.insert(key.to_string());
            }
        }
        if !matched {
            missing.push(pattern.as_str().to_string());
        }
    }

    Selection {
        effective,
        missing,
        request: request.clone(),
    }
}
