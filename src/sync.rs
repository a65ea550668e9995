//! This module ties the engine together for one source/target file pair:
//! it infers the format, reads both files, selects and merges the requested
//! keys and hands the result to the applier.
//!
//! Pairs share no state, so callers may process several of them in parallel
//! as long as no two pairs write the same target.

use std::{
    fs,
    io::ErrorKind as IoErrorKind,
    path::{Path, PathBuf},
};

use tracing::{debug, info_span};

use crate::{
    apply::{ApplyMode, ApplyReport, plan_and_apply},
    error::Error,
    formats::FormatType,
    merge::{MergeOptions, MergeResult, resolve},
    select::{KeyRequest, select},
    types::{Document, Layout},
};

/// Everything that controls the merge of one pair.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Keys (or glob patterns) to sync; empty syncs the whole source.
    pub keys: KeyRequest,
    pub prune: bool,
    pub mode: ApplyMode,
    pub layout: Layout,
}

/// Infers the format of a pair from the target's extension, falling back to
/// the source's, and rejects pairs whose extensions disagree.
pub fn infer_pair_format(source: &Path, target: &Path) -> Result<FormatType, Error> {
    match (FormatType::from_path(source), FormatType::from_path(target)) {
        (Some(s), Some(t)) if s != t => Err(Error::FormatMismatch(format!(
            "source `{}` is {} but target `{}` is {}",
            source.display(),
            s,
            target.display(),
            t
        ))),
        (_, Some(format)) | (Some(format), None) => Ok(format),
        (None, None) => Err(Error::UnknownFormat(format!(
            "cannot infer format from `{}`",
            target.display()
        ))),
    }
}

/// Attempts to infer the language from an Apple `{lang}.lproj` directory in
/// `path`.
pub fn infer_language_from_path<P: AsRef<Path>>(path: P) -> Option<String> {
    path.as_ref().components().rev().find_map(|c| {
        let component = c.as_os_str().to_str()?;
        component
            .strip_suffix(".lproj")
            .filter(|lang| !lang.is_empty())
            .map(str::to_string)
    })
}

/// Reads the target, `None` when it does not exist yet.
fn read_target(path: &Path) -> Result<Option<Vec<u8>>, Error> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == IoErrorKind::NotFound => {
            debug!(path = %path.display(), "target does not exist, starting empty");
            Ok(None)
        }
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Merges already-read content. `target` is `None` when the target file does
/// not exist.
pub fn merge_bytes(
    format: FormatType,
    source: &[u8],
    target: Option<&[u8]>,
    options: &SyncOptions,
) -> Result<MergeResult, Error> {
    let source = format.parse(source)?;
    let target = match target {
        Some(bytes) => format.parse(bytes)?,
        None => Document::new(format),
    };
    debug!(
        source_keys = source.len(),
        target_keys = target.len(),
        "parsed pair"
    );
    let selection = select(&source, &options.keys);
    resolve(
        &source,
        target,
        &selection,
        MergeOptions {
            prune: options.prune,
        },
    )
}

/// Syncs the requested keys of `source` into `target`.
///
/// Errors in either file abort this pair before anything is written.
pub fn sync_file<S: AsRef<Path>, T: AsRef<Path>>(
    source: S,
    target: T,
    options: &SyncOptions,
) -> Result<ApplyReport, Error> {
    let source = source.as_ref();
    let target = target.as_ref();
    let lang = infer_language_from_path(target).unwrap_or_default();
    let _span = info_span!("sync", path = %target.display(), lang = %lang).entered();

    let format = infer_pair_format(source, target)?;
    let source_bytes = fs::read(source).map_err(|e| Error::io(source, e))?;
    let existing = read_target(target)?;

    let result = merge_bytes(format, &source_bytes, existing.as_deref(), options)?;
    plan_and_apply(
        target,
        existing.as_deref(),
        &result,
        options.mode,
        options.layout,
    )
}

/// Expands `{lang}` and `{lproj}` placeholders in a path template.
pub fn expand_path(template: &str, lang: &str, lproj: &str) -> PathBuf {
    PathBuf::from(template.replace("{lang}", lang).replace("{lproj}", lproj))
}
