//! Turns a [`MergeResult`] into a preview or an on-disk change.

use std::{
    ffi::OsString,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use serde::Serialize;
use similar::TextDiff;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::{
    encoding,
    error::Error,
    merge::{ChangeCounts, DiffEntry, MergeResult},
    types::Layout,
};

/// Suffix appended to the target's file name for the backup copy.
pub const BACKUP_SUFFIX: &str = ".bak";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplyMode {
    /// Report what would change; touch nothing.
    #[default]
    DryRun,
    /// Write the merged file.
    Commit,
    /// Copy the existing file to `<target>.bak`, then write.
    Backup,
}

impl ApplyMode {
    pub fn from_flags(dry_run: bool, backup: bool) -> Self {
        match (dry_run, backup) {
            (true, _) => ApplyMode::DryRun,
            (false, true) => ApplyMode::Backup,
            (false, false) => ApplyMode::Commit,
        }
    }
}

/// Outcome of one source/target pair.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub target: PathBuf,
    pub mode: ApplyMode,
    pub counts: ChangeCounts,
    pub changes: Vec<DiffEntry>,
    pub missing_keys: Vec<String>,
    /// Whether the target file was (re)written.
    pub written: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<PathBuf>,
    /// Unified diff between the current and the merged file; empty when they
    /// are identical.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub preview: String,
}

/// Path of the backup copy for `target`.
pub fn backup_path(target: &Path) -> PathBuf {
    let mut name: OsString = target.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Serializes `result` and, depending on `mode`, writes it over `target`.
///
/// `existing` is the current content of the target, `None` when the file does
/// not exist yet. Serialization happens in every mode so a dry run fails
/// exactly where a commit would. Nothing is written (and no backup is made)
/// when the merged bytes equal the existing ones.
pub fn plan_and_apply(
    target: &Path,
    existing: Option<&[u8]>,
    result: &MergeResult,
    mode: ApplyMode,
    layout: Layout,
) -> Result<ApplyReport, Error> {
    let format = result.document.format();
    let merged = format.serialize_text(&result.document, layout)?;
    let packed = format.pack(&result.document, &merged)?;
    // Binary property lists are compared and previewed in their XML form.
    let existing = existing.map(|bytes| format.text_bytes(bytes)).transpose()?;
    let existing = existing.as_deref();
    let unchanged = existing == Some(merged.as_slice());

    let mut report = ApplyReport {
        target: target.to_path_buf(),
        mode,
        counts: result.counts(),
        changes: result.diff.clone(),
        missing_keys: result.missing_keys.clone(),
        written: false,
        backup: None,
        preview: preview(target, existing.unwrap_or_default(), &merged),
    };

    for key in &report.missing_keys {
        warn!(path = %target.display(), key = %key, "requested key not found in source");
    }

    if mode == ApplyMode::DryRun {
        debug!(path = %target.display(), "dry run, nothing written");
        return Ok(report);
    }
    if unchanged {
        debug!(path = %target.display(), "content identical, nothing written");
        return Ok(report);
    }

    if mode == ApplyMode::Backup && existing.is_some() {
        let backup = backup_path(target);
        fs::copy(target, &backup).map_err(|source| Error::Backup {
            path: target.to_path_buf(),
            backup: backup.clone(),
            source,
        })?;
        info!(backup = %backup.display(), "backup written");
        report.backup = Some(backup);
    }

    write_atomic(target, packed.as_deref().unwrap_or(&merged))?;
    info!(
        path = %target.display(),
        added = report.counts.added,
        updated = report.counts.updated,
        removed = report.counts.removed,
        "target written"
    );
    report.written = true;
    Ok(report)
}

/// Writes `bytes` to a temporary file next to `target` and renames it over
/// `target`, so readers only ever see the old or the new content.
fn write_atomic(target: &Path, bytes: &[u8]) -> Result<(), Error> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
    tmp.write_all(bytes).map_err(|e| Error::io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| Error::io(tmp.path(), e))?;
    if let Ok(meta) = fs::metadata(target) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .map_err(|e| Error::io(target, e))?;
    }
    tmp.persist(target).map_err(|e| Error::io(target, e.error))?;
    Ok(())
}

fn preview(target: &Path, old: &[u8], new: &[u8]) -> String {
    if old == new {
        return String::new();
    }
    let old = display_text(old);
    let new = display_text(new);
    let name = target.display().to_string();
    TextDiff::from_lines(old.as_str(), new.as_str())
        .unified_diff()
        .context_radius(3)
        .header(&name, &name)
        .to_string()
}

fn display_text(bytes: &[u8]) -> String {
    match encoding::decode(bytes) {
        Ok((text, _)) => text,
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        formats::{FormatType, StringsFormat},
        merge::{MergeOptions, resolve},
        select::{KeyRequest, select},
        traits::Parser,
        types::Document,
    };
    use tempfile::tempdir;

    const TARGET: &str = "\"a\" = \"1\";\n\"b\" = \"2\";\n";
    const SOURCE: &str = "\"a\" = \"9\";\n\"c\" = \"3\";\n";

    fn merge(target: Document) -> MergeResult {
        let source = StringsFormat::from_str(SOURCE).unwrap();
        let request = KeyRequest::new(["a", "c"]).unwrap();
        let selection = select(&source, &request);
        resolve(&source, target, &selection, MergeOptions::default()).unwrap()
    }

    #[test]
    fn test_backup_path_appends_suffix() {
        assert_eq!(
            backup_path(Path::new("fr.lproj/Localizable.strings")),
            PathBuf::from("fr.lproj/Localizable.strings.bak")
        );
    }

    #[test]
    fn test_mode_from_flags() {
        assert_eq!(ApplyMode::from_flags(true, true), ApplyMode::DryRun);
        assert_eq!(ApplyMode::from_flags(false, true), ApplyMode::Backup);
        assert_eq!(ApplyMode::from_flags(false, false), ApplyMode::Commit);
    }

    #[test]
    fn test_dry_run_leaves_file_alone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Localizable.strings");
        fs::write(&path, TARGET).unwrap();

        let result = merge(StringsFormat::from_str(TARGET).unwrap());
        let report = plan_and_apply(
            &path,
            Some(TARGET.as_bytes()),
            &result,
            ApplyMode::DryRun,
            Layout::Preserve,
        )
        .unwrap();

        assert!(!report.written);
        assert_eq!(fs::read_to_string(&path).unwrap(), TARGET);
        assert!(report.preview.contains("-\"a\" = \"1\";"));
        assert!(report.preview.contains("+\"a\" = \"9\";"));
        assert!(report.preview.contains("+\"c\" = \"3\";"));
    }

    #[test]
    fn test_commit_writes_and_creates_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("de.lproj").join("Localizable.strings");

        let result = merge(Document::new(FormatType::Strings));
        let report =
            plan_and_apply(&path, None, &result, ApplyMode::Backup, Layout::Preserve).unwrap();

        assert!(report.written);
        assert!(report.backup.is_none());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "\"a\" = \"9\";\n\"c\" = \"3\";\n"
        );
    }

    #[test]
    fn test_backup_copies_original_first() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Localizable.strings");
        fs::write(&path, TARGET).unwrap();

        let result = merge(StringsFormat::from_str(TARGET).unwrap());
        let report = plan_and_apply(
            &path,
            Some(TARGET.as_bytes()),
            &result,
            ApplyMode::Backup,
            Layout::Preserve,
        )
        .unwrap();

        let backup = report.backup.unwrap();
        assert_eq!(backup, backup_path(&path));
        assert_eq!(fs::read_to_string(&backup).unwrap(), TARGET);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "\"a\" = \"9\";\n\"b\" = \"2\";\n\"c\" = \"3\";\n"
        );
    }

    #[test]
    fn test_identical_content_is_not_rewritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Localizable.strings");
        let merged = "\"a\" = \"9\";\n\"b\" = \"2\";\n\"c\" = \"3\";\n";
        fs::write(&path, merged).unwrap();

        let result = merge(StringsFormat::from_str(merged).unwrap());
        let report = plan_and_apply(
            &path,
            Some(merged.as_bytes()),
            &result,
            ApplyMode::Backup,
            Layout::Preserve,
        )
        .unwrap();

        assert!(!report.written);
        assert!(report.backup.is_none());
        assert!(report.preview.is_empty());
        assert!(!backup_path(&path).exists());
        assert!(!report.counts.has_changes());
    }

    #[test]
    fn test_report_serializes_to_json() {
        let result = merge(StringsFormat::from_str(TARGET).unwrap());
        let report = plan_and_apply(
            Path::new("Localizable.strings"),
            Some(TARGET.as_bytes()),
            &result,
            ApplyMode::DryRun,
            Layout::Preserve,
        )
        .unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["mode"], "dry-run");
        assert_eq!(json["counts"]["added"], 1);
        assert_eq!(json["changes"][0]["change"], "updated");
        assert!(json.get("backup").is_none());
    }
}
