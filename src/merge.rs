//! Reconciles a downloaded source document against an on-disk target.
//!
//! Only keys in the [`Selection`] are touched. Everything else in the target,
//! including trivia and the verbatim text of untouched entries, is carried
//! through unchanged.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::{
    error::Error,
    formats::FormatType,
    select::Selection,
    types::{Document, Entry, Value},
};

/// What happened to one key during a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Updated,
    Removed,
    Unchanged,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeKind::Added => "added",
            ChangeKind::Updated => "updated",
            ChangeKind::Removed => "removed",
            ChangeKind::Unchanged => "unchanged",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffEntry {
    pub key: String,
    pub change: ChangeKind,
}

/// Number of keys per [`ChangeKind`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChangeCounts {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
}

impl ChangeCounts {
    pub fn from_diff(diff: &[DiffEntry]) -> Self {
        let mut counts = ChangeCounts::default();
        for entry in diff {
            match entry.change {
                ChangeKind::Added => counts.added += 1,
                ChangeKind::Updated => counts.updated += 1,
                ChangeKind::Removed => counts.removed += 1,
                ChangeKind::Unchanged => counts.unchanged += 1,
            }
        }
        counts
    }

    /// Whether the merge changes anything at all.
    pub fn has_changes(&self) -> bool {
        self.added + self.updated + self.removed > 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Remove target keys that were requested but no longer exist upstream.
    pub prune: bool,
}

/// The content decisions of a merge, before they are applied to the target.
///
/// Every key in `upserts` or `deletions` comes from the selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePlan {
    /// Entries to store, in key order, with their final comment.
    pub upserts: Vec<Entry>,
    /// Target keys to remove.
    pub deletions: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct MergeResult {
    /// The target with the plan applied.
    pub document: Document,
    /// Every touched key plus the unchanged keys of the selection, by key.
    pub diff: Vec<DiffEntry>,
    /// Requested keys that matched nothing in the source.
    pub missing_keys: Vec<String>,
}

impl MergeResult {
    pub fn counts(&self) -> ChangeCounts {
        ChangeCounts::from_diff(&self.diff)
    }
}

/// Decides which entries to store and which keys to delete.
///
/// Fails when a selected source entry cannot live in the target: a plural
/// entry colliding with a flat one under the same key, or an entry whose
/// shape the target's format cannot represent.
pub fn plan(
    source: &Document,
    target: &Document,
    selection: &Selection,
    options: MergeOptions,
) -> Result<MergePlan, Error> {
    let mut plan = MergePlan::default();

    for key in &selection.effective {
        let Some(incoming) = source.get(key) else {
            continue;
        };
        check_storable(incoming, target.format())?;

        let existing = target.get(key);
        if let Some(existing) = existing
            && existing.value.is_flat() != incoming.value.is_flat()
        {
            return Err(Error::merge(
                key,
                format!(
                    "{} entry in source collides with {} entry in target",
                    incoming.value.shape(),
                    existing.value.shape()
                ),
            ));
        }

        let comment = incoming
            .comment
            .clone()
            .or_else(|| existing.and_then(|e| e.comment.clone()));
        plan.upserts.push(Entry {
            key: key.clone(),
            value: incoming.value.clone(),
            comment,
        });
    }

    if options.prune {
        let request = selection.request();
        plan.deletions = target
            .keys()
            .filter(|key| request.names(key) && !source.contains_key(key))
            .map(str::to_string)
            .collect();
    }

    Ok(plan)
}

fn check_storable(entry: &Entry, format: FormatType) -> Result<(), Error> {
    let fits = match (&entry.value, format) {
        (Value::Text(_), FormatType::Strings) => true,
        (Value::Plural(_) | Value::Opaque(_), FormatType::Stringsdict) => true,
        _ => false,
    };
    if fits {
        Ok(())
    } else {
        Err(Error::merge(
            &entry.key,
            format!(
                "{} entry cannot be stored in a .{} file",
                entry.value.shape(),
                format.extension()
            ),
        ))
    }
}

/// Merges the selected entries of `source` into `target`.
///
/// Untouched target entries keep their text and position. New keys are
/// inserted in front of the first existing key that sorts after them. An
/// entry stored exactly as it appears in the source reuses the source's
/// text.
pub fn resolve(
    source: &Document,
    mut target: Document,
    selection: &Selection,
    options: MergeOptions,
) -> Result<MergeResult, Error> {
    let plan = plan(source, &target, selection, options)?;
    debug!(
        upserts = plan.upserts.len(),
        deletions = plan.deletions.len(),
        "merge planned"
    );

    let mut diff = Vec::with_capacity(plan.upserts.len() + plan.deletions.len());
    for entry in plan.upserts {
        let raw = match source.get(&entry.key) {
            Some(original) if *original == entry => source.portable_raw(&entry.key).map(str::to_string),
            _ => None,
        };
        let change = match target.get(&entry.key) {
            None => ChangeKind::Added,
            Some(existing) if *existing == entry => ChangeKind::Unchanged,
            Some(_) => ChangeKind::Updated,
        };
        match change {
            ChangeKind::Added => target.insert_sorted(entry.clone(), raw),
            ChangeKind::Updated => target.replace(entry.clone(), raw),
            _ => {}
        }
        debug!(key = %entry.key, %change, "resolved key");
        diff.push(DiffEntry {
            key: entry.key,
            change,
        });
    }

    for key in plan.deletions {
        if target.remove(&key).is_some() {
            debug!(key = %key, "pruned key");
            diff.push(DiffEntry {
                key,
                change: ChangeKind::Removed,
            });
        }
    }

    diff.sort_by(|a, b| a.key.as_bytes().cmp(b.key.as_bytes()));
    Ok(MergeResult {
        document: target,
        diff,
        missing_keys: selection.missing.clone(),
    })
}
