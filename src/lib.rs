#![forbid(unsafe_code)]
//! Selective merge engine for Apple localization files.
//!
//! Takes a freshly downloaded, possibly partial translation file and merges
//! the requested keys into an existing `.strings` or `.stringsdict` resource,
//! leaving every other entry, its comments and its formatting untouched.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use locsync::{ApplyMode, KeyRequest, SyncOptions, sync_file};
//!
//! let options = SyncOptions {
//!     keys: KeyRequest::new(["onboarding.title", "promo.*"])?,
//!     mode: ApplyMode::Backup,
//!     ..SyncOptions::default()
//! };
//! let report = sync_file("downloads/fr.strings", "fr.lproj/Localizable.strings", &options)?;
//! println!("{} added, {} updated", report.counts.added, report.counts.updated);
//! # Ok::<(), locsync::Error>(())
//! ```
//!
//! # Pipeline
//!
//! - [`formats`]: lossless parsers and serializers for both formats
//! - [`select`]: which source keys take part in a merge
//! - [`merge`]: insert/update/prune decisions per key
//! - [`apply`]: dry-run preview, backup and atomic write
//! - [`sync`]: the above for one source/target file pair

pub mod apply;
pub mod encoding;
pub mod error;
pub mod formats;
pub mod merge;
pub mod select;
pub mod sync;
pub mod traits;
pub mod types;

// Re-export most used types for easy consumption
pub use crate::{
    apply::{ApplyMode, ApplyReport, plan_and_apply},
    error::{Error, ErrorKind},
    formats::FormatType,
    merge::{ChangeCounts, ChangeKind, DiffEntry, MergeOptions, MergePlan, MergeResult, resolve},
    select::{KeyRequest, Selection, select},
    sync::{SyncOptions, merge_bytes, sync_file},
    types::{Document, Entry, Layout, Plural, PluralCategory, PluralVariable, Selector, Value},
};
