use std::path::{Path, PathBuf};

use locsync::{ApplyMode, ApplyReport, ChangeCounts, KeyRequest, Layout, SyncOptions, sync_file};
use rayon::prelude::*;
use serde_json::json;
use tracing::{info, warn};

use crate::config::{SyncConfig, SyncPair};
use crate::exit::{Failure, PAIRS_FAILED};
use crate::report::{failure_json, print_json, print_report, report_json, summary_line};
use crate::validation::{validate_file_path, validate_language_code, validate_target_path};

/// Arguments of the `sync` command. Flags left unset fall back to the config.
#[derive(Debug, Clone, Default)]
pub struct SyncCommand {
    pub config: PathBuf,
    pub langs: Vec<String>,
    pub dry_run: bool,
    pub backup: bool,
    pub prune: bool,
    pub sort: bool,
    pub jobs: Option<usize>,
    pub json: bool,
    pub diff: bool,
}

/// Settings shared by every pair once flags and config are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Effective {
    mode: ApplyMode,
    layout: Layout,
    force_prune: bool,
}

impl SyncCommand {
    fn effective(&self, config: &SyncConfig) -> Effective {
        Effective {
            mode: ApplyMode::from_flags(
                self.dry_run || config.dry_run,
                self.backup || config.backup,
            ),
            layout: if self.sort || config.sort {
                Layout::Sorted
            } else {
                Layout::Preserve
            },
            force_prune: self.prune,
        }
    }
}

fn config_base(config: &Path) -> PathBuf {
    config
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn run_pair(pair: &SyncPair, settings: Effective) -> Result<ApplyReport, Failure> {
    validate_file_path(&pair.source)
        .map_err(|e| Failure::new(crate::exit::IO, format!("source for `{}`: {}", pair.lang, e)))?;
    validate_target_path(&pair.target)?;
    let options = SyncOptions {
        keys: KeyRequest::new(pair.keys.iter().map(String::as_str))?,
        prune: pair.prune || settings.force_prune,
        mode: settings.mode,
        layout: settings.layout,
    };
    Ok(sync_file(&pair.source, &pair.target, &options)?)
}

/// Run every configured pair, in parallel, and print one summary per pair.
pub fn run_sync_command(cmd: SyncCommand) -> Result<(), Failure> {
    for lang in &cmd.langs {
        validate_language_code(lang)?;
    }
    let config = SyncConfig::load(&cmd.config)?;
    let pairs = config.pairs(&config_base(&cmd.config), &cmd.langs);
    if pairs.is_empty() {
        return Err(Failure::new(
            crate::exit::USAGE,
            format!("No pairs to sync for languages: {}", cmd.langs.join(", ")),
        ));
    }

    let settings = cmd.effective(&config);
    let jobs = cmd.jobs.or(config.jobs).unwrap_or(0);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| format!("Failed to start worker pool: {}", e))?;
    info!(pairs = pairs.len(), jobs, mode = ?settings.mode, "syncing");

    // Collected in config order regardless of completion order.
    let results: Vec<Result<ApplyReport, Failure>> =
        pool.install(|| pairs.par_iter().map(|pair| run_pair(pair, settings)).collect());

    let mut totals = ChangeCounts::default();
    let mut failed = 0usize;
    let mut json_items = Vec::new();
    for (pair, result) in pairs.iter().zip(&results) {
        match result {
            Ok(report) => {
                totals.added += report.counts.added;
                totals.updated += report.counts.updated;
                totals.removed += report.counts.removed;
                totals.unchanged += report.counts.unchanged;
                if cmd.json {
                    json_items.push(report_json(report, cmd.diff)?);
                } else if cmd.diff {
                    print_report(report, true);
                } else {
                    println!("{}", summary_line(report));
                }
            }
            Err(failure) => {
                failed += 1;
                warn!(path = %pair.target.display(), lang = %pair.lang, "pair failed");
                if cmd.json {
                    json_items.push(failure_json(&pair.target, &pair.lang, &failure.message));
                } else {
                    eprintln!("❌ {} [{}]: {}", pair.target.display(), pair.lang, failure.message);
                }
            }
        }
    }

    if cmd.json {
        print_json(&json!({
            "pairs": json_items,
            "totals": totals,
            "failed": failed,
        }))?;
    } else {
        println!(
            "Total: {} pair(s), {} added, {} updated, {} removed, {} unchanged",
            pairs.len(),
            totals.added,
            totals.updated,
            totals.removed,
            totals.unchanged
        );
    }

    if failed > 0 {
        return Err(Failure::new(
            PAIRS_FAILED,
            format!("{} of {} pairs failed", failed, pairs.len()),
        ));
    }
    Ok(())
}
