use std::path::PathBuf;

use locsync::{ApplyMode, KeyRequest, Layout, SyncOptions, sync_file};
use tracing::debug;

use crate::exit::Failure;
use crate::report::{print_json, print_report, report_json};
use crate::validation::{parse_keys_json, validate_file_path, validate_target_path};

/// Arguments of the `merge` command: one source file into one target file.
#[derive(Debug, Clone, Default)]
pub struct MergeCommand {
    pub source: PathBuf,
    pub target: PathBuf,
    pub keys: Vec<String>,
    pub keys_json: Option<String>,
    pub dry_run: bool,
    pub backup: bool,
    pub prune: bool,
    pub sort: bool,
    pub json: bool,
    pub diff: bool,
}

impl MergeCommand {
    /// All requested keys, from `--keys` followed by `--keys-json`. Items of
    /// the comma-separated `--keys` list are trimmed; `--keys-json` is taken
    /// verbatim.
    pub fn requested_keys(&self) -> Result<Vec<String>, String> {
        let mut keys: Vec<String> = self.keys.iter().map(|k| k.trim().to_string()).collect();
        if let Some(json) = &self.keys_json {
            keys.extend(parse_keys_json(json)?);
        }
        Ok(keys)
    }

    pub fn sync_options(&self) -> Result<SyncOptions, Failure> {
        let keys = KeyRequest::new(self.requested_keys()?)?;
        Ok(SyncOptions {
            keys,
            prune: self.prune,
            mode: ApplyMode::from_flags(self.dry_run, self.backup),
            layout: if self.sort {
                Layout::Sorted
            } else {
                Layout::Preserve
            },
        })
    }
}

/// Run the merge command: sync the requested keys of one downloaded file
/// into one project file.
pub fn run_merge_command(cmd: MergeCommand) -> Result<(), Failure> {
    validate_file_path(&cmd.source)?;
    validate_target_path(&cmd.target)?;

    let options = cmd.sync_options()?;
    debug!(?options, "merge options");

    let report = sync_file(&cmd.source, &cmd.target, &options)?;
    if cmd.json {
        print_json(&report_json(&report, cmd.diff)?)?;
    } else {
        print_report(&report, cmd.diff || cmd.dry_run);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_keys_combines_flags() {
        let cmd = MergeCommand {
            keys: vec!["a".to_string(), " b".to_string()],
            keys_json: Some(r#"[" padded ", "promo.*"]"#.to_string()),
            ..MergeCommand::default()
        };
        assert_eq!(
            cmd.requested_keys().unwrap(),
            vec!["a", "b", " padded ", "promo.*"]
        );
    }

    #[test]
    fn test_sync_options_from_flags() {
        let cmd = MergeCommand {
            dry_run: true,
            backup: true,
            sort: true,
            ..MergeCommand::default()
        };
        let options = cmd.sync_options().unwrap();
        assert_eq!(options.mode, ApplyMode::DryRun);
        assert_eq!(options.layout, Layout::Sorted);
        assert!(options.keys.is_empty());
    }

    #[test]
    fn test_bad_pattern_is_a_usage_failure() {
        let cmd = MergeCommand {
            keys: vec!["glob:[oops".to_string()],
            ..MergeCommand::default()
        };
        let failure = cmd.sync_options().unwrap_err();
        assert_eq!(failure.code, crate::exit::USAGE);
    }
}
