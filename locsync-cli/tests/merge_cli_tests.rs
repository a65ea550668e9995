use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use indoc::indoc;
use tempfile::TempDir;

fn locsync_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("locsync"))
}

const SOURCE: &str = indoc! {r#"
    /* Onboarding */
    "onboarding.title" = "Bienvenue";
    "onboarding.body" = "Commençons";
    "settings.title" = "Réglages (nouveau)";
"#};

const TARGET: &str = indoc! {r#"
    // Existing project strings

    "onboarding.title" = "Bienvenue !";

    "settings.title" = "Réglages";
"#};

fn setup() -> (TempDir, std::path::PathBuf, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("download.strings");
    let target = dir.path().join("fr.lproj").join("Localizable.strings");
    fs::write(&source, SOURCE).unwrap();
    fs::create_dir_all(target.parent().unwrap()).unwrap();
    fs::write(&target, TARGET).unwrap();
    (dir, source, target)
}

fn merge(source: &Path, target: &Path, extra: &[&str]) -> Output {
    locsync_cmd()
        .args([
            "merge",
            "--source",
            source.to_str().unwrap(),
            "--target",
            target.to_str().unwrap(),
        ])
        .args(extra)
        .output()
        .expect("Failed to execute command")
}

#[test]
fn test_merge_dry_run_leaves_target_untouched() {
    let (_dir, source, target) = setup();
    let output = merge(&source, &target, &["--keys", "onboarding.*", "--dry-run"]);
    assert!(
        output.status.success(),
        "Command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[DRY RUN]"), "stdout: {}", stdout);
    assert!(stdout.contains("1 added, 1 updated"), "stdout: {}", stdout);
    assert!(stdout.contains("+\"onboarding.body\""), "diff missing: {}", stdout);
    assert_eq!(fs::read_to_string(&target).unwrap(), TARGET);
}

#[test]
fn test_merge_commit_only_touches_requested_keys() {
    let (_dir, source, target) = setup();
    let output = merge(&source, &target, &["--keys", "onboarding.title,onboarding.body"]);
    assert!(
        output.status.success(),
        "Command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let content = fs::read_to_string(&target).unwrap();
    assert!(content.starts_with("// Existing project strings\n\n\"onboarding.body\""));
    assert!(content.contains("\"onboarding.title\" = \"Bienvenue\";"));
    assert!(content.contains("\"onboarding.body\" = \"Commençons\";"));
    assert!(content.contains("\"settings.title\" = \"Réglages\";"));
    assert!(!content.contains("nouveau"));
}

#[test]
fn test_merge_keys_json_and_json_report() {
    let (_dir, source, target) = setup();
    let output = merge(
        &source,
        &target,
        &["--keys-json", r#"["settings.title", "missing.key"]"#, "--json"],
    );
    assert!(
        output.status.success(),
        "Command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["mode"], "commit");
    assert_eq!(report["written"], true);
    assert_eq!(report["counts"]["updated"], 1);
    assert_eq!(report["missing_keys"][0], "missing.key");
    assert_eq!(report["changes"][0]["key"], "settings.title");
    assert_eq!(report["changes"][0]["change"], "updated");
    assert!(report.get("preview").is_none());
}

#[test]
fn test_merge_backup_keeps_previous_content() {
    let (_dir, source, target) = setup();
    let output = merge(&source, &target, &["--backup"]);
    assert!(
        output.status.success(),
        "Command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let mut backup = target.clone().into_os_string();
    backup.push(".bak");
    assert_eq!(fs::read_to_string(&backup).unwrap(), TARGET);
    assert!(
        fs::read_to_string(&target)
            .unwrap()
            .contains("Réglages (nouveau)")
    );
}

#[test]
fn test_merge_creates_missing_target() {
    let (dir, source, _target) = setup();
    let target = dir.path().join("de.lproj").join("Localizable.strings");
    let output = merge(&source, &target, &["--keys", "settings.title"]);
    assert!(
        output.status.success(),
        "Command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        fs::read_to_string(&target).unwrap(),
        "\"settings.title\" = \"Réglages (nouveau)\";\n"
    );
}

#[test]
fn test_merge_malformed_target_exits_with_parse_code() {
    let (_dir, source, target) = setup();
    fs::write(&target, "\"broken\" = \"no terminator\n").unwrap();
    let output = merge(&source, &target, &[]);
    assert_eq!(output.status.code(), Some(3));
    assert!(!String::from_utf8_lossy(&output.stderr).is_empty());
    assert_eq!(
        fs::read_to_string(&target).unwrap(),
        "\"broken\" = \"no terminator\n"
    );
}

#[test]
fn test_merge_rejects_unsupported_target_extension() {
    let (dir, source, _target) = setup();
    let target = dir.path().join("strings.xml");
    let output = merge(&source, &target, &[]);
    assert_eq!(output.status.code(), Some(2));
    assert!(!target.exists());
}

#[test]
fn test_merge_rejects_invalid_keys_json() {
    let (_dir, source, target) = setup();
    let output = merge(&source, &target, &["--keys-json", "{\"a\": 1}"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("--keys-json"));
}

#[test]
fn test_completions_are_generated() {
    let output = locsync_cmd()
        .args(["completions", "bash"])
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("locsync"));
}
