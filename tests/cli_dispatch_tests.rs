use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_gallerist")
}

fn unique_temp_dir(name: &str) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after unix epoch")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("gallerist-{name}-{stamp}"));
    fs::create_dir_all(&dir).expect("temp dir should be created");
    dir
}

#[test]
fn missing_command_prints_usage() {
    let output = Command::new(bin()).output().expect("binary should run");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("usage: gallerist"));
}

#[test]
fn unknown_command_prints_usage() {
    let output = Command::new(bin())
        .arg("frobnicate")
        .output()
        .expect("binary should run");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn list_mods_names_every_pass() {
    let output = Command::new(bin())
        .args(["normalize", "--list-mods"])
        .output()
        .expect("binary should run");
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["uid", "title", "layout", "text", "images", "links", "categories", "timestamps"] {
        assert!(stdout.contains(name), "missing mod '{name}' in listing");
    }
}

#[test]
fn unknown_mod_name_is_an_invocation_error() {
    let output = Command::new(bin())
        .args(["normalize", "somewhere", "--mod", "bogus"])
        .output()
        .expect("binary should run");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown mod 'bogus'"));
}

#[test]
fn missing_corpus_root_is_an_invocation_error() {
    let output = Command::new(bin())
        .args(["migrate", "/nonexistent/gallerist-corpus"])
        .output()
        .expect("binary should run");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("corpus root not found"));
}

#[test]
fn migrate_rewrites_legacy_record_in_place() {
    let root = unique_temp_dir("migrate");
    let category = root.join("Empires");
    fs::create_dir_all(&category).expect("category dir");
    let record_path = category.join("rome.json");
    fs::write(
        &record_path,
        r#"{"figure":"Ancient Rome","header":"A city on seven hills."}"#,
    )
    .expect("fixture written");

    let backup_dir = root.join("backups");
    let output = Command::new(bin())
        .args([
            "migrate",
            root.to_string_lossy().as_ref(),
            "--backup-dir",
            backup_dir.to_string_lossy().as_ref(),
        ])
        .output()
        .expect("binary should run");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("scanned=1"));
    assert!(stdout.contains("migrated=1"));

    let migrated: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&record_path).expect("record read"))
            .expect("record parses");
    assert_eq!(migrated["version"], 2);
    assert_eq!(migrated["front"]["title"], "Ancient Rome");
    assert_eq!(migrated["meta"]["categories"][0], "Empires");

    let _ = fs::remove_dir_all(root);
}

#[test]
fn dry_run_leaves_the_corpus_untouched() {
    let root = unique_temp_dir("dry-run");
    let category = root.join("Empires");
    fs::create_dir_all(&category).expect("category dir");
    let record_path = category.join("rome.json");
    let original = r#"{"figure":"Ancient Rome"}"#;
    fs::write(&record_path, original).expect("fixture written");

    let output = Command::new(bin())
        .args(["migrate", root.to_string_lossy().as_ref(), "--dry-run"])
        .output()
        .expect("binary should run");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("dry run: no files were written"));
    assert_eq!(
        fs::read_to_string(&record_path).expect("record read"),
        original
    );

    let _ = fs::remove_dir_all(root);
}

#[test]
fn json_report_is_one_parseable_object() {
    let root = unique_temp_dir("json-report");
    fs::create_dir_all(root.join("Wars")).expect("category dir");
    fs::write(root.join("Wars/punic.json"), r#"{"header":"First war."}"#).expect("fixture");

    let output = Command::new(bin())
        .args(["migrate", root.to_string_lossy().as_ref(), "--dry-run", "--json"])
        .output()
        .expect("binary should run");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let payload: serde_json::Value = serde_json::from_str(&stdout).expect("report should be json");
    assert_eq!(payload["scanned"], 1);
    assert_eq!(payload["perVariant"]["legacy-text"], 1);

    let _ = fs::remove_dir_all(root);
}

#[test]
fn audit_reports_folder_mismatches_without_writing() {
    let root = unique_temp_dir("audit");
    fs::create_dir_all(root.join("Wars")).expect("category dir");
    let record = r#"{"version":2,"uid":"u1","front":{"title":"T"},"back":{"layout":"auto","text":"t"},"meta":{"created":"x","modified":"x","categories":["Empires"]}}"#;
    fs::write(root.join("Wars/punic.json"), record).expect("fixture");

    let output = Command::new(bin())
        .args(["audit", root.to_string_lossy().as_ref(), "--json"])
        .output()
        .expect("binary should run");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let payload: serde_json::Value = serde_json::from_str(&stdout).expect("report should be json");
    assert_eq!(payload["categoryMismatches"][0]["folder"], "Wars");
    assert_eq!(
        fs::read_to_string(root.join("Wars/punic.json")).expect("read"),
        record
    );

    let _ = fs::remove_dir_all(root);
}

#[test]
fn consolidate_requires_both_positionals() {
    let output = Command::new(bin())
        .args(["consolidate", "only-root"])
        .output()
        .expect("binary should run");
    assert_eq!(output.status.code(), Some(2));
}
