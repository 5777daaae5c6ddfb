//! End-to-end engine tests over the in-memory filesystem: legacy corpora in,
//! canonical corpora out, with idempotence and reference integrity checked
//! the way the batch tool runs them.

use std::path::{Path, PathBuf};

use gallerist::fsio::{CorpusFs, MemFs};
use gallerist::migrate::batch::{run_audit, run_migrate, BackupPlan, BatchOptions};
use gallerist::migrate::normalize::NormalizeOptions;
use gallerist::migrate::repair::{run_repair, RepairOptions};
use gallerist::record::journey::load_journey_record;
use gallerist::record::poster::{load_poster_record, Chronology};

const NOW: &str = "2026-08-06T12:00:00Z";

fn options() -> BatchOptions {
    BatchOptions {
        include_non_v2: false,
        assets_root: None,
        backup: BackupPlan::new("backups", 1),
        normalize: NormalizeOptions::default(),
        now: NOW.to_string(),
    }
}

fn read_json(fs: &MemFs, path: &str) -> serde_json::Value {
    serde_json::from_str(&fs.read_to_string(Path::new(path)).expect("file readable"))
        .expect("file parses as json")
}

fn snapshot(fs: &MemFs) -> Vec<(PathBuf, Vec<u8>)> {
    let mut files: Vec<(PathBuf, Vec<u8>)> = fs
        .paths()
        .into_iter()
        .map(|path| {
            let data = fs.read(&path).expect("snapshot read");
            (path, data)
        })
        .collect();
    files.sort();
    files
}

#[test]
fn legacy_text_record_migrates_with_chronology_and_folder_category() {
    let fs = MemFs::new();
    fs.write_str(
        "corpus/Empires/rome.json",
        r#"{"figure":"Ancient Rome","header":"A city on seven hills.","chronology":{"epochStart":-753}}"#,
    );

    let report = run_migrate(&fs, Path::new("corpus"), &options()).expect("batch runs");
    assert_eq!(report.scanned, 1);
    assert_eq!(report.migrated, 1);
    assert_eq!(report.error_count(), 0);
    assert_eq!(report.per_variant.get("legacy-text"), Some(&1));

    let record = read_json(&fs, "corpus/Empires/rome.json");
    assert_eq!(record["version"], 2);
    assert_eq!(record["front"]["title"], "Ancient Rome");
    assert_eq!(record["back"]["text"], "A city on seven hills.");
    assert_eq!(record["front"]["chronology"]["epochStart"], -753);
    let chronology: Chronology =
        serde_json::from_value(record["front"]["chronology"].clone()).expect("canonical chronology");
    assert_eq!(chronology.epoch_start, Some(-753));
    assert_eq!(record["meta"]["categories"], serde_json::json!(["Empires"]));
    assert_eq!(record["meta"]["created"], NOW);
    assert!(!record["uid"].as_str().unwrap_or("").is_empty());
    assert!(record["meta"].get("migratedFrom").is_none());

    // Pre-overwrite snapshot landed in the timestamped backup tree.
    assert!(fs.exists(Path::new("backups/migration-1/Empires/rome.json")));
}

#[test]
fn legacy_website_record_migrates_to_primary_external_link() {
    let fs = MemFs::new();
    fs.write_str(
        "corpus/Sites/example.json",
        r#"{"type":"website","title":"Example","url":"https://example.com","description":"d"}"#,
    );

    let report = run_migrate(&fs, Path::new("corpus"), &options()).expect("batch runs");
    assert_eq!(report.migrated, 1);

    let record = read_json(&fs, "corpus/Sites/example.json");
    assert_eq!(
        record["back"]["links"],
        serde_json::json!([{
            "type": "external",
            "label": "Open Website",
            "url": "https://example.com",
            "primary": true
        }])
    );
    assert_eq!(record["back"]["text"], "d");
}

#[test]
fn migrated_corpus_satisfies_canonical_invariants() {
    let fs = MemFs::new();
    fs.write_str("corpus/Empires/rome.json", r#"{"figure":"","header":"Body."}"#);
    fs.write_str(
        "corpus/Sites/example.json",
        r#"{"type":"website","url":"https://example.com"}"#,
    );
    fs.write_str(
        "corpus/Empires/forum.json",
        r#"{"type":"image","imagePath":"forum.png","description":"The Forum."}"#,
    );
    fs.write_str("corpus/Empires/images/forum.png", "img");

    let report = run_migrate(&fs, Path::new("corpus"), &options()).expect("batch runs");
    assert_eq!(report.migrated, 3);

    for path in [
        "corpus/Empires/rome.json",
        "corpus/Sites/example.json",
        "corpus/Empires/forum.json",
    ] {
        let record = read_json(&fs, path);
        assert_eq!(record["version"], 2, "{path}");
        assert!(
            !record["front"]["title"].as_str().unwrap_or("").is_empty(),
            "{path} lost its title"
        );
        assert_eq!(record["back"]["layout"], "auto", "{path}");
        let categories = record["meta"]["categories"].as_array().expect("categories");
        assert!(!categories.is_empty(), "{path} has no categories");
        if let (Some(primary), Some(list)) = (
            record["back"]["image"]["src"].as_str(),
            record["back"]["images"].as_array(),
        ) {
            assert_eq!(list[0]["src"].as_str(), Some(primary), "{path}");
        }
        // Canonical records load through the typed schema too.
        assert!(load_poster_record(&fs, Path::new(path)).is_some(), "{path}");
    }

    let forum = read_json(&fs, "corpus/Empires/forum.json");
    assert_eq!(
        forum["back"]["image"]["src"],
        "images/originals/Empires_forum.png"
    );
    assert!(fs.exists(Path::new("corpus/images/originals/Empires_forum.png")));
}

#[test]
fn direct_image_synthesizes_sibling_record_once() {
    let fs = MemFs::new();
    fs.write_str("corpus/Empires/colosseum_night.png", "img-bytes");

    let report = run_migrate(&fs, Path::new("corpus"), &options()).expect("batch runs");
    assert_eq!(report.migrated, 1);
    assert_eq!(report.images_moved, 1);

    let record = read_json(&fs, "corpus/Empires/colosseum_night.json");
    assert_eq!(record["front"]["title"], "Colosseum Night");
    assert_eq!(
        record["back"]["image"]["src"],
        "images/originals/Empires_colosseum_night.png"
    );
    // The original image is left in place.
    assert!(fs.exists(Path::new("corpus/Empires/colosseum_night.png")));

    let rerun = run_migrate(&fs, Path::new("corpus"), &options()).expect("rerun");
    assert_eq!(rerun.migrated, 0);
    assert!(rerun.skipped >= 1);
}

#[test]
fn rerunning_migration_changes_nothing() {
    let fs = MemFs::new();
    fs.write_str(
        "corpus/Empires/rome.json",
        r#"{"figure":"Ancient Rome","header":"A city.","thumbnail":"rome.png"}"#,
    );
    fs.write_str(
        "corpus/Sites/example.json",
        r#"{"type":"website","title":"Example","url":"https://example.com","description":"d"}"#,
    );
    fs.write_str("corpus/Empires/images/rome.png", "img");
    fs.write_str("corpus/Wars/map_of_battles.webp", "img");

    let first = run_migrate(&fs, Path::new("corpus"), &options()).expect("first run");
    assert_eq!(first.migrated, 3);
    let first_orphans = first.orphan_images.len();

    let before = snapshot(&fs);
    let second = run_migrate(&fs, Path::new("corpus"), &options()).expect("second run");
    assert_eq!(second.migrated, 0);
    assert_eq!(second.normalized, 0);
    assert_eq!(second.images_moved, 0);
    assert!(second.orphan_images.len() <= first_orphans);
    assert_eq!(snapshot(&fs), before, "second run must be byte-identical");
}

#[test]
fn stale_reference_is_repaired_against_current_store() {
    let fs = MemFs::new();
    // Spec scenario: reference names competitors_Chatbots.png, store holds
    // Chatbots.webp.
    fs.write_str("corpus/images/originals/Chatbots.webp", "img");
    fs.write_str(
        "corpus/Competitors/chatbots.json",
        r#"{"version":2,"uid":"u1","front":{"title":"Chatbots"},"back":{"layout":"auto","text":"t","image":{"src":"competitors_Chatbots.png","alt":"Chatbots"}},"meta":{"created":"x","modified":"x","categories":["Competitors"]}}"#,
    );

    let report = run_repair(
        &fs,
        Path::new("corpus"),
        Path::new("corpus/images"),
        &BackupPlan::new("backups", 2),
        &RepairOptions::default(),
    )
    .expect("repair runs");
    assert_eq!(report.repaired_references, 1);
    assert!(report.orphan_images.is_empty());

    let record = read_json(&fs, "corpus/Competitors/chatbots.json");
    assert_eq!(
        record["back"]["image"]["src"],
        "images/originals/Chatbots.webp"
    );
}

#[test]
fn unresolvable_reference_is_reported_and_left_alone() {
    let fs = MemFs::new();
    fs.write_str(
        "corpus/Wars/punic.json",
        r#"{"version":2,"uid":"u1","front":{"title":"Punic"},"back":{"layout":"auto","text":"t","image":{"src":"lost_forever.png","alt":"x"}},"meta":{"created":"x","modified":"x","categories":["Wars"]}}"#,
    );

    let report = run_repair(
        &fs,
        Path::new("corpus"),
        Path::new("corpus/images"),
        &BackupPlan::new("backups", 3),
        &RepairOptions::default(),
    )
    .expect("repair runs");
    assert_eq!(report.repaired_references, 0);
    assert_eq!(report.orphan_images.len(), 1);
    assert_eq!(report.orphan_images[0].reference, "lost_forever.png");

    let record = read_json(&fs, "corpus/Wars/punic.json");
    assert_eq!(record["back"]["image"]["src"], "lost_forever.png");
}

#[test]
fn journey_thumbnails_are_repaired_but_filenames_never_touched() {
    let fs = MemFs::new();
    fs.write_str("corpus/images/originals/Rome.webp", "img");
    fs.write_str(
        "corpus/Journeys/grand_tour.json",
        r#"{"name":"Grand Tour","posters":[{"filename":"rome.json","type":"poster","title":"Rome","thumbnail":"empires_Rome.png"}]}"#,
    );

    let report = run_repair(
        &fs,
        Path::new("corpus"),
        Path::new("corpus/images"),
        &BackupPlan::new("backups", 4),
        &RepairOptions::default(),
    )
    .expect("repair runs");
    assert_eq!(report.repaired_references, 1);

    let journey = read_json(&fs, "corpus/Journeys/grand_tour.json");
    assert_eq!(journey["posters"][0]["filename"], "rome.json");
    assert_eq!(
        journey["posters"][0]["thumbnail"],
        "images/originals/Rome.webp"
    );

    let typed = load_journey_record(&fs, Path::new("corpus/Journeys/grand_tour.json"))
        .expect("journey loads through the typed schema");
    assert_eq!(typed.posters[0].poster_type, "poster");
    assert_eq!(
        typed.posters[0].thumbnail.as_deref(),
        Some("images/originals/Rome.webp")
    );
}

#[test]
fn deprefix_renames_unique_assets_and_rewrites_referencers_atomically() {
    let fs = MemFs::new();
    fs.write_str("corpus/images/originals/empires_Forum.png", "img");
    // Two assets collapsing to the same bare name must both be skipped.
    fs.write_str("corpus/images/originals/empires_Logo.png", "img");
    fs.write_str("corpus/images/originals/wars_Logo.png", "img");
    fs.write_str(
        "corpus/Empires/forum.json",
        r#"{"version":2,"uid":"u1","front":{"title":"Forum"},"back":{"layout":"auto","text":"t","image":{"src":"images/originals/empires_Forum.png","alt":"Forum"}},"meta":{"created":"x","modified":"x","categories":["Empires"]}}"#,
    );

    let report = run_repair(
        &fs,
        Path::new("corpus"),
        Path::new("corpus/images"),
        &BackupPlan::new("backups", 5),
        &RepairOptions { deprefix: true },
    )
    .expect("repair runs");

    assert_eq!(report.renamed_assets, 1);
    assert!(fs.exists(Path::new("corpus/images/originals/Forum.png")));
    assert!(!fs.exists(Path::new("corpus/images/originals/empires_Forum.png")));
    assert!(fs.exists(Path::new("corpus/images/originals/empires_Logo.png")));
    assert!(fs.exists(Path::new("corpus/images/originals/wars_Logo.png")));

    let record = read_json(&fs, "corpus/Empires/forum.json");
    assert_eq!(record["back"]["image"]["src"], "images/originals/Forum.png");
}

#[test]
fn repair_converges_to_a_fixed_point() {
    let fs = MemFs::new();
    fs.write_str("corpus/images/originals/empires_Forum.png", "img");
    fs.write_str(
        "corpus/Empires/forum.json",
        r#"{"version":2,"uid":"u1","front":{"title":"Forum"},"back":{"layout":"auto","text":"t","image":{"src":"empires_Forum.png","alt":"Forum"}},"meta":{"created":"x","modified":"x","categories":["Empires"]}}"#,
    );

    let repair_options = RepairOptions { deprefix: true };
    let first = run_repair(
        &fs,
        Path::new("corpus"),
        Path::new("corpus/images"),
        &BackupPlan::new("backups", 6),
        &repair_options,
    )
    .expect("first repair");
    assert!(first.repaired_references >= 1);

    let before = snapshot(&fs);
    let second = run_repair(
        &fs,
        Path::new("corpus"),
        Path::new("corpus/images"),
        &BackupPlan::new("backups", 7),
        &repair_options,
    )
    .expect("second repair");
    assert_eq!(second.repaired_references, 0);
    assert_eq!(second.renamed_assets, 0);
    assert!(second.orphan_images.is_empty());
    assert_eq!(snapshot(&fs), before);
}

#[test]
fn audit_finds_mismatches_conflicts_and_orphans_without_mutating() {
    let fs = MemFs::new();
    fs.write_str(
        "corpus/Wars/punic.json",
        r#"{"version":2,"uid":"u1","front":{"title":"Punic"},"back":{"layout":"auto","text":"t","image":{"src":"gone.png","alt":"x"}},"categories":["Old"],"meta":{"created":"x","modified":"x","categories":["Empires"]}}"#,
    );

    let before = snapshot(&fs);
    let report = run_audit(&fs, Path::new("corpus"), &options()).expect("audit runs");
    assert_eq!(report.category_mismatches.len(), 1);
    assert_eq!(report.category_mismatches[0].folder, "Wars");
    assert_eq!(report.category_conflicts.len(), 1);
    assert_eq!(report.orphan_images.len(), 1);
    assert_eq!(snapshot(&fs), before, "audit must not write");
}

#[test]
fn parse_errors_are_counted_and_never_abort_the_batch() {
    let fs = MemFs::new();
    fs.write_str("corpus/Empires/broken.json", "{not json");
    fs.write_str("corpus/Empires/rome.json", r#"{"figure":"Rome"}"#);

    let report = run_migrate(&fs, Path::new("corpus"), &options()).expect("batch runs");
    assert_eq!(report.scanned, 2);
    assert_eq!(report.migrated, 1);
    assert_eq!(report.error_count(), 1);
    assert_eq!(report.errors[0].kind.as_str(), "parse");
    // The broken file is left exactly as it was.
    assert_eq!(
        fs.read_to_string(Path::new("corpus/Empires/broken.json")).expect("read"),
        "{not json"
    );
}

#[test]
fn unknown_records_are_skipped_and_named() {
    let fs = MemFs::new();
    fs.write_str("corpus/Empires/mystery.json", r#"{"something":"else"}"#);

    let report = run_migrate(&fs, Path::new("corpus"), &options()).expect("batch runs");
    assert_eq!(report.skipped, 1);
    assert_eq!(report.unknown_files.len(), 1);
    assert_eq!(report.per_variant.get("unknown"), Some(&1));
    assert_eq!(
        fs.read_to_string(Path::new("corpus/Empires/mystery.json")).expect("read"),
        r#"{"something":"else"}"#
    );
}
