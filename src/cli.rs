use std::env;
use std::path::{Path, PathBuf};

use crate::fsio::{DiskFs, DryRunFs};
use crate::migrate::batch::{run_audit, run_migrate, run_normalize, BackupPlan, BatchError, BatchOptions};
use crate::migrate::categories::{CategoryOptions, DEFAULT_CATEGORY};
use crate::migrate::normalize::{ModSet, NormalizeOptions, MODS};
use crate::migrate::repair::{run_repair, RepairOptions};
use crate::migrate::report::MigrationReport;
use crate::server;
use crate::store::consolidate::{apply_consolidation, plan_consolidation, ConsolidateError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Migrate,
    Normalize,
    Repair,
    Consolidate,
    Audit,
    Serve,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("migrate") => Some(Command::Migrate),
        Some("normalize") => Some(Command::Normalize),
        Some("repair") => Some(Command::Repair),
        Some("consolidate") => Some(Command::Consolidate),
        Some("audit") => Some(Command::Audit),
        Some("serve") => Some(Command::Serve),
        _ => None,
    }
}

pub fn run_with_args(args: &[String]) -> i32 {
    match parse_command(args) {
        Some(Command::Migrate) => handle_migrate(args),
        Some(Command::Normalize) => handle_normalize(args),
        Some(Command::Repair) => handle_repair(args),
        Some(Command::Consolidate) => handle_consolidate(args),
        Some(Command::Audit) => handle_audit(args),
        Some(Command::Serve) => handle_serve(args),
        None => {
            eprintln!("usage: gallerist <migrate|normalize|repair|consolidate|audit|serve>");
            2
        }
    }
}

/// Flags that consume the following argument.
const VALUE_FLAGS: &[&str] = &[
    "--assets",
    "--default-category",
    "--backup-dir",
    "--report-csv",
    "--mod",
];

#[derive(Debug, Clone, Default)]
struct CommonFlags {
    dry_run: bool,
    verbose: bool,
    json: bool,
    list_mods: bool,
    ensure_folder: bool,
    prefer_root: bool,
    include_non_v2: bool,
    deprefix: bool,
    assets: Option<PathBuf>,
    backup_dir: Option<String>,
    default_category: Option<String>,
    report_csv: Option<String>,
    mods: Vec<String>,
}

fn parse_flags(args: &[String]) -> CommonFlags {
    let mut flags = CommonFlags::default();
    let mut index = 2;
    while index < args.len() {
        match args[index].as_str() {
            "--dry-run" => flags.dry_run = true,
            "-v" | "--verbose" => flags.verbose = true,
            "--json" => flags.json = true,
            "--list-mods" => flags.list_mods = true,
            "--ensure-folder-category" => flags.ensure_folder = true,
            "--prefer-root-categories" => flags.prefer_root = true,
            "--include-non-v2" => flags.include_non_v2 = true,
            "--deprefix" => flags.deprefix = true,
            "--assets" => {
                flags.assets = args.get(index + 1).map(PathBuf::from);
                index += 1;
            }
            "--backup-dir" => {
                flags.backup_dir = args.get(index + 1).cloned();
                index += 1;
            }
            "--default-category" => {
                flags.default_category = args.get(index + 1).cloned();
                index += 1;
            }
            "--report-csv" => {
                flags.report_csv = args.get(index + 1).cloned();
                index += 1;
            }
            "--mod" => {
                if let Some(name) = args.get(index + 1) {
                    flags.mods.push(name.clone());
                }
                index += 1;
            }
            _ => {}
        }
        index += 1;
    }
    flags
}

fn positionals(args: &[String]) -> Vec<&String> {
    let mut result = Vec::new();
    let mut index = 2;
    while index < args.len() {
        let arg = &args[index];
        if arg.starts_with('-') {
            if VALUE_FLAGS.contains(&arg.as_str()) {
                index += 2;
            } else {
                index += 1;
            }
            continue;
        }
        result.push(arg);
        index += 1;
    }
    result
}

fn batch_options(flags: &CommonFlags) -> Result<BatchOptions, String> {
    let mods = ModSet::from_names(&flags.mods)?;
    Ok(BatchOptions {
        include_non_v2: flags.include_non_v2,
        assets_root: flags.assets.clone(),
        backup: backup_plan(flags),
        normalize: NormalizeOptions {
            mods,
            categories: CategoryOptions {
                default_category: flags
                    .default_category
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
                ensure_folder: flags.ensure_folder,
                prefer_root: flags.prefer_root,
            },
        },
        now: now_stamp(),
    })
}

fn backup_plan(flags: &CommonFlags) -> BackupPlan {
    BackupPlan::new(
        flags.backup_dir.as_deref().unwrap_or("backups"),
        chrono::Utc::now().timestamp_millis(),
    )
}

fn now_stamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

fn handle_migrate(args: &[String]) -> i32 {
    let flags = parse_flags(args);
    let Some(root) = positionals(args).first().map(|s| PathBuf::from(s.as_str())) else {
        eprintln!("usage: gallerist migrate <corpus-root> [--dry-run] [--assets <dir>] [--default-category <name>] [--backup-dir <path>] [--json] [--report-csv <path>] [-v]");
        return 2;
    };
    let options = match batch_options(&flags) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{message}");
            return 2;
        }
    };

    let disk = DiskFs;
    let result = if flags.dry_run {
        let dry = DryRunFs::new(&disk);
        let result = run_migrate(&dry, &root, &options);
        print_planned_ops(&dry, flags.verbose);
        result
    } else {
        run_migrate(&disk, &root, &options)
    };
    finish_batch(result, &flags)
}

fn handle_normalize(args: &[String]) -> i32 {
    let flags = parse_flags(args);
    if flags.list_mods {
        for (name, description) in MODS {
            println!("{name:<12} {description}");
        }
        return 0;
    }
    let Some(root) = positionals(args).first().map(|s| PathBuf::from(s.as_str())) else {
        eprintln!("usage: gallerist normalize <corpus-root> [--mod <name>]... [--list-mods] [--ensure-folder-category] [--prefer-root-categories] [--include-non-v2] [--dry-run] [--json] [-v]");
        return 2;
    };
    let options = match batch_options(&flags) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{message}");
            return 2;
        }
    };

    let disk = DiskFs;
    let result = if flags.dry_run {
        let dry = DryRunFs::new(&disk);
        let result = run_normalize(&dry, &root, &options);
        print_planned_ops(&dry, flags.verbose);
        result
    } else {
        run_normalize(&disk, &root, &options)
    };
    finish_batch(result, &flags)
}

fn handle_repair(args: &[String]) -> i32 {
    let flags = parse_flags(args);
    let Some(root) = positionals(args).first().map(|s| PathBuf::from(s.as_str())) else {
        eprintln!("usage: gallerist repair <corpus-root> [--assets <dir>] [--deprefix] [--dry-run] [--json] [-v]");
        return 2;
    };
    let asset_root = flags.assets.clone().unwrap_or_else(|| root.join("images"));
    let backup = backup_plan(&flags);
    let repair_options = RepairOptions {
        deprefix: flags.deprefix,
    };

    let disk = DiskFs;
    let result = if flags.dry_run {
        let dry = DryRunFs::new(&disk);
        let result = run_repair(&dry, &root, &asset_root, &backup, &repair_options);
        print_planned_ops(&dry, flags.verbose);
        result
    } else {
        run_repair(&disk, &root, &asset_root, &backup, &repair_options)
    };
    finish_batch(result, &flags)
}

fn handle_consolidate(args: &[String]) -> i32 {
    let flags = parse_flags(args);
    let positional = positionals(args);
    let (Some(root), Some(target)) = (positional.first(), positional.get(1)) else {
        eprintln!("usage: gallerist consolidate <corpus-root> <target-folder> [--dry-run] [-v]");
        return 2;
    };

    let disk = DiskFs;
    let plan = match plan_consolidation(&disk, Path::new(root.as_str()), target.as_str()) {
        Ok(plan) => plan,
        Err(ConsolidateError::MissingRoot(path)) => {
            eprintln!("corpus root not found: {}", path.display());
            return 2;
        }
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };

    if flags.dry_run {
        for planned in &plan.moves {
            println!(
                "would move {} -> {}{}",
                planned.source.display(),
                planned.dest.display(),
                if planned.renamed { " (renamed)" } else { "" }
            );
        }
        for exhausted in &plan.exhausted {
            println!("cannot place {}: no free name", exhausted.display());
        }
        println!("dry run: {} move(s) planned, nothing written", plan.moves.len());
        return 0;
    }

    let report = apply_consolidation(&disk, &plan);
    println!(
        "consolidation complete: planned={} moved={} renamed={} failed={}",
        report.planned,
        report.moved,
        report.renamed,
        report.failed.len()
    );
    for failure in &report.failed {
        eprintln!("- {failure}");
    }
    0
}

fn handle_audit(args: &[String]) -> i32 {
    let flags = parse_flags(args);
    let Some(root) = positionals(args).first().map(|s| PathBuf::from(s.as_str())) else {
        eprintln!("usage: gallerist audit <corpus-root> [--assets <dir>] [--json]");
        return 2;
    };
    let options = match batch_options(&flags) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{message}");
            return 2;
        }
    };
    let disk = DiskFs;
    finish_batch(run_audit(&disk, &root, &options), &flags)
}

fn handle_serve(args: &[String]) -> i32 {
    let site_root = positionals(args)
        .first()
        .map(|s| PathBuf::from(s.as_str()))
        .unwrap_or_else(|| PathBuf::from("."));
    let bind_addr = env::var("GALLERIST_BIND").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    match server::run_server(&bind_addr, &site_root) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("server error: {err}");
            1
        }
    }
}

fn print_planned_ops(dry: &DryRunFs<'_>, verbose: bool) {
    if !verbose {
        return;
    }
    for op in dry.planned_ops() {
        println!("dry-run: would {op}");
    }
}

fn finish_batch(result: Result<MigrationReport, BatchError>, flags: &CommonFlags) -> i32 {
    match result {
        Ok(report) => {
            if let Some(path) = &flags.report_csv {
                if let Err(err) = report.write_csv(Path::new(path)) {
                    eprintln!("failed to write csv report: {err}");
                    return 1;
                }
            }
            if flags.json {
                println!("{}", report.to_json());
            } else {
                report.print_summary(flags.verbose);
                if flags.dry_run {
                    println!("dry run: no files were written");
                }
            }
            // Per-file errors are reported, not fatal.
            0
        }
        Err(BatchError::MissingRoot(path)) => {
            eprintln!("corpus root not found: {}", path.display());
            2
        }
        Err(err) => {
            eprintln!("{err}");
            1
        }
    }
}
