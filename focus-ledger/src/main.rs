use std::{
    collections::HashSet,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use focus_ledger::config::IngestOptions;
use focus_ledger::core::RecordSet;
use focus_ledger::format::format_task_tree;
use focus_ledger::format_duration;
use focus_ledger::merge::{MergePolicy, MergeScope};
use focus_ledger::parser::format_timestamp_key;
use focus_ledger::projectors::focus_record_projector;
use focus_ledger::storage::{JsonRecordLoader, RecordSetLoader};
use focus_ledger::{SessionLedger, ledger::IngestReport};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "focus-ledger",
    about = "Ingest focus-session exports into a task tree and session ledger",
    version
)]
struct Cli {
    /// Enable verbose logging for debugging.
    #[arg(long, global = true)]
    verbose: bool,
    /// JSON file with ingest options (merge_policy, merge_scope, break_minutes).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Ingest exports and print a summary with diagnostics.
    Ingest(IngestArgs),

    /// Print the resolved task tree with own and subtree totals.
    Tree(SourceArgs),

    /// Print focus time per calendar day.
    Daily(DailyArgs),

    /// List sessions in chronological order.
    Sessions(SessionsArgs),

    /// Export sessions as focus records (or the completion timeline) in JSON.
    Export(ExportArgs),
}

#[derive(Debug, Args)]
struct SourceArgs {
    /// JSON export files or directories containing them.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Category for bare {key: [records]} files. Defaults to the file stem.
    #[arg(long)]
    category: Option<String>,
    /// Keep both sides of a duplicate timestamp key instead of failing.
    #[arg(long)]
    best_effort: bool,
    /// Treat identical keys in different categories as collisions too.
    #[arg(long)]
    global_collisions: bool,
    /// Minutes between sessions listed under the same key.
    #[arg(long)]
    break_minutes: Option<i64>,
}

#[derive(Debug, Args)]
struct IngestArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Emit JSON instead of a human-readable summary.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct DailyArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Inclusive start date filter (YYYY-MM-DD).
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Inclusive end date filter (YYYY-MM-DD).
    #[arg(long)]
    to: Option<NaiveDate>,
    /// Emit JSON instead of a human-readable list.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct SessionsArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Inclusive start date filter (YYYY-MM-DD).
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Inclusive end date filter (YYYY-MM-DD).
    #[arg(long)]
    to: Option<NaiveDate>,
}

#[derive(Debug, Args)]
struct ExportArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Write JSON to this path instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Export the per-task completion timeline instead of focus records.
    #[arg(long)]
    completions: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let options = load_options(cli.config.as_deref())?;
    match cli.command {
        Commands::Ingest(args) => handle_ingest(args, options),
        Commands::Tree(args) => handle_tree(args, options),
        Commands::Daily(args) => handle_daily(args, options),
        Commands::Sessions(args) => handle_sessions(args, options),
        Commands::Export(args) => handle_export(args, options),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_options(path: Option<&Path>) -> Result<IngestOptions> {
    let Some(path) = path else {
        return Ok(IngestOptions::default());
    };
    let text = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    IngestOptions::from_json_str(&text).with_context(|| format!("loading options from {:?}", path))
}

fn handle_ingest(args: IngestArgs, options: IngestOptions) -> Result<()> {
    let IngestArgs { source, json } = args;
    let (ledger, report) = load_ledger(&source, options)?;

    if json {
        #[derive(serde::Serialize)]
        struct JsonOutput<'a> {
            report: IngestReport,
            sessions: usize,
            tasks: usize,
            diagnostics: &'a [focus_ledger::core::Diagnostic],
        }

        let payload = JsonOutput {
            report,
            sessions: ledger.session_count(),
            tasks: ledger.registry().len(),
            diagnostics: ledger.diagnostics(),
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!(
            "Ingested {} sessions ({} skipped) covering {} tasks",
            report.ingested,
            report.skipped,
            ledger.registry().len()
        );
        for diagnostic in ledger.diagnostics() {
            println!("  [{}] {}", diagnostic.field(), diagnostic);
        }
    }
    Ok(())
}

fn handle_tree(args: SourceArgs, options: IngestOptions) -> Result<()> {
    let (ledger, _) = load_ledger(&args, options)?;
    print!("{}", format_task_tree(&ledger));
    Ok(())
}

fn handle_daily(args: DailyArgs, options: IngestOptions) -> Result<()> {
    let DailyArgs {
        source,
        from,
        to,
        json,
    } = args;
    let (ledger, _) = load_ledger(&source, options)?;

    let days: Vec<(NaiveDate, u64)> = ledger
        .daily_totals()
        .into_iter()
        .filter(|(day, _)| from.is_none_or(|f| *day >= f) && to.is_none_or(|t| *day <= t))
        .collect();

    if json {
        let payload: Vec<serde_json::Value> = days
            .iter()
            .map(|(day, seconds)| {
                serde_json::json!({
                    "date": day.to_string(),
                    "seconds": seconds,
                    "duration": format_duration(*seconds),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        for (day, seconds) in days {
            println!("{}  {}", day, format_duration(seconds));
        }
    }
    Ok(())
}

fn handle_sessions(args: SessionsArgs, options: IngestOptions) -> Result<()> {
    let SessionsArgs { source, from, to } = args;
    let (ledger, _) = load_ledger(&source, options)?;

    let start = from
        .unwrap_or(NaiveDate::MIN)
        .and_time(chrono::NaiveTime::MIN);
    let end = to
        .and_then(|t| t.and_hms_opt(23, 59, 59))
        .unwrap_or(chrono::NaiveDateTime::MAX);

    for session in ledger.sessions_between(start, end) {
        println!(
            "{}  {:>9}  [{}] {}",
            format_timestamp_key(session.instant),
            format_duration(session.duration_seconds),
            session.category(),
            ledger.registry().name_of(session.task_title)
        );
        for &done in &session.completed {
            println!("    done: {}", ledger.registry().name_of(done));
        }
    }
    Ok(())
}

fn handle_export(args: ExportArgs, options: IngestOptions) -> Result<()> {
    let ExportArgs {
        source,
        output,
        completions,
    } = args;
    let (ledger, _) = load_ledger(&source, options)?;

    let json = if completions {
        serde_json::to_string_pretty(&focus_record_projector::project_completions(&ledger))?
    } else {
        serde_json::to_string_pretty(&focus_record_projector::project_sessions(&ledger))?
    };

    if let Some(path) = output {
        let mut file = fs::File::create(&path).with_context(|| format!("creating {:?}", path))?;
        file.write_all(json.as_bytes())
            .with_context(|| format!("writing {:?}", path))?;
        println!("Wrote export to {:?}", path);
    } else {
        println!("{json}");
    }
    Ok(())
}

fn load_ledger(args: &SourceArgs, options: IngestOptions) -> Result<(SessionLedger, IngestReport)> {
    let options = apply_overrides(args, options);
    let expanded = expand_inputs(&args.inputs)?;
    if expanded.is_empty() {
        anyhow::bail!("no .json exports found in the provided inputs");
    }

    let loader = JsonRecordLoader {
        default_category: args.category.clone(),
    };
    let mut sets: Vec<RecordSet> = Vec::new();
    for path in expanded {
        debug!(path = ?path, "loading export");
        sets.extend(loader.load_file(&path)?);
    }
    info!(sets = sets.len(), "record sets loaded");

    SessionLedger::from_record_sets(&sets, options).context("merging record sets")
}

fn apply_overrides(args: &SourceArgs, mut options: IngestOptions) -> IngestOptions {
    if args.best_effort {
        options.merge_policy = MergePolicy::BestEffort;
    }
    if args.global_collisions {
        options.merge_scope = MergeScope::Global;
    }
    if let Some(minutes) = args.break_minutes {
        options.break_minutes = minutes;
    }
    options
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

/// Export files named on the command line, in argument order, each listed once.
fn expand_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut walker = ExportWalker::default();
    for path in paths {
        let canonical =
            fs::canonicalize(path).with_context(|| format!("resolving path {:?}", path))?;
        if canonical.is_dir() {
            walker.scan(&canonical)?;
        } else if is_json(&canonical) {
            walker.add(canonical);
        } else {
            anyhow::bail!("{:?} is not a .json export", canonical);
        }
    }
    Ok(walker.files)
}

#[derive(Default)]
struct ExportWalker {
    files: Vec<PathBuf>,
    seen: HashSet<PathBuf>,
}

impl ExportWalker {
    fn add(&mut self, file: PathBuf) {
        if self.seen.insert(file.clone()) {
            self.files.push(file);
        }
    }

    /// Every `.json` below `root`, sorted; symlinks are not followed.
    fn scan(&mut self, root: &Path) -> Result<()> {
        debug!(dir = ?root, "scanning directory");
        let mut found = Vec::new();
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(&dir).with_context(|| format!("listing {:?}", dir))? {
                let entry = entry?;
                let kind = entry.file_type()?;
                let path = entry.path();
                if kind.is_dir() {
                    pending.push(path);
                } else if kind.is_file() && is_json(&path) {
                    found.push(path);
                }
            }
        }
        found.sort();
        for file in found {
            debug!(file = ?file, "found export");
            self.add(file);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const FALCON: &str = include_str!("../fixtures/lego-millennium-falcon.json");
    const WALKING: &str = include_str!("../fixtures/walking.json");

    fn source_args(inputs: Vec<PathBuf>) -> SourceArgs {
        SourceArgs {
            inputs,
            category: None,
            best_effort: false,
            global_collisions: false,
            break_minutes: None,
        }
    }

    #[test]
    fn expand_inputs_walks_directories_and_skips_other_files() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let nested = tmp.path().join("exports").join("lego");
        fs::create_dir_all(&nested).expect("mkdir nested");
        fs::write(nested.join("falcon.json"), FALCON).expect("write falcon");
        fs::write(tmp.path().join("exports").join("readme.txt"), "notes").expect("write txt");
        let walking = tmp.path().join("walking.json");
        fs::write(&walking, WALKING).expect("write walking");

        let expanded =
            expand_inputs(&[tmp.path().join("exports"), walking.clone(), walking.clone()])
                .expect("expand");

        assert_eq!(expanded.len(), 2);
        assert!(expanded[0].ends_with("exports/lego/falcon.json"));
        assert_eq!(expanded[1], fs::canonicalize(&walking).expect("canonical"));
    }

    #[test]
    fn expand_inputs_rejects_non_json_files() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let txt = tmp.path().join("notes.txt");
        fs::write(&txt, "x").expect("write txt");
        assert!(expand_inputs(&[txt]).is_err());
    }

    #[test]
    fn duplicate_exports_fail_unless_best_effort() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let a = tmp.path().join("falcon.json");
        let b = tmp.path().join("falcon-again.json");
        fs::write(&a, FALCON).expect("write a");
        fs::write(&b, FALCON).expect("write b");

        let strict = source_args(vec![a.clone(), b.clone()]);
        let err = load_ledger(&strict, IngestOptions::default()).unwrap_err();
        assert!(format!("{err:#}").contains("Jun 23, 2025 - 12:08PM"));

        let mut lenient = source_args(vec![a, b]);
        lenient.best_effort = true;
        let (ledger, report) = load_ledger(&lenient, IngestOptions::default()).expect("ledger");
        assert_eq!(report.ingested, 8);
        assert_eq!(ledger.diagnostics().len(), 4);
    }

    #[test]
    fn flags_override_config_file() {
        let mut args = source_args(vec![]);
        args.global_collisions = true;
        args.break_minutes = Some(5);
        let options = apply_overrides(
            &args,
            IngestOptions::from_json_str(r#"{ "break_minutes": 30 }"#).expect("options"),
        );
        assert_eq!(options.merge_scope, MergeScope::Global);
        assert_eq!(options.merge_policy, MergePolicy::Strict);
        assert_eq!(options.break_minutes, 5);
    }

    #[test]
    fn cli_parses_subcommands_with_global_flags() {
        let cli = Cli::try_parse_from([
            "focus-ledger",
            "daily",
            "exports/",
            "--from",
            "2025-01-01",
            "--best-effort",
            "--verbose",
        ])
        .expect("parse");
        assert!(cli.verbose);
        match cli.command {
            Commands::Daily(args) => {
                assert_eq!(args.from, NaiveDate::from_ymd_opt(2025, 1, 1));
                assert!(args.source.best_effort);
                assert_eq!(args.source.inputs, vec![PathBuf::from("exports/")]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
