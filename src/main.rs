use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use todosync::config::{Config, config_path};
use todosync::logging::init_logging;
use todosync::reconcile::{ClosureMatch, ReconciliationPlan, Reconciler};
use todosync::remote::todoist::TodoistClient;
use todosync::scrape::{CaptureFileScraper, default_selectors, scrape_lists};
use todosync::{RawObservedTask, SyncError, TaskSource, storage, title_codec};

#[derive(Parser)]
#[command(name = "todosync")]
#[command(author, version, about = "Mirror scraped to-do lists into a Todoist project")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a captured web UI export into the intermediate task file
    Scrape {
        /// JSON capture of the task lists, keyed by list name
        #[arg(short, long)]
        capture: PathBuf,

        /// Output task file (default: [data].input_path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Reconcile the intermediate task file into the Todoist project
    Sync {
        /// Task file to read (default: [data].input_path)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Print the plan without creating or closing anything
        #[arg(long)]
        dry_run: bool,

        /// Closure rule: `cleaned_title` (default) closes a remote task unless its
        /// content equals a decoded title; `substring` closes it only when the
        /// content appears in no task line, so remote "Buy" stays open beside
        /// "Buy milk" in that mode alone
        #[arg(long)]
        closure_match: Option<String>,
    },

    /// Scrape from a capture, then sync
    Run {
        #[arg(short, long)]
        capture: PathBuf,
    },

    /// Show the fields decoded from one task line
    Decode { line: String },

    /// Build a task line from its fields
    Encode {
        #[arg(short, long)]
        title: String,

        /// Due date as YYYY-MM-DD
        #[arg(short, long)]
        due: Option<String>,

        #[arg(short, long)]
        important: bool,

        /// none, flagged or assigned
        #[arg(short, long, default_value = "none")]
        source: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = Config::load();

    if let Err(err) = init_logging(&config.logging.level, &config.data.log_dir) {
        eprintln!("Logging disabled: {err}");
    }

    match run(cli, config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("event=run status=error error={e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when the run finished with per-item failures.
fn run(cli: Cli, mut config: Config) -> Result<bool, SyncError> {
    match cli.command {
        Commands::Scrape { capture, output } => {
            let output = output.unwrap_or_else(|| config.data.input_path.clone());
            cmd_scrape(&config, &capture, &output)?;
            Ok(true)
        }
        Commands::Sync {
            input,
            dry_run,
            closure_match,
        } => {
            if let Some(token) = closure_match {
                config.sync.closure_match = ClosureMatch::from_token(&token).ok_or_else(|| {
                    SyncError::Config(format!("unknown closure match `{token}`"))
                })?;
            }
            let input = input.unwrap_or_else(|| config.data.input_path.clone());
            cmd_sync(&config, &input, dry_run)
        }
        Commands::Run { capture } => {
            let input = config.data.input_path.clone();
            cmd_scrape(&config, &capture, &input)?;
            cmd_sync(&config, &input, false)
        }
        Commands::Decode { line } => {
            cmd_decode(&line);
            Ok(true)
        }
        Commands::Encode {
            title,
            due,
            important,
            source,
        } => {
            cmd_encode(&title, due.as_deref(), important, &source)?;
            Ok(true)
        }
    }
}

fn cmd_scrape(config: &Config, capture: &Path, output: &Path) -> Result<(), SyncError> {
    let mut scraper = CaptureFileScraper::open(capture)?;
    let outcome = scrape_lists(&mut scraper, &default_selectors(&config.scrape.app_url));
    for list in &outcome.failed_lists {
        eprintln!("Skipped list '{list}' (not available).");
    }

    if outcome.lines.is_empty() {
        println!("No tasks found; leaving {} untouched.", output.display());
        return Ok(());
    }
    storage::write_task_lines(output, &outcome.lines)?;
    println!("Wrote {} task(s) to {}.", outcome.lines.len(), output.display());
    Ok(())
}

fn cmd_sync(config: &Config, input: &Path, dry_run: bool) -> Result<bool, SyncError> {
    let settings = config.sync_settings()?;
    if !input.exists() {
        return Err(SyncError::Config(format!(
            "input file {} not found; run `todosync scrape` first (config: {})",
            input.display(),
            config_path().display()
        )));
    }

    let lines = storage::read_task_lines(input)?;
    if lines.is_empty() {
        println!("No tasks found in the input file. Nothing to sync.");
        return Ok(true);
    }
    println!("Found {} task(s) to sync.", lines.len());

    let client = TodoistClient::new(&config.todoist.api_base, &settings.remote_token)?;
    let reconciler = Reconciler::new(client, settings);

    if dry_run {
        let plan = reconciler.preview(&lines)?;
        print_plan(&plan);
        return Ok(true);
    }

    let summary = reconciler.sync(&lines)?;
    println!("\n--- Sync Summary ---");
    println!("{}", summary.summary());
    for failure in &summary.failures {
        println!(
            "  {} '{}' failed: {}",
            failure.action.as_str(),
            failure.title,
            failure.reason
        );
    }
    println!("--------------------");
    Ok(!summary.has_failures())
}

fn print_plan(plan: &ReconciliationPlan) {
    for planned in &plan.to_create {
        let request = &planned.request;
        println!(
            "create '{}' due={} priority={} labels=[{}]",
            request.content,
            request.due_date.as_deref().unwrap_or("-"),
            request.priority.as_level(),
            request.labels.join(", ")
        );
    }
    for skipped in &plan.skipped {
        println!("skip   '{}' ({})", skipped.title, skipped.reason.as_str());
    }
    for task in &plan.to_close {
        println!("close  '{}' (id {})", task.content, task.id);
    }
    if plan.is_noop() {
        println!("Nothing to create or close.");
    }
}

fn cmd_decode(line: &str) {
    let task = title_codec::decode(line);
    println!("title:     {}", task.base_title);
    println!(
        "due:       {}",
        task.due_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!("important: {}", task.important);
    println!("source:    {:?}", task.source);
}

fn cmd_encode(
    title: &str,
    due: Option<&str>,
    important: bool,
    source: &str,
) -> Result<(), SyncError> {
    let source = TaskSource::from_token(source)
        .ok_or_else(|| SyncError::InvalidInput(format!("unknown source `{source}`")))?;
    let due_date = due
        .map(|value| {
            NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
                .map_err(|e| SyncError::InvalidInput(format!("invalid due date `{value}`: {e}")))
        })
        .transpose()?;

    let task = RawObservedTask {
        base_title: title.to_string(),
        due_date,
        important,
        source,
    };
    println!("{}", title_codec::encode(&task)?);
    Ok(())
}
