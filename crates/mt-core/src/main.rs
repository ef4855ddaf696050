//! Movement Triage Core - per-patient movement baselines and anomaly flags
//!
//! The main entry point for mt-core, handling:
//! - Event log ingestion and optional gap imputation
//! - Per-patient transition model construction
//! - Impossible-transition scanning and day flagging
//! - Report rendering (json, md, summary, csv)

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use mt_common::{format_error_human, Error, OutputFormat, Result, StructuredError};
use mt_core::config::{load_config, validate_config, ConfigOptions, ResolvedConfig, ValidationError};
use mt_core::engine::{analyze, build_models};
use mt_core::events::EventLog;
use mt_core::exit_codes::ExitCode;
use mt_core::impute::impute_log;
use mt_core::ingest::read_events_csv;
use mt_core::log_event;
use mt_core::logging::{event_names, generate_run_id, init_logging, LogConfig, LogContext, Stage};
use mt_core::output::{render_analysis, render_models, render_states, MatrixDocument, ModelView, RunMeta};
use mt_core::state_index::StateIndex;

/// Movement Triage Core - flag days with impossible room-to-room transitions
#[derive(Parser)]
#[command(name = "mt-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to an analysis.json config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory searched for analysis.json (overrides MOVEMENT_TRIAGE_CONFIG)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every patient's model and flag anomalous days
    Analyze(AnalyzeArgs),

    /// Build and print per-patient transition probability matrices
    Matrix(MatrixArgs),

    /// Print the global state index derived from an event log
    States(StatesArgs),

    /// Validate the resolved configuration
    Check,

    /// Print version information
    Version,
}

/// Options shared by commands that model an event log.
#[derive(Args, Debug)]
struct InputArgs {
    /// Event log CSV (patient_id, timestamp, location_name)
    events: PathBuf,

    /// JSON array of state names pinning the state index
    #[arg(long)]
    states: Option<PathBuf>,

    /// Impute sensor gaps before modelling
    #[arg(long)]
    impute: bool,

    /// Worker threads (default: available parallelism)
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Probability below which a transition is impossible
    #[arg(long)]
    threshold: Option<f64>,

    /// Flag a day when its impossible count exceeds this
    #[arg(long)]
    occurrences: Option<u32>,
}

#[derive(Args, Debug)]
struct MatrixArgs {
    #[command(flatten)]
    input: InputArgs,
}

#[derive(Args, Debug)]
struct StatesArgs {
    /// Event log CSV (patient_id, timestamp, location_name)
    events: PathBuf,

    /// Impute sensor gaps first (imputation can introduce new states)
    #[arg(long)]
    impute: bool,
}

fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::from_env(cli.global.verbose, cli.global.quiet);
    init_logging(&log_config);

    let ctx = LogContext::new(generate_run_id());
    log_event!(ctx, DEBUG, event_names::RUN_STARTED, Stage::Init, "mt-core started");

    let outcome = match &cli.command {
        Commands::Analyze(args) => run_analyze(&cli.global, &ctx, args),
        Commands::Matrix(args) => run_matrix(&cli.global, &ctx, args),
        Commands::States(args) => run_states(&cli.global, &ctx, args),
        Commands::Check => run_check(&cli.global),
        Commands::Version => {
            print_version(&cli.global);
            Ok(ExitCode::Clean)
        }
    };

    let exit_code = outcome.unwrap_or_else(|e| output_error(&cli.global, &e));
    log_event!(
        ctx,
        DEBUG,
        event_names::RUN_FINISHED,
        Stage::Report,
        "mt-core finished",
        exit_code = exit_code.as_i32()
    );
    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Command implementations
// ============================================================================

fn run_analyze(global: &GlobalOpts, ctx: &LogContext, args: &AnalyzeArgs) -> Result<ExitCode> {
    let mut resolved = resolve_config(global, ctx)?;
    {
        let config = &mut resolved.config;
        if let Some(t) = args.threshold {
            config.probability_threshold = t;
        }
        if let Some(k) = args.occurrences {
            config.occurrence_threshold = k;
        }
        if let Some(w) = args.input.workers {
            config.workers = Some(w);
        }
    }
    validate_overrides(&resolved)?;

    let (log, index) = load_input(&args.input, &resolved, ctx)?;
    let config = &resolved.config;

    log_event!(
        ctx,
        INFO,
        event_names::SCAN_STARTED,
        Stage::Scan,
        "analysis started",
        probability_threshold = config.probability_threshold,
        occurrence_threshold = config.occurrence_threshold
    );
    let report = analyze(&log, &index, &config.thresholds(), config.effective_workers())?;
    for failure in &report.failures {
        log_event!(
            ctx,
            WARN,
            event_names::SCAN_PATIENT_FAILED,
            Stage::Build,
            "patient could not be analyzed",
            patient_id = failure.item_id.as_str(),
            code = failure.error.code
        );
    }
    log_event!(
        ctx,
        INFO,
        event_names::SCAN_FINISHED,
        Stage::Scan,
        "analysis finished",
        flagged_patients = report.summary.patients_flagged,
        flagged_days = report.summary.days_flagged,
        failed = report.summary.patients_failed
    );

    let meta = RunMeta::new(ctx.run_id.clone(), resolved.snapshot());
    emit(&render_analysis(&report, &meta, global.format)?);

    Ok(if report.has_flags() {
        ExitCode::AnomaliesFound
    } else if report.has_failures() {
        ExitCode::PartialFail
    } else {
        ExitCode::Clean
    })
}

fn run_matrix(global: &GlobalOpts, ctx: &LogContext, args: &MatrixArgs) -> Result<ExitCode> {
    let mut resolved = resolve_config(global, ctx)?;
    if let Some(w) = args.input.workers {
        resolved.config.workers = Some(w);
    }
    validate_overrides(&resolved)?;

    let (log, index) = load_input(&args.input, &resolved, ctx)?;
    let batch = build_models(&log, &index, resolved.config.effective_workers());

    let summary = index.summary();
    let doc = MatrixDocument {
        states: &summary,
        models: batch.succeeded.iter().map(|(_, m)| ModelView::from(m)).collect(),
        failures: &batch.failed,
    };
    let meta = RunMeta::new(ctx.run_id.clone(), resolved.snapshot());
    emit(&render_models(&doc, &meta, global.format)?);

    Ok(if batch.all_succeeded() {
        ExitCode::Clean
    } else {
        ExitCode::PartialFail
    })
}

fn run_states(global: &GlobalOpts, ctx: &LogContext, args: &StatesArgs) -> Result<ExitCode> {
    let resolved = resolve_config(global, ctx)?;
    let log = read_events(&args.events, ctx)?;
    let log = maybe_impute(log, args.impute, &resolved, ctx);
    let index = StateIndex::from_log(&log);

    let meta = RunMeta::new(ctx.run_id.clone(), resolved.snapshot());
    emit(&render_states(&index.summary(), &meta, global.format)?);
    Ok(ExitCode::Clean)
}

fn run_check(global: &GlobalOpts) -> Result<ExitCode> {
    let options = config_options(global);
    let resolved = load_config(&options)?;
    let snapshot = resolved.snapshot();

    match global.format {
        OutputFormat::Json => {
            let response = serde_json::json!({
                "status": "ok",
                "config_dir": resolved.config_dir,
                "using_defaults": snapshot.path.is_none(),
                "config": snapshot,
                "effective_workers": resolved.config.effective_workers(),
            });
            emit(&serde_json::to_string_pretty(&response)?);
        }
        _ => {
            let source = snapshot
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "built-in defaults".to_string());
            emit(&format!("config ok ({})", source));
        }
    }
    Ok(ExitCode::Clean)
}

fn print_version(global: &GlobalOpts) {
    let version = env!("CARGO_PKG_VERSION");
    match global.format {
        OutputFormat::Json => {
            let response = serde_json::json!({
                "name": "mt-core",
                "version": version,
                "config_schema_version": mt_core::config::CONFIG_SCHEMA_VERSION,
            });
            emit(&response.to_string());
        }
        _ => emit(&format!("mt-core {}", version)),
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn config_options(global: &GlobalOpts) -> ConfigOptions {
    ConfigOptions {
        config_dir: global.config_dir.clone(),
        config_path: global.config.clone(),
    }
}

fn resolve_config(global: &GlobalOpts, ctx: &LogContext) -> Result<ResolvedConfig> {
    let options = config_options(global);
    let resolved = load_config(&options)?;
    match &resolved.path {
        Some(path) => {
            let path = path.display().to_string();
            log_event!(
                ctx,
                INFO,
                event_names::CONFIG_LOADED,
                Stage::Init,
                "config loaded",
                path = path.as_str()
            )
        }
        None => log_event!(
            ctx,
            DEBUG,
            event_names::CONFIG_DEFAULT_USED,
            Stage::Init,
            "no config file, using defaults"
        ),
    }
    Ok(resolved)
}

/// Re-validate after CLI overrides; bad flag values are argument errors.
fn validate_overrides(resolved: &ResolvedConfig) -> Result<()> {
    validate_config(&resolved.config).map_err(|e| {
        let name = match &e {
            ValidationError::ProbabilityThresholdRange { .. } => "threshold",
            ValidationError::WorkersZero => "workers",
            _ => "config",
        };
        Error::InvalidParameter {
            name: name.to_string(),
            message: e.to_string(),
        }
    })
}

fn read_events(path: &Path, ctx: &LogContext) -> Result<EventLog> {
    let log = read_events_csv(path)?;
    log_event!(
        ctx,
        INFO,
        event_names::LOAD_FINISHED,
        Stage::Load,
        "event log loaded",
        events = log.len(),
        patients = log.patients().len()
    );
    Ok(log)
}

fn maybe_impute(log: EventLog, flag: bool, resolved: &ResolvedConfig, ctx: &LogContext) -> EventLog {
    if !flag && resolved.config.impute.is_none() {
        return log;
    }
    let impute_config = resolved.config.impute.clone().unwrap_or_default();
    let imputed = impute_log(&log, &impute_config);
    log_event!(
        ctx,
        INFO,
        event_names::IMPUTE_FINISHED,
        Stage::Impute,
        "gaps imputed",
        original = log.len(),
        inserted = imputed.len().saturating_sub(log.len())
    );
    imputed
}

fn load_input(input: &InputArgs, resolved: &ResolvedConfig, ctx: &LogContext) -> Result<(EventLog, StateIndex)> {
    let log = read_events(&input.events, ctx)?;
    let log = maybe_impute(log, input.impute, resolved, ctx);

    let index = match &input.states {
        Some(path) => StateIndex::load(path)?,
        None => StateIndex::from_log(&log),
    };
    log_event!(
        ctx,
        INFO,
        event_names::STATES_RESOLVED,
        Stage::Load,
        "state index resolved",
        n_state = index.len(),
        pinned = input.states.is_some()
    );
    Ok((log, index))
}

fn emit(payload: &str) {
    if payload.ends_with('\n') {
        print!("{}", payload);
    } else {
        println!("{}", payload);
    }
}

/// Report a fatal error on stderr and pick the exit code.
fn output_error(global: &GlobalOpts, error: &Error) -> ExitCode {
    match global.format {
        OutputFormat::Json => {
            let structured = StructuredError::from(error);
            eprintln!("{}", structured.to_json());
        }
        _ => {
            let use_color = !global.no_color && std::io::stderr().is_terminal();
            eprintln!("{}", format_error_human(error, use_color));
        }
    }
    ExitCode::for_error(error)
}
