// CleanLog - main.rs
//
// Application entry point. Handles:
// 1. CLI argument parsing
// 2. Config loading (platform config dir or --config)
// 3. Logging initialisation (debug mode support)
// 4. Dispatch: dashboard server (default), one-shot module runs, launcher

use cleanlog::app::{launcher, pipeline};
use cleanlog::core::model::TimeUnit;
use cleanlog::core::report::StandardReport;
use cleanlog::platform::config::{self, AppConfig, PlatformPaths};
use cleanlog::platform::fs;
use cleanlog::util::error::CleanLogError;
use cleanlog::util::{constants, logging};
use cleanlog::{app, web};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// CleanLog - personal data governance center.
///
/// File dedup, chat/bill insight, ledger reconciliation and log analysis
/// behind a browser dashboard. Without a subcommand the dashboard is served.
#[derive(Parser, Debug)]
#[command(name = "cleanlog", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config.toml (default: platform config directory).
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Dashboard port (overrides [server] port).
    #[arg(long = "server.port", global = true)]
    server_port: Option<u16>,

    /// Dashboard bind address (overrides [server] address).
    #[arg(long = "server.address", global = true)]
    server_address: Option<String>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug", global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Serve the dashboard (default).
    Serve,

    /// Find duplicate files (default: Downloads and Documents).
    Dedup {
        paths: Vec<PathBuf>,

        /// Directory to write the report artifacts to.
        #[arg(short = 'o', long = "out")]
        out: Option<PathBuf>,
    },

    /// Analyse a chat database (.db) or bill export (CSV / Excel).
    Chat {
        path: PathBuf,

        /// Unit of .db timestamps: s or ms (overrides [chat] time_unit).
        #[arg(long = "time-unit", value_parser = parse_time_unit)]
        time_unit: Option<TimeUnit>,

        #[arg(short = 'o', long = "out")]
        out: Option<PathBuf>,
    },

    /// Reconcile bill files from several platforms.
    Reconcile {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[arg(short = 'o', long = "out")]
        out: Option<PathBuf>,
    },

    /// Classify log lines from a file, or stdin when no file is given.
    Logs {
        file: Option<PathBuf>,

        #[arg(short = 'o', long = "out")]
        out: Option<PathBuf>,
    },

    /// Start the dashboard in a container when possible, else build and run locally.
    Launch,
}

fn parse_time_unit(raw: &str) -> Result<TimeUnit, String> {
    TimeUnit::parse(raw).ok_or_else(|| format!("'{raw}' is not a time unit (expected s or ms)"))
}

/// Address and port to bind: CLI flags over config.
fn bind_target(cli: &Cli, config: &AppConfig) -> (String, u16) {
    (
        cli.server_address
            .clone()
            .unwrap_or_else(|| config.server_address.clone()),
        cli.server_port.unwrap_or(config.server_port),
    )
}

/// Launcher settings; the port follows the same CLI > config merge as `serve`.
fn launch_settings(cli: &Cli, config: &AppConfig) -> launcher::LaunchSettings {
    launcher::LaunchSettings {
        container_runtime: config.container_runtime.clone(),
        image_tag: config.image_tag.clone(),
        port: bind_target(cli, config).1,
    }
}

fn print_report(report: &StandardReport, warnings: &[String]) {
    println!("== {} ==", report.module.title());
    println!("{}", report.scenario);
    for w in warnings {
        println!("warning: {w}");
    }
    println!("\nProblem discovery");
    for (label, value) in &report.problem_discovery {
        println!("  {label}: {value}");
    }
    if !report.cleaning_actions.is_empty() {
        println!("\nCleaning actions");
        for (i, action) in report.cleaning_actions.iter().enumerate() {
            println!("  {}. {action}", i + 1);
        }
    }
    if !report.effect_verification.is_empty() {
        println!("\nEffect verification");
        for (label, value) in &report.effect_verification {
            println!("  {label}: {value}");
        }
    }
}

fn finish(report: &StandardReport, warnings: &[String], out: Option<&Path>) -> Result<(), CleanLogError> {
    print_report(report, warnings);
    if let Some(dir) = out {
        for path in pipeline::save_artifacts(report, dir)? {
            println!("wrote {}", path.display());
        }
    }
    Ok(())
}

fn serve(cli: &Cli, config: AppConfig) -> Result<(), CleanLogError> {
    let (address, port) = bind_target(cli, &config);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|source| CleanLogError::Server {
            address: format!("{address}:{port}"),
            source,
        })?;
    let state = app::state::AppState::new(config);
    runtime.block_on(web::serve(state, &address, port))
}

fn run(cli: &Cli, config: AppConfig) -> Result<ExitCode, CleanLogError> {
    match cli.command.as_ref().unwrap_or(&Command::Serve) {
        Command::Serve => serve(cli, config)?,
        Command::Dedup { paths, out } => {
            let roots = if paths.is_empty() {
                fs::default_scan_dirs()
            } else {
                paths.clone()
            };
            let output = pipeline::run_file_cleaner(&roots, &config);
            finish(&output.report, &output.warnings, out.as_deref())?;
        }
        Command::Chat {
            path,
            time_unit,
            out,
        } => {
            let unit = time_unit.unwrap_or_else(|| pipeline::chat_time_unit(&config));
            let report = pipeline::run_chat_analyzer(path, unit)?;
            finish(&report, &[], out.as_deref())?;
        }
        Command::Reconcile { paths, out } => {
            let run = pipeline::run_finance_etl(paths, &config);
            let mut warnings = run.skipped.clone();
            warnings.extend(run.consistency.warnings.iter().cloned());
            finish(&run.report, &warnings, out.as_deref())?;
        }
        Command::Logs { file, out } => {
            let text = match file {
                Some(path) => String::from_utf8_lossy(&fs::read_source(path)?).into_owned(),
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .map_err(|source| CleanLogError::Io {
                            path: PathBuf::from("<stdin>"),
                            operation: "read log text",
                            source,
                        })?;
                    buf
                }
            };
            let report = pipeline::run_log_analyzer(&text);
            finish(&report, &[], out.as_deref())?;
        }
        Command::Launch => {
            let settings = launch_settings(cli, &config);
            let code = launcher::launch(
                &mut launcher::SystemRunner,
                &settings,
                &mut std::io::stdout(),
            )?;
            return Ok(ExitCode::from(code as u8));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PlatformPaths::resolve().config_file());
    let (app_config, config_warnings) = config::load_config(&config_path);

    logging::init(
        cli.debug,
        app_config.log_level.as_deref(),
        app_config.log_file.as_deref(),
    );
    tracing::info!(
        version = constants::APP_VERSION,
        debug = cli.debug,
        config = %config_path.display(),
        "CleanLog starting"
    );
    for w in &config_warnings {
        tracing::warn!(warning = %w, "Config warning");
    }

    match run(&cli, app_config) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "CleanLog failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
