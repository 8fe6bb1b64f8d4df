//! Command implementations for snapsweep CLI

use crate::audit::AuditLog;
use crate::cli::{Cli, Commands, OutputFormat};
use crate::config::SweepConfig;
use crate::error::{Result, SweepError};
use crate::output::{JsonFormatter, PrettyPrinter};
use crate::progress::ProgressReporter;
use crate::session;
use crate::sweep::{self, SweepRequest, SweepScope};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use uuid::Uuid;

/// Flags shared by every subcommand
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub config: PathBuf,
    pub dry_run: bool,
    pub yes: bool,
    pub format: OutputFormat,
}

impl GlobalOptions {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        Ok(Self {
            config: cli.config.clone(),
            dry_run: cli.dry_run,
            yes: cli.yes,
            format: OutputFormat::parse(&cli.format).map_err(SweepError::invalid_input)?,
        })
    }

    fn progress(&self) -> ProgressReporter {
        match self.format {
            OutputFormat::Pretty => ProgressReporter::new(),
            OutputFormat::Json => ProgressReporter::new_minimal(),
        }
    }
}

/// How a command finished when it did not return an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Clean,
    /// Completed, but at least one item failed
    PartialFailure,
}

/// Execute a command
pub fn execute_command(command: Commands, options: &GlobalOptions) -> Result<RunStatus> {
    match command {
        Commands::Init { force } => init_command(options, force),
        Commands::Check => check_command(options),
        Commands::Inventory { vms } => inventory_command(options, vms),
        Commands::Vms { vms } => sweep_command(options, SweepScope::Vms, vms),
        Commands::Replicas => sweep_command(options, SweepScope::Replicas, Vec::new()),
        Commands::Run { vms } => sweep_command(options, SweepScope::All, vms),
    }
}

/// Write a configuration template
fn init_command(options: &GlobalOptions, force: bool) -> Result<RunStatus> {
    SweepConfig::write_template(&options.config, force)?;

    println!("✅ Wrote configuration template to: {}", options.config.display());
    println!("📝 Set the array and vCenter URLs, then export the password variables it names.");

    Ok(RunStatus::Clean)
}

/// Log in to both endpoints and log out again
fn check_command(options: &GlobalOptions) -> Result<RunStatus> {
    let config = SweepConfig::load(&options.config)?;
    let mut audit = AuditLog::disabled();

    let sessions = session::connect(&config, &mut audit)?;
    sessions.close(&config, &mut audit);

    println!("✅ Array session OK: {}", config.array.url);
    println!("✅ vCenter session OK: {}", config.vcenter.endpoint.url);

    Ok(RunStatus::Clean)
}

/// Show what a sweep would look at, without touching anything
fn inventory_command(options: &GlobalOptions, vm_patterns: Vec<String>) -> Result<RunStatus> {
    let config = SweepConfig::load(&options.config)?;
    let request = SweepRequest::new(config.policy.clone(), SweepScope::All, true)
        .with_vm_patterns(vm_patterns);

    let mut audit = AuditLog::disabled();
    let mut progress = options.progress();

    let sessions = session::connect(&config, &mut audit)?;
    let result = sweep::survey(&sessions.array, &sessions.vcenter, &request, &mut progress);
    sessions.close(&config, &mut audit);
    drop(progress);

    let survey = result?;
    match options.format {
        OutputFormat::Pretty => PrettyPrinter::print_survey(&survey),
        OutputFormat::Json => println!("{}", JsonFormatter::format(&survey)?),
    }

    Ok(RunStatus::Clean)
}

/// Run one or both deletion procedures
fn sweep_command(options: &GlobalOptions, scope: SweepScope, vm_patterns: Vec<String>) -> Result<RunStatus> {
    let config = SweepConfig::load(&options.config)?;
    let request = SweepRequest::new(config.policy.clone(), scope, options.dry_run)
        .with_vm_patterns(vm_patterns);

    if !options.dry_run && !options.yes {
        confirm(&request, &mut std::io::stdin().lock(), &mut std::io::stdout())?;
    }

    let mut audit = AuditLog::open(&config.log_file, Uuid::new_v4())?;
    log::info!("Run {} logging to {}", audit.run_id(), config.log_file.display());

    let mut progress = options.progress();

    let sessions = session::connect(&config, &mut audit)?;
    let result = sweep::run(&sessions.array, &sessions.vcenter, &request, &mut audit, &mut progress);
    sessions.close(&config, &mut audit);
    drop(progress);

    let report = result?;
    match options.format {
        OutputFormat::Pretty => PrettyPrinter::print_sweep_report(&report),
        OutputFormat::Json => println!("{}", JsonFormatter::format_sweep_report(&report)?),
    }

    if report.has_failures() {
        Ok(RunStatus::PartialFailure)
    } else {
        Ok(RunStatus::Clean)
    }
}

/// Ask before deleting anything; anything but y/yes cancels
pub fn confirm(request: &SweepRequest, input: &mut impl BufRead, output: &mut impl Write) -> Result<()> {
    if request.scope.includes_vms() {
        writeln!(
            output,
            "⚠️  VM snapshots matching '{}' will be offlined and deleted.",
            request.policy.snapshot_pattern
        )?;
    }
    if request.scope.includes_replicas() {
        writeln!(
            output,
            "⚠️  Replica snapshots matching '{}' will be deleted.",
            request.policy.replica_snapshot_pattern
        )?;
    }
    write!(output, "Continue? (y/N) ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;

    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Ok(()),
        _ => Err(SweepError::Cancelled),
    }
}
