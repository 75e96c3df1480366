//! reflectc CLI - reflection metadata compiler for annotated C++ headers
//!
//! Scans a source tree for reflection markers and writes one generated header
//! per annotated input file.

use clap::{Parser, Subcommand};
use reflectc::{Driver, ReflectConfig, RunReport, WriteOutcome};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "reflect.yaml";

#[derive(Parser)]
#[command(name = "reflectc")]
#[command(version, about = "Reflection metadata compiler for annotated C++ headers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every subcommand
#[derive(clap::Args)]
struct InputArgs {
    /// Path to reflect.yaml (default: ./reflect.yaml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the input root
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Override the scanned extensions (repeatable)
    #[arg(long = "ext")]
    extensions: Vec<String>,

    /// Add an exclude pattern (repeatable)
    #[arg(long)]
    exclude: Vec<String>,

    /// Worker threads
    #[arg(short, long)]
    jobs: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate reflection headers
    Generate {
        #[command(flatten)]
        input: InputArgs,

        /// Override the output root
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Backends to run (legacy, type-info); repeatable
        #[arg(short, long = "backend")]
        backends: Vec<String>,

        /// Emit type-registration blocks
        #[arg(long)]
        type_info: bool,

        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,

        /// Like --dry-run, but fail when any artifact is out of date
        #[arg(long)]
        check: bool,
    },

    /// Scan and resolve without generating anything
    Validate {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Print the resolved model as JSON
    Dump {
        #[command(flatten)]
        input: InputArgs,
    },
}

fn load_config(args: &InputArgs) -> Result<ReflectConfig, String> {
    let mut config = match &args.config {
        Some(path) => ReflectConfig::from_file(path).map_err(|e| e.to_string())?,
        None if Path::new(DEFAULT_CONFIG).is_file() => {
            ReflectConfig::from_file(DEFAULT_CONFIG).map_err(|e| e.to_string())?
        }
        None => ReflectConfig::default(),
    };

    if let Some(input) = &args.input {
        config.input.root = input.clone();
    }
    if !args.extensions.is_empty() {
        config.input.extensions = args.extensions.clone();
    }
    config.input.exclude.extend(args.exclude.iter().cloned());
    Ok(config)
}

fn driver_for(config: ReflectConfig, jobs: Option<usize>) -> Result<Driver, String> {
    Ok(Driver::new(config).map_err(|e| e.to_string())?.jobs(jobs))
}

fn print_diagnostics(report: &RunReport) {
    for warning in &report.warnings {
        eprintln!("  ⚠ {}", warning);
    }
    for err in &report.errors {
        eprintln!("  ✗ {}", err);
    }
    if let Some(fatal) = &report.fatal {
        eprintln!("  ✗ {}", fatal);
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate {
            input,
            output,
            backends,
            type_info,
            dry_run,
            check,
        } => generate(input, output, backends, type_info, dry_run, check),
        Commands::Validate { input } => validate(input),
        Commands::Dump { input } => dump(input),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn generate(
    input: InputArgs,
    output: Option<PathBuf>,
    backends: Vec<String>,
    type_info: bool,
    dry_run: bool,
    check: bool,
) -> Result<(), String> {
    let mut config = load_config(&input)?;
    if let Some(output) = output {
        config.output.root = output;
    }
    if !backends.is_empty() {
        config.codegen.backends = backends;
    }
    if type_info {
        config.codegen.type_info = true;
    }

    println!("🔧 Generating reflection data from {}...", config.input.root.display());
    let driver = driver_for(config, input.jobs)?.dry_run(dry_run || check);
    let report = driver.run().map_err(|e| e.to_string())?;

    print_diagnostics(&report);
    if report.fatal.is_some() {
        return Err("run aborted, nothing was written".to_string());
    }

    println!("  ✓ Scanned {} files, {} containers", report.files_scanned, report.containers);
    for artifact in &report.artifacts {
        match &artifact.outcome {
            WriteOutcome::Written => println!("  ✓ Generated {}", artifact.path.display()),
            WriteOutcome::Outdated => println!("  ℹ Out of date: {}", artifact.path.display()),
            WriteOutcome::Failed(reason) => eprintln!("  ✗ Failed {}: {}", artifact.path.display(), reason),
            WriteOutcome::Unchanged => {}
        }
    }
    for path in &report.pruned {
        println!("  🗑 Stale: {}", path.display());
    }
    println!(
        "  ℹ {} unchanged",
        report.count(&WriteOutcome::Unchanged)
    );

    if !report.is_success() {
        return Err(format!("{} error(s) reported", report.errors.len()));
    }
    if check && report.has_outdated() {
        return Err("generated files are out of date".to_string());
    }

    println!("✨ Generation complete!");
    Ok(())
}

fn validate(input: InputArgs) -> Result<(), String> {
    let config = load_config(&input)?;
    println!("🔍 Validating {}...", config.input.root.display());

    let report = driver_for(config, input.jobs)?.validate().map_err(|e| e.to_string())?;
    print_diagnostics(&report);
    if !report.is_success() {
        return Err("validation failed".to_string());
    }

    println!("  ✓ {} files, {} containers", report.files_scanned, report.containers);
    println!("✅ All reflected types are valid!");
    Ok(())
}

fn dump(input: InputArgs) -> Result<(), String> {
    let config = load_config(&input)?;
    let (json, report) = driver_for(config, input.jobs)?.dump().map_err(|e| e.to_string())?;
    print_diagnostics(&report);

    match json {
        Some(json) => println!("{}", json),
        None => return Err("model could not be resolved".to_string()),
    }
    if !report.is_success() {
        return Err(format!("{} error(s) reported", report.errors.len()));
    }
    Ok(())
}
