use clap::{Parser, Subcommand};
use harness::prelude::*;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use toolchain::CommandToolchain;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "tbrun")]
#[command(about = "Compile and simulate HDL testbenches, then report pass/fail")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run testbenches and print a summary
    Run {
        /// Run only this testbench (file stem, e.g. adder_tb)
        #[arg(short, long)]
        test: Option<String>,
        /// Number of testbenches to run at once
        #[arg(short = 'j', long)]
        parallel: Option<usize>,
        /// Print each testbench's simulator output
        #[arg(short, long)]
        verbose: bool,
        /// Directory containing testbenches
        #[arg(long)]
        tb_dir: Option<PathBuf>,
        /// Directory for compiled artifacts
        #[arg(long)]
        build_dir: Option<PathBuf>,
        /// Directory of design sources compiled with every testbench
        #[arg(long)]
        src_dir: Option<PathBuf>,
        /// Compile timeout in seconds
        #[arg(long, value_name = "SECS")]
        compile_timeout: Option<u64>,
        /// Simulation timeout in seconds
        #[arg(long, value_name = "SECS")]
        sim_timeout: Option<u64>,
        /// Config file (defaults to ./tbrun.toml when present)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Also write a JSON report to this path
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
        /// Disable colored PASS/FAIL labels
        #[arg(long)]
        no_color: bool,
    },
    /// List discovered testbenches
    List {
        /// Directory containing testbenches
        #[arg(long)]
        tb_dir: Option<PathBuf>,
        /// Config file (defaults to ./tbrun.toml when present)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            test,
            parallel,
            verbose,
            tb_dir,
            build_dir,
            src_dir,
            compile_timeout,
            sim_timeout,
            config,
            report,
            no_color,
        } => {
            let mut settings = HarnessConfig::load(config.as_deref())?;
            if let Some(dir) = tb_dir {
                settings.tb_dir = dir;
            }
            if let Some(dir) = build_dir {
                settings.build_dir = dir;
            }
            if let Some(dir) = src_dir {
                settings.src_dir = dir;
            }
            if let Some(jobs) = parallel {
                settings.parallel = jobs;
            }
            if let Some(secs) = compile_timeout {
                settings.compile_timeout_secs = secs;
            }
            if let Some(secs) = sim_timeout {
                settings.simulate_timeout_secs = secs;
            }
            settings.validate().map_err(SettingsError::Invalid)?;

            let color = !no_color && std::io::stdout().is_terminal();
            let options = RunOptions {
                test,
                verbose,
                color,
                report,
            };
            run_tests(settings, options).await
        }
        Commands::List { tb_dir, config } => {
            let mut settings = HarnessConfig::load(config.as_deref())?;
            if let Some(dir) = tb_dir {
                settings.tb_dir = dir;
            }
            list_tests(&settings.tb_dir)
        }
    }
}

struct RunOptions {
    test: Option<String>,
    verbose: bool,
    color: bool,
    report: Option<PathBuf>,
}

async fn run_tests(
    settings: HarnessConfig,
    options: RunOptions,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let units = match &options.test {
        Some(name) => select(name, &settings.tb_dir),
        None => {
            let discovery = discover(&settings.tb_dir)?;
            print_warnings(&discovery.warnings);
            discovery.units
        }
    };

    if units.is_empty() {
        println!("No tests found!");
        return Ok(ExitCode::FAILURE);
    }

    println!("Found {} test(s) to run", units.len());
    println!("{}", "-".repeat(40));

    let toolchain = Arc::new(CommandToolchain::new(settings.toolchain.clone())?);
    let runner = UnitRunner::new(toolchain, settings.runner_settings());
    let scheduler = Scheduler::new(runner, settings.parallel).with_progress(Arc::new(
        ConsoleProgress::new(options.verbose, options.color),
    ));

    debug!(
        tb_dir = %settings.tb_dir.display(),
        build_dir = %settings.build_dir.display(),
        parallel = settings.parallel,
        "Run configuration"
    );

    let outcome = scheduler.run_all(&units, interrupted()).await;

    let (text, code) = summarize(&outcome.results, options.color);
    print!("{}", text);

    if outcome.cancelled {
        println!(
            "Run cancelled: {} unit(s) not started",
            outcome.not_started
        );
    }

    if let Some(path) = &options.report {
        write_json_report(path, &outcome.results, outcome.cancelled)?;
        info!(path = %path.display(), "Wrote JSON report");
    }

    Ok(ExitCode::from(code as u8))
}

fn list_tests(tb_dir: &Path) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let discovery = discover(tb_dir)?;
    print_warnings(&discovery.warnings);

    if discovery.is_empty() {
        println!("No tests found!");
        return Ok(ExitCode::FAILURE);
    }

    for name in discovery.names() {
        println!("{}", name);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_warnings(warnings: &[CatalogWarning]) {
    for warning in warnings {
        println!("Warning: {}", warning);
    }
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
