//! obuild: Make-style builds scripted in Lua.
//!
//! Evaluates a definition file (default `obuild.cfg`), then drives the
//! requested action (default `"default"`) through the rule engine.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use console::style;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use obuild_lib::{Engine, EngineOptions};
use obuild_lib::pool;

#[derive(Parser)]
#[command(name = "obuild", version, about = "Make-style builds scripted in Lua")]
struct Cli {
    /// Action to run
    #[arg(default_value = "default")]
    action: String,

    /// Change to DIR before evaluating the definition file
    #[arg(short = 'C', long = "change-directory", value_name = "DIR")]
    directory: Option<PathBuf>,

    /// Definition file to evaluate
    #[arg(short, long, value_name = "FILE", default_value = "obuild.cfg")]
    file: PathBuf,

    /// Evaluate STR before the definition file
    #[arg(short, long, value_name = "STR")]
    execute: Option<String>,

    /// Worker threads in addition to the evaluator (0 = all cpus)
    #[arg(short, long, value_name = "N", default_value_t = 1)]
    jobs: usize,

    /// Make getenv always return its default
    #[arg(short = 'E', long = "ignore-env")]
    ignore_env: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{}: {err:#}", style(progname()).red().bold());
            ExitCode::FAILURE
        }
    }
}

/// The reported program name, from argv[0] where possible.
fn progname() -> String {
    std::env::args()
        .next()
        .as_deref()
        .map(std::path::Path::new)
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("obuild")
        .to_string()
}

fn run(cli: &Cli) -> Result<i32> {
    if let Some(dir) = &cli.directory {
        std::env::set_current_dir(dir)
            .map_err(|_| anyhow!("failed changing directory: {}", dir.display()))?;
    }

    // jobs are in addition to the evaluator thread; 0 means one per cpu
    let jobs = match cli.jobs {
        0 => pool::num_cpus(),
        n => n,
    }
    .max(1);

    let engine = Engine::new(EngineOptions {
        jobs,
        ignore_env: cli.ignore_env,
    })?;

    if let Some(source) = &cli.execute {
        engine
            .eval_str(source)
            .context("failed creating rules")?;
    }
    engine
        .eval_file(&cli.file)
        .context("failed creating rules")?;

    if !engine.has_rules() {
        return Err(anyhow!("no targets"));
    }

    let code = engine.exec_main(&cli.action)?;
    if code == 0 {
        engine.shutdown();
    }
    Ok(code)
}
