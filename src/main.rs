//! cbuild - incremental build orchestrator for small C projects.
//!
//! Compiles every changed `src/*.c` into `obj/`, links `bin/<target>`, copies
//! runtime libraries beside it, and optionally runs it. Rebuilds itself first
//! when its own source changed.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cbuild::bootstrap::{self, Bootstrap, ProcessRelauncher};
use cbuild::cli::{self, Cli, Request};
use cbuild::process::SystemToolchain;
use cbuild::{BuildConfig, BuildError, BuildOutcome, Orchestrator};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    match run() {
        Ok(code) => exit_code(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<i32> {
    let args: Vec<OsString> = std::env::args_os().collect();
    let generation = bootstrap::take_generation();
    let root = std::env::current_dir().context("cannot determine working directory")?;

    let config = match BuildConfig::load(&root) {
        Ok(config) => config,
        Err(e) => return Ok(fail(&e)),
    };

    let exe = std::env::current_exe()
        .map(|p| p.canonicalize().unwrap_or(p))
        .unwrap_or_else(|_| PathBuf::from(args.first().cloned().unwrap_or_default()));
    match bootstrap::ensure_fresh(
        &config,
        &exe,
        &args,
        generation,
        &mut SystemToolchain,
        &mut ProcessRelauncher,
    ) {
        Ok(Bootstrap::Relaunched(code)) => return Ok(code),
        Ok(Bootstrap::Fresh | Bootstrap::Disabled) => {}
        Err(e) => return Ok(fail(&e)),
    }

    let exec_name = args
        .first()
        .map(|a| a.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cbuild".to_string());

    let cli = match Cli::try_parse_from(&args) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            eprint!("{}", cli::usage(&exec_name));
            return Ok(1);
        }
    };

    let actions = match cli::parse_flags(&cli.flags) {
        Ok(Request::Usage) => {
            print!("{}", cli::usage(&exec_name));
            return Ok(0);
        }
        Ok(Request::ShowConfig) => {
            config.print();
            return Ok(0);
        }
        Ok(Request::Phases(actions)) => actions,
        Err(flag) => {
            eprintln!("Unknown flag: {flag}");
            eprint!("{}", cli::usage(&exec_name));
            return Ok(1);
        }
    };

    let mut orchestrator = Orchestrator::new(&config, SystemToolchain);
    let result = orchestrator.run(actions);
    let outcome = BuildOutcome::from_result(&result);
    if let Err(e) = &result {
        eprintln!("Error: {e}");
    }
    tracing::debug!(?outcome, "run finished");
    Ok(outcome.exit_code())
}

fn fail(err: &BuildError) -> i32 {
    eprintln!("Error: {err}");
    let outcome = BuildOutcome::from_error(err);
    tracing::debug!(?outcome, "run aborted");
    outcome.exit_code()
}

fn exit_code(code: i32) -> ExitCode {
    u8::try_from(code).map(ExitCode::from).unwrap_or(ExitCode::FAILURE)
}
