//! CLI entry point for the retro80 system runner.
//!
//! Exit codes: 0 success, 1 configuration error, 2 runtime fault.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use retro80_sys::{Registry, System};

const HELP_TEXT: &str = "\
Usage: retro80 -f <config> [--] [args...]

  -h, --help           print this help and exit
  -f, --config <path>  system configuration file
  --                   remaining tokens become system arguments";

#[derive(Debug, PartialEq, Eq)]
struct CliArgs {
    config: PathBuf,
    extra: Vec<OsString>,
}

#[derive(Debug)]
enum ParseResult {
    Args(CliArgs),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let mut config: Option<PathBuf> = None;
    let mut extra = Vec::new();

    while let Some(arg) = args.next() {
        if arg == "-h" || arg == "--help" {
            return Ok(ParseResult::Help);
        }
        if arg == "-f" || arg == "--config" {
            let value = args
                .next()
                .ok_or_else(|| String::from("missing value for --config"))?;
            config = Some(PathBuf::from(value));
            continue;
        }
        if arg == "--" {
            extra.extend(args);
            break;
        }
        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }
        return Err(format!("unexpected argument: {}", arg.to_string_lossy()));
    }

    let config = config.ok_or_else(|| String::from("missing --config <path>"))?;
    Ok(ParseResult::Args(CliArgs { config, extra }))
}

fn main() -> ExitCode {
    let args = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{HELP_TEXT}");
            return ExitCode::SUCCESS;
        }
        Ok(ParseResult::Args(args)) => args,
        Err(message) => {
            eprintln!("Error: {message}");
            eprintln!("{HELP_TEXT}");
            return ExitCode::from(1);
        }
    };

    let text = match std::fs::read_to_string(&args.config) {
        Ok(text) => text,
        Err(fault) => {
            eprintln!("Error: cannot read {}: {fault}", args.config.display());
            return ExitCode::from(1);
        }
    };

    let registry = Registry::with_defaults();
    let mut system = match System::load_config(&registry, &text) {
        Ok(system) => system,
        Err(fault) => {
            eprintln!("Error: {fault}");
            return ExitCode::from(1);
        }
    };
    // Reserved for system-specific use.
    let _ = args.extra;

    system.start();
    let tstates = system.run();
    system.stop();
    system.shutdown();

    // A system that never made progress indicates a runtime fault
    // (typically nothing executable at the reset vector).
    if tstates == 0 {
        eprintln!("Error: system made no progress");
        return ExitCode::from(2);
    }
    ExitCode::SUCCESS
}
