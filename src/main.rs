use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use validate_bcf::cli::{CheckArgs, Cli, Command, ErrorCodeArgs};
use validate_bcf::config::ConfigManager;
use validate_bcf::output::Reporter;
use validate_bcf::status::Status;
use validate_bcf::validator::CheckRunner;

fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_check(args: CheckArgs) -> anyhow::Result<Status> {
    let config = match ConfigManager::load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(Status::COMMAND_LINE_ERROR);
        }
    };
    init_logging(config.output.verbosity(args.verbosity()).filter());
    tracing::debug!(?config, "configuration loaded");

    let mut reporter = Reporter::stdout(config.output.format, config.output.verbose);
    let mut runner = CheckRunner::new(config, args.check_options(), args.schemas.clone());

    let status = runner
        .run(&args.source, &mut reporter)
        .with_context(|| format!("checking {}", args.source.display()))?;
    Ok(status)
}

fn run_error_code(args: ErrorCodeArgs) -> Status {
    println!("{}", Status::describe(args.code));
    Status::OK
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(Status::COMMAND_LINE_ERROR.bits())
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let status = match cli.command {
        Command::Check(args) => match run_check(args) {
            Ok(status) => status,
            // diagnostics could not be written
            Err(e) => {
                eprintln!("Error: {:#}", e);
                Status::NOT_FOUND_ERROR
            }
        },
        Command::ErrorCode(args) => run_error_code(args),
    };

    ExitCode::from(status.bits())
}
