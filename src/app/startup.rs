//! Application startup
//!
//! Parse arguments, merge the configuration file, initialise logging, bring
//! the plugins up, run one command and tear everything down again.

use crate::app::cli::args::{Args, OutputFormat};
use crate::app::cli::config::{load_config_file, HostConfig};
use crate::app::cli::display;
use crate::app::host::Host;
use crate::command::api::CommandResult;
use crate::core::error_handling::{log_error_with_context, ErrorKind};
use crate::core::logging::init_logging;
use crate::core::shutdown::ShutdownCoordinator;
use crate::core::styles::{palette_to_clap, StyleRole};
use clap::{CommandFactory, FromArgMatches};
use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;

/// Exit status for usage errors (unknown command, bad arguments, bad config)
const EXIT_USAGE: u8 = 2;
const EXIT_TIMEOUT: u8 = 124;
const EXIT_CANCELLED: u8 = 130;

/// Initialize application startup
pub fn startup() -> ExitCode {
    let matches = Args::command()
        .styles(palette_to_clap(std::io::stderr().is_terminal()))
        .get_matches();
    let args = match Args::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(e) => e.exit(),
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: could not start the async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    runtime.block_on(run(args))
}

pub async fn run(args: Args) -> ExitCode {
    let file = match load_config_file(args.config_file.as_deref()) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(EXIT_USAGE);
        }
    };
    let config = HostConfig::resolve(&args, file);
    let color = config
        .color
        .unwrap_or_else(|| std::io::stdout().is_terminal());
    colored::control::set_override(color);

    let log_file = config.log_file.as_ref().map(|p| p.to_string_lossy().to_string());
    if let Err(e) = init_logging(
        Some(config.log_level.as_deref().unwrap_or("warn")),
        config.log_format.as_deref(),
        log_file.as_deref(),
        color,
    ) {
        eprintln!("Warning: could not initialise logging: {e}");
    }
    log::debug!("plughost {}", crate::core::version::version_banner());

    let host = Arc::new(Host::new(&config));
    let report = match host.start().await {
        Ok(report) => report,
        Err(e) => {
            log_error_with_context(&e, "Plugin loading");
            eprintln!("{} {}", StyleRole::Failure.paint("error:", color), e);
            return ExitCode::FAILURE;
        }
    };
    for warning in display::load_report_warnings(&report) {
        eprintln!("{} {}", StyleRole::Warning.paint("warning:", color), warning);
    }

    let code = dispatch(&host, &args, &config, color).await;

    host.shutdown().await;
    code
}

async fn dispatch(host: &Arc<Host>, args: &Args, config: &HostConfig, color: bool) -> ExitCode {
    if args.plugins {
        let statuses = host.manager().statuses().await;
        return match display::print_plugins(&statuses, config.output, color) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        };
    }

    if args.command.is_empty() {
        return match host.manager().get_commands().await {
            Ok(commands) => {
                println!("Usage: plughost [OPTIONS] COMMAND [ARGS]...\n");
                print!("{}", display::command_listing(&commands, color));
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{} {}", StyleRole::Failure.paint("error:", color), e);
                ExitCode::FAILURE
            }
        };
    }

    let coordinator = ShutdownCoordinator::new();
    coordinator.install_signal_handlers();
    let watcher = {
        let host = Arc::clone(host);
        let signal = coordinator.signal();
        tokio::spawn(async move {
            signal.cancelled().await;
            host.pipeline().cancel_all();
        })
    };

    let outcome = host.run(&args.command).await;
    watcher.abort();

    match outcome {
        Ok(result) => report(&result, config.output, color),
        Err(e) => {
            eprintln!("{} {}", StyleRole::Failure.paint("error:", color), e);
            ExitCode::from(EXIT_USAGE)
        }
    }
}

fn report(result: &CommandResult, output: OutputFormat, color: bool) -> ExitCode {
    let mut out = std::io::stdout().lock();
    let mut err = std::io::stderr().lock();
    if let Err(e) = display::write_result(result, output, color, &mut out, &mut err) {
        log::warn!("plughost: could not write result: {}", e);
    }
    ExitCode::from(exit_code(result))
}

pub fn exit_code(result: &CommandResult) -> u8 {
    match result.error_kind() {
        None => 0,
        Some(ErrorKind::UnknownCommand | ErrorKind::AmbiguousCommand | ErrorKind::InvalidArguments) => {
            EXIT_USAGE
        }
        Some(ErrorKind::Timeout) => EXIT_TIMEOUT,
        Some(ErrorKind::Cancelled) => EXIT_CANCELLED,
        Some(_) => 1,
    }
}
