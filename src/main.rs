#![deny(missing_docs)]

//! Entry point for the ResSys terminal front-end.
use std::path::PathBuf;
use std::process::ExitCode;

use ressys::{app_dirs, bootstrap::BootstrapConfig, cli::Menu, logging, session::Session};

fn main() -> ExitCode {
    let mut config_path = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                if let Some(value) = args.next() {
                    config_path = Some(PathBuf::from(value));
                }
            }
            "--data-home" => {
                if let Some(value) = args.next() {
                    app_dirs::set_data_base_override(&PathBuf::from(value));
                }
            }
            "--help" | "-h" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            other => eprintln!("Ignoring unknown argument '{other}'"),
        }
    }

    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }

    let config_path = config_path.unwrap_or_else(BootstrapConfig::default_path);
    let settings = match BootstrapConfig::load(&config_path).and_then(|config| config.resolve()) {
        Ok(settings) => settings,
        Err(err) => {
            tracing::error!("Bootstrap config unusable: {err}");
            eprintln!("Failed to load config from {}: {err}", config_path.display());
            return ExitCode::FAILURE;
        }
    };
    println!("Python path: {}", settings.interpreter.display());
    println!("Server script: {}", settings.entry_point.display());

    let service_log = app_dirs::logs_dir()
        .map(|dir| dir.join("service.log"))
        .map_err(|err| tracing::warn!("Service output will be discarded: {err}"))
        .ok();
    let mut session = match Session::new(settings, service_log) {
        Ok(session) => session,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let result = Menu::new(&mut session, stdin.lock(), stdout.lock()).run();
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("Terminal I/O failed: {err}");
            session.supervisor_mut().stop_hard();
            ExitCode::FAILURE
        }
    }
}

fn print_help() {
    println!("Usage: ressys [--config <app_config.toml>] [--data-home <dir>]");
}
