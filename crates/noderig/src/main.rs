mod app;
mod cli;
mod error;
mod logging;
mod run_lock;
mod settings;

use std::process::ExitCode;

use clap::Parser;
use log::{error, info, warn};
use serde::Serialize;

use noderig_platform::AppPaths;

use crate::app::{Noderig, check_catalog, describe_drift};
use crate::cli::{CatalogCommand, Cli, Command, RuntimeCommand};
use crate::error::AppError;
use crate::run_lock::RunLock;
use crate::settings::Settings;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let paths = AppPaths::new();
    let dirs = paths.as_ref().ok().map(AppPaths::ensure_dirs);
    let mut settings = paths.as_ref().map(Settings::load).unwrap_or_default();
    let log_file = paths.as_ref().ok().map(AppPaths::log_file);
    logging::init_logging(
        log_file.as_deref(),
        cli.verbose || settings.debug_logging,
        settings.max_log_size_bytes,
    );

    if let Ok(paths) = &paths
        && report_dirs(dirs)
    {
        write_default_settings(&settings, paths);
    }

    if let Some(install_root) = cli.install_root.clone() {
        settings.install_root = install_root;
    }
    if cli.no_verify {
        settings.verify_checksums = false;
    }

    let result = match paths {
        Ok(paths) => run(cli.command, settings, &paths).await,
        Err(err) => Err(err.into()),
    };
    result.unwrap_or_else(|err| {
        error!("{err}");
        ExitCode::FAILURE
    })
}

async fn run(command: Command, settings: Settings, paths: &AppPaths) -> Result<ExitCode, AppError> {
    if let Command::Catalog(CatalogCommand::Check { index_url }) = &command {
        let drift = check_catalog(&settings, index_url).await?;
        println!("{}", describe_drift(&drift));
        return Ok(if drift.is_current() {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(2)
        });
    }

    let _lock = RunLock::acquire(&paths.lock_file())?;
    let noderig = Noderig::new(settings, paths).await?;

    match command {
        Command::Runtime(RuntimeCommand::Install(args)) => {
            print_json(&noderig.install_runtime(&args).await?)?;
        }
        Command::Runtime(RuntimeCommand::Uninstall(args)) => {
            noderig.uninstall_runtime(&args).await?;
        }
        Command::Runtime(RuntimeCommand::Which(args)) => {
            print_json(&noderig.describe_runtime(&args).await?)?;
        }
        Command::Package(args) => {
            let reconciliation = noderig.reconcile_packages(args).await?;
            if !reconciliation.updated() {
                info!("Packages already in the requested state");
            }
            print_json(&reconciliation)?;
        }
        Command::NpmInstall(args) => {
            let updated = noderig.install_project(args).await?;
            print_json(&serde_json::json!({ "updated": updated }))?;
        }
        Command::Exec(args) => {
            let status = noderig.execute(args).await?;
            return Ok(status
                .and_then(|code| u8::try_from(code).ok())
                .map_or(ExitCode::FAILURE, ExitCode::from));
        }
        Command::Catalog(_) => {}
    }
    Ok(ExitCode::SUCCESS)
}

/// Log a failed [`AppPaths::ensure_dirs`] once logging is up. Returns whether
/// the directories are usable.
fn report_dirs(result: Option<std::io::Result<()>>) -> bool {
    match result {
        Some(Err(err)) => {
            warn!("Could not create application directories: {err}");
            false
        }
        Some(Ok(())) => true,
        None => false,
    }
}

/// Leave an editable settings file behind on the first run.
fn write_default_settings(settings: &Settings, paths: &AppPaths) {
    let path = paths.settings_file();
    if path.exists() {
        return;
    }
    match settings.save_to(&path) {
        Ok(()) => info!("Wrote default settings to {}", path.display()),
        Err(err) => warn!("Could not write {}: {err}", path.display()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use noderig_platform::AppPaths;

    use super::report_dirs;

    #[test]
    fn unwritable_root_is_reported_not_ignored() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let root = temp.path().join("occupied");
        std::fs::write(&root, b"not a directory").expect("blocking file should be written");

        let result = AppPaths::rooted_at(&root).ensure_dirs();

        assert!(result.is_err());
        assert!(!report_dirs(Some(result)));
    }

    #[test]
    fn created_dirs_are_reported_usable() {
        let temp = tempfile::tempdir().expect("tempdir should be created");

        assert!(report_dirs(Some(AppPaths::rooted_at(temp.path()).ensure_dirs())));
        assert!(!report_dirs(None));
    }
}
