//! kiln - build, install and smoke-test the Wyn toolchain

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use kiln_cli::cmd;
use kiln_cli::ui::Output;
use kiln_cli::{Cli, Commands};
use kiln_core::InstallError;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins; --verbose only changes the fallback.
    let fallback = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Install {
            source,
            prefix,
            recipe,
            skip_test,
            timeout,
        } => cmd::install::install(&source, prefix, recipe.as_deref(), skip_test, timeout),
        Commands::Test {
            prefix,
            recipe,
            timeout,
        } => cmd::smoke::smoke(prefix, recipe.as_deref(), timeout),
        Commands::Plan { source, recipe } => cmd::plan::plan(&source, recipe.as_deref()),
        Commands::Check { recipe } => cmd::check::check(recipe.as_deref()),
        Commands::Recipe => {
            cmd::recipe::recipe();
            Ok(())
        }
    }
}

/// Print the error chain, and for install failures the phase reached and
/// whatever output the failing process left behind.
fn report(err: &anyhow::Error) {
    let output = Output::new();
    output.error(&format!("{err:#}"));

    let Some(install) = err.downcast_ref::<InstallError>() else {
        return;
    };
    output.error_detail("phase", &install.phase().to_string());
    if let InstallError::Build(failure) = install {
        if let Some(code) = failure.exit_code {
            output.error_detail("exit code", &code.to_string());
        }
        if let Some(log) = &failure.log {
            output.error_detail("log", &log.display().to_string());
        }
    }
    if let Some(diagnostic) = install.diagnostic() {
        eprintln!();
        output.block(diagnostic.trim_end());
    }
}
