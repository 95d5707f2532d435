mod backend;
mod cli;
mod commands;
mod config;
mod facts;
mod progress;
mod runner;
mod signal;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use config::EngineConfig;
use std::io;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config: EngineConfig,
}

/// An error raised before convergence started, so nothing on the host was
/// changed. Exits with status 2.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct FatalError(#[from] anyhow::Error);

/// Mark an error as [`FatalError`]
pub trait Fatal<T> {
    fn fatal(self) -> Result<T>;
}

impl<T, E> Fatal<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn fatal(self) -> Result<T> {
        self.map_err(|e| FatalError(e.into()).into())
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            ui::error(&format!("{err:#}"));
            if err.downcast_ref::<FatalError>().is_some() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

/// Dispatch a command; the returned value is the process exit status
fn run(cli: Cli) -> Result<u8> {
    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "converge", &mut io::stdout());
        return Ok(0);
    }

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: EngineConfig::load(cli.config.as_deref()).fatal()?,
    };

    match cli.command {
        Command::Apply(args) => commands::apply::run(&ctx, &args),
        Command::Compile(args) => commands::compile::run(&ctx, &args).fatal(),
        Command::Graph(args) => commands::graph::run(&ctx, &args).fatal(),
        Command::Facts(args) => commands::facts::run(&ctx, &args).fatal(),
        Command::History { limit } => commands::history::run(&ctx, limit),
        Command::Completions { .. } => Ok(0),
    }
}
