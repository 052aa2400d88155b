mod cli;
mod commands;
mod config;
mod engine;
mod manifest;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// Explicit settings file from `--config`
    pub config: Option<PathBuf>,
}

impl Context {
    /// Load settings from `--config` or the default location
    pub fn settings(&self) -> Result<config::Settings> {
        config::Settings::load(self.config.as_deref())
    }
}

fn main() -> Result<()> {
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

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
    };

    match cli.command {
        Command::Validate { manifest } => commands::validate::run(&ctx, &manifest),
        Command::Plan(args) => commands::plan::run(&ctx, &args),
        Command::Kinds { kind } => commands::kinds::run(&ctx, kind.as_deref()),
        Command::Resolve { kind, token } => commands::resolve::run(&ctx, &kind, &token),
        Command::State(cmd) => commands::state::run(&ctx, cmd),
        Command::Config => commands::config::run(&ctx),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "gatecfg", &mut io::stdout());
            Ok(())
        }
    }
}
