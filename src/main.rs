mod blueprint;
mod cli;
mod commands;
mod config;
mod engine;
mod exports;
mod paths;
mod progress;
mod provider;
mod resolvers;
mod schema;
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
    /// Explicit config file from `--config`
    pub config: Option<PathBuf>,
    /// Stack selected with `--stack`
    pub stack: Option<String>,
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
        stack: cli.stack,
    };

    match cli.command {
        Command::Preview(args) => commands::preview::run(&ctx, &args.target),
        Command::Up(args) => commands::up::run(&ctx, args),
        Command::Destroy { yes } => commands::destroy::run(&ctx, yes),
        Command::State(cmd) => commands::state::run(&ctx, cmd),
        Command::Outputs { json } => commands::outputs::run(&ctx, json),
        Command::Resolvers { type_name } => commands::resolvers::run(&ctx, &type_name),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "nuage", &mut io::stdout());
            Ok(())
        }
    }
}
