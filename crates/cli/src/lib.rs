pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "ebert",
    about = "Ebert maintenance CLI",
    long_about = "Prepare the movie night database and inspect the effective configuration.",
    after_help = "Examples:\n  ebert init\n  ebert init --config config/ebert.toml\n  ebert config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Create the sqlite database if needed and apply pending migrations")]
    Init {
        #[arg(long, help = "Path to an ebert.toml file")]
        config: Option<PathBuf>,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config {
        #[arg(long, help = "Path to an ebert.toml file")]
        config: Option<PathBuf>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Init { config } => commands::init::run(config.as_deref()),
        Command::Config { config } => commands::config::run(config.as_deref()),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
