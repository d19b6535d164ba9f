pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "stayledger",
    about = "Stayledger operator CLI",
    long_about = "Operate the pricing and settlement core: migrations, demo fixtures, config inspection, and readiness checks.",
    after_help = "Examples:\n  stayledger doctor --json\n  stayledger migrate\n  stayledger seed"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo fixtures (tenant, pricing rules, fx catalog)")]
    Seed,
    #[command(about = "Inspect effective configuration values as structured output")]
    Config,
    #[command(about = "Validate configuration and database connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
