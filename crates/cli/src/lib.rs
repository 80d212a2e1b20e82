pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use cloudscope_core::config::LoadOptions;

#[derive(Debug, Parser)]
#[command(
    name = "cloudscope",
    about = "Cloudscope operator CLI",
    long_about = "Ask questions about a cloud account, scan its inventory, inspect costs, and operate the query audit trail.",
    after_help = "Examples:\n  cloudscope ask \"how many ec2 instances are running?\"\n  cloudscope costs --service compute\n  cloudscope doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, value_name = "PATH", help = "Read configuration from this TOML file")]
    config_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Answer a free-text question about the account")]
    Ask {
        query: String,
        #[arg(long, help = "Emit the answer and structured inventory as JSON")]
        json: bool,
    },
    #[command(about = "Scan compute, storage, database and load balancer inventory")]
    Scan {
        #[arg(long, help = "Emit the full snapshot as JSON")]
        json: bool,
    },
    #[command(about = "Fetch monthly cost periods, optionally for one service and range")]
    Costs {
        #[arg(long, help = "compute | storage | database")]
        service: Option<String>,
        #[arg(long, value_name = "YYYY-MM-01", requires = "end", help = "first month, inclusive")]
        start: Option<NaiveDate>,
        #[arg(long, value_name = "YYYY-MM-01", requires = "start", help = "month after the last")]
        end: Option<NaiveDate>,
    },
    #[command(about = "List the most recent audited queries for a client")]
    History {
        #[arg(long, help = "Client id (defaults to audit.client_id)")]
        client: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, database connectivity and backend credentials")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions {
        require_file: cli.config_file.is_some(),
        config_path: cli.config_file,
        ..LoadOptions::default()
    };

    let result = match cli.command {
        Command::Ask { query, json } => commands::ask::run(&options, &query, json),
        Command::Scan { json } => commands::scan::run(&options, json),
        Command::Costs { service, start, end } => {
            commands::costs::run(&options, service.as_deref(), start.zip(end))
        }
        Command::History { client, limit } => {
            commands::history::run(&options, client.as_deref(), limit)
        }
        Command::Migrate => commands::migrate::run(&options),
        Command::Config => commands::config::run(&options),
        Command::Doctor { json } => commands::doctor::run(&options, json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
