pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use slotwise_core::config::{AppConfig, LoadOptions, LogFormat, LoggingConfig};

#[derive(Debug, Parser)]
#[command(
    name = "slotwise",
    about = "Slotwise operator CLI",
    long_about = "Run one-shot booking-assistant turns against a fixture calendar, inspect the effective configuration, and check runtime readiness.",
    after_help = "Examples:\n  slotwise chat \"book an appointment tomorrow at 2 PM\"\n  slotwise chat --json --now 2025-03-04T09:00:00Z \"what's free next monday?\"\n  slotwise doctor --json\n  slotwise config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run one chat turn against the configured fixture calendar")]
    Chat {
        #[arg(help = "The user message, e.g. \"book an appointment tomorrow at 2 PM\"")]
        message: String,
        #[arg(long, help = "Pin the reference instant (RFC 3339) instead of using the wall clock")]
        now: Option<String>,
        #[arg(long, help = "Emit the reply as machine-readable JSON")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, calendar fixture, and LLM readiness checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Chat { message, now, json } => {
            init_logging();
            commands::chat::run(&message, now.as_deref(), json)
        }
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

/// Level and format come from the same sources the chat turn will read;
/// a config that fails to load still gets default logging so the failure
/// itself is visible. Logs go to stderr so `--json` stdout stays clean.
fn init_logging() {
    use tracing::Level;

    let logging = AppConfig::load(LoadOptions::default())
        .map(|config| config.logging)
        .unwrap_or_else(|_| LoggingConfig { level: "info".to_string(), format: LogFormat::Compact });

    let log_level = logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    // try_init: tests drive commands in-process and may race a second init.
    let _ = match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
