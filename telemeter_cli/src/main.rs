mod commands;
mod ui;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

use commands::{EmitArgs, MeasurementArgs};

#[derive(Parser)]
#[command(name = "telemeter")]
#[command(about = "Send and inspect InfluxDB line-protocol measurements", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one measurement to a Telegraf socket listener
    Emit {
        #[command(flatten)]
        sink: EmitArgs,

        #[command(flatten)]
        measurement: MeasurementArgs,
    },

    /// Print the line a measurement serializes to, without sending it
    Line {
        #[command(flatten)]
        measurement: MeasurementArgs,
    },

    /// Validate a sink configuration file
    Validate {
        /// Path to config file (YAML, TOML, or JSON)
        config_file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Emit { sink, measurement } => {
            commands::emit::execute(sink, measurement).await?;
        }

        Commands::Line { measurement } => {
            commands::line::execute(measurement)?;
        }

        Commands::Validate { config_file } => {
            commands::validate::execute(config_file).await?;
        }
    }

    Ok(())
}
