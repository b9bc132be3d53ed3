use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use telemeter_sink::load_sink_config;

use crate::ui;

pub async fn execute(config_file: PathBuf) -> Result<()> {
    println!("{}", "=== Validating Sink Config ===".bold().cyan());
    println!("File: {}", config_file.display());

    match load_sink_config(&config_file).await {
        Ok(config) => {
            println!("\n{}", "✓ Config is valid!".green().bold());
            println!("\nResolved Settings:");
            ui::print_field("Destination", config.destination());
            ui::print_field("Buffer size", config.effective_buffer_size());
            ui::print_field(
                "Flush interval",
                if config.flush_enabled() {
                    format!("{:?}", config.flush_interval)
                } else {
                    "disabled".to_string()
                },
            );
            ui::print_field("Prefix", config.prefix.as_deref().unwrap_or("-"));

            if config.buffer_size == 0 {
                println!();
                ui::print_warning("buffer_size 0 behaves like 1");
            }
            if config.effective_buffer_size() > 1 && !config.flush_enabled() {
                println!();
                ui::print_warning(
                    "Partial buffers are only sent once full; consider a flush_interval",
                );
            }

            Ok(())
        }
        Err(e) => {
            println!();
            ui::print_error("Config is invalid!");
            println!("\nError: {}", e);
            Err(e.into())
        }
    }
}
