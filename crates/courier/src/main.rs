// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Courier - a WhatsApp assistant message pipeline.
//!
//! This is the binary entry point: it receives webhook events from a
//! transport gateway, deduplicates and queues them, asks an external
//! decision process what to do, and delivers replies back through the
//! gateway.

use clap::{Parser, Subcommand};

mod serve;
mod shutdown;

/// Courier - a WhatsApp assistant message pipeline.
#[derive(Parser, Debug)]
#[command(name = "courier", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Courier pipeline server.
    Serve,
    /// Print the resolved configuration and exit.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match courier_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            courier_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(err) = serve::run_serve(config).await {
                eprintln!("error: {err}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => match toml::to_string_pretty(&config) {
            Ok(rendered) => print!("{rendered}"),
            Err(err) => {
                eprintln!("error: failed to render config: {err}");
                std::process::exit(1);
            }
        },
        None => {
            println!("courier: use --help for available commands");
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn binary_loads_config_defaults() {
        // No config file needed; every section has defaults.
        let config = courier_config::load_and_validate_str("")
            .expect("default config should be valid");
        assert_eq!(config.agent.name, "courier");
        assert_eq!(config.gateway.port, 5000);
    }
}
