// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Switchboard - multi-channel customer support reply engine.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod enqueue;
mod serve;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use switchboard_config::SwitchboardConfig;
use switchboard_core::ChannelType;

/// Switchboard - multi-channel customer support reply engine.
#[derive(Parser, Debug)]
#[command(name = "switchboard", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the job processor and gateway until interrupted.
    Serve,
    /// Store a customer message and queue a reply job for it.
    Enqueue {
        /// Conversation the message belongs to.
        #[arg(long)]
        conversation: String,
        /// Channel the message arrived on (whatsapp, email, sms, widget, ...).
        #[arg(long, default_value = "widget")]
        channel: ChannelType,
        /// Higher priority jobs are claimed first.
        #[arg(long, default_value_t = 0)]
        priority: i32,
        /// Language tag for the reply.
        #[arg(long)]
        language: Option<String>,
        /// The customer's message.
        text: String,
    },
    /// Show whether a local engine is running.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            switchboard_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Enqueue {
            conversation,
            channel,
            priority,
            language,
            text,
        }) => {
            let request = enqueue::EnqueueRequest {
                conversation_id: conversation,
                channel,
                priority,
                language,
                text,
            };
            enqueue::run_enqueue(&config, request).await.map(|job_id| {
                println!("{job_id}");
            })
        }
        Some(Commands::Status { json }) => status::run_status(&config, json).await,
        Some(Commands::Config) => match config.to_toml_string() {
            Ok(rendered) => {
                print!("{rendered}");
                Ok(())
            }
            Err(e) => Err(switchboard_core::SwitchboardError::Config(format!(
                "failed to render configuration: {e}"
            ))),
        },
        None => {
            println!("switchboard: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn load_config(
    path: Option<&std::path::Path>,
) -> Result<SwitchboardConfig, Vec<switchboard_config::ConfigError>> {
    match path {
        Some(path) => switchboard_config::load_and_validate_path(path),
        None => switchboard_config::load_and_validate(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn enqueue_parses_channel_and_priority() {
        let cli = Cli::try_parse_from([
            "switchboard",
            "enqueue",
            "--conversation",
            "c-42",
            "--channel",
            "whatsapp",
            "--priority",
            "3",
            "Where is my order?",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Enqueue {
                conversation,
                channel,
                priority,
                text,
                ..
            }) => {
                assert_eq!(conversation, "c-42");
                assert_eq!(channel, ChannelType::WhatsApp);
                assert_eq!(priority, 3);
                assert_eq!(text, "Where is my order?");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn enqueue_rejects_unknown_channel() {
        let result = Cli::try_parse_from([
            "switchboard",
            "enqueue",
            "--conversation",
            "c-1",
            "--channel",
            "carrier-pigeon",
            "hi",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = switchboard_config::load_and_validate_str("").unwrap();
        assert_eq!(config.processor.max_concurrency, 3);
        assert!(config.to_toml_string().unwrap().contains("[processor]"));
    }
}
