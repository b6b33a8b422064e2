mod subcommands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cloudinbox")]
#[command(about = "Conversation sync for WhatsApp Cloud API inboxes")]
#[command(version = crate::VERSION)]
pub struct Cli {
    /// Config file (defaults to ~/.cloudinbox/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a conversation and follow it live
    Watch {
        conversation: String,
        /// Print messages older than the first page as well
        #[arg(long)]
        history: bool,
    },
    /// Send a message to a conversation
    Send {
        conversation: String,
        /// Message text (ignored with --template)
        #[arg(default_value = "")]
        text: String,
        /// Send this approved template instead of free-form text
        #[arg(long, short = 't')]
        template: Option<String>,
        /// Template variable, in placeholder order (repeatable)
        #[arg(long = "param", short = 'p')]
        params: Vec<String>,
    },
    /// List approved templates for a conversation
    Templates { conversation: String },
    /// Show the messaging window state of a conversation
    Window { conversation: String },
    /// Manage the config file
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective config with secrets redacted
    Show,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Watch {
            conversation,
            history,
        } => {
            subcommands::watch(config_path, &conversation, history).await?;
        }
        Commands::Send {
            conversation,
            text,
            template,
            params,
        } => {
            subcommands::send(config_path, &conversation, &text, template.as_deref(), &params)
                .await?;
        }
        Commands::Templates { conversation } => {
            subcommands::templates(config_path, &conversation).await?;
        }
        Commands::Window { conversation } => {
            subcommands::window(config_path, &conversation).await?;
        }
        Commands::Config { cmd } => match cmd {
            ConfigCommands::Init { force } => subcommands::config_init(config_path, force)?,
            ConfigCommands::Show => subcommands::config_show(config_path)?,
        },
    }

    Ok(())
}
