//! CLI for the SMA channel message archiver.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use sma_core::{config, logging};
use std::path::PathBuf;

use commands::{run_completions, run_config, run_files, run_man, run_save};

/// Top-level CLI for the SMA message archiver.
#[derive(Debug, Parser)]
#[command(name = "sma")]
#[command(about = "SMA: archive a chat channel's messages and attachments", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.config/sma/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log to stderr instead of the log file.
    #[arg(long, global = true)]
    pub log_to_console: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// Which channel, which messages, and where they come from.
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    /// Channel name, with or without the leading '#'.
    #[arg(long, short = 'c')]
    pub channel: String,

    /// API token; sent as a bearer token with every request.
    #[arg(long, short = 't', env = "SLACK_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Oldest message to keep (YYYY-MM-DD or RFC 3339).
    #[arg(long, value_name = "DATE")]
    pub from: Option<String>,

    /// Newest message to keep (YYYY-MM-DD or RFC 3339).
    #[arg(long, value_name = "DATE")]
    pub to: Option<String>,

    /// Output directory (default: config `output_dir`, else the current directory).
    #[arg(long, short = 'd', value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Read history from a previously exported JSON file instead of running the exporter.
    #[arg(long, value_name = "PATH")]
    pub history_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Export a channel into an XML archive with its attachments.
    Save {
        #[command(flatten)]
        target: TargetArgs,

        /// Stylesheet copied into the archive instead of the bundled one.
        #[arg(long, value_name = "PATH")]
        xsl: Option<PathBuf>,

        /// Attachments downloaded at the same time.
        #[arg(long, short = 'j', value_name = "N")]
        concurrency: Option<usize>,

        /// Package the archive as a zip file.
        #[arg(long, overrides_with = "no_zip")]
        zip: bool,

        /// Write a plain folder even if the config enables zip.
        #[arg(long)]
        no_zip: bool,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List the attachments a save would download, without downloading.
    Files {
        #[command(flatten)]
        target: TargetArgs,

        /// Print the list as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the config file location and effective settings.
    Config,

    /// Generate shell completions on stdout.
    Completions {
        /// Target shell.
        shell: Shell,
    },

    /// Render the man page on stdout.
    Man,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = match &cli.config {
            Some(path) => config::load_or_init_at(path)?,
            None => config::load_or_init()?,
        };
        logging::init(cli.log_to_console || cfg.log_to_console);
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Save {
                target,
                xsl,
                concurrency,
                zip,
                no_zip,
                json,
            } => {
                let opts = commands::SaveOptions {
                    xsl,
                    concurrency,
                    zip: commands::zip_choice(zip, no_zip),
                    json,
                };
                run_save(&cfg, &target, &opts).await?
            }
            CliCommand::Files { target, json } => run_files(&cfg, &target, json).await?,
            CliCommand::Config => run_config(&cfg, cli.config.as_deref())?,
            CliCommand::Completions { shell } => run_completions(shell),
            CliCommand::Man => run_man()?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
