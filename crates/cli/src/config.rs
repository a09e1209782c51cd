//! Top-level arguments, logging setup and dispatch.

use std::fs;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use placement::SelectionConfig;
use tracing_subscriber::EnvFilter;

use crate::commands::Command;

/// Resolve NeoFS placement policies against a netmap.
#[derive(Parser, Debug)]
#[command(name = "netmap")]
#[command(author, version, about, long_about = None)]
pub struct CliConfig {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` wins when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// JSON selection config (backup factor, aggregator).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl CliConfig {
    pub fn run(&self) -> anyhow::Result<()> {
        init_logging(self.verbose);

        let selection = self.selection_config()?;
        let result = self.command.execute(&selection)?;

        match self.format {
            OutputFormat::Text => print!("{result}"),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        }
        Ok(())
    }

    fn selection_config(&self) -> anyhow::Result<SelectionConfig> {
        let Some(path) = &self.config else {
            return Ok(SelectionConfig::default());
        };
        let json = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        SelectionConfig::from_json(&json)
            .with_context(|| format!("decoding config {}", path.display()))
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .init();
}
