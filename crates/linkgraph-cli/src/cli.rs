use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "linkgraph",
    about = "linkgraph: records with synchronously maintained reverse links",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log lifecycle and query decisions to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a JSON script of record operations against a fresh graph
    Run(RunArgs),
    /// Show the entities, link fields, and reciprocals of a schema
    Schema(SchemaArgs),
    /// Walk through the built-in event/process scenario
    Demo,
}

#[derive(Args)]
pub struct RunArgs {
    /// Path to the script (a JSON array of steps)
    pub script: PathBuf,
    /// TOML schema to load instead of the built-in one
    #[arg(long)]
    pub schema: Option<PathBuf>,
}

#[derive(Args)]
pub struct SchemaArgs {
    /// TOML schema to load instead of the built-in one
    pub path: Option<PathBuf>,
}
