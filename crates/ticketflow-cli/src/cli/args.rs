use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ticketflow",
    version,
    about = "Parse support tickets, repair their SQL, run it and check the success criteria"
)]
pub struct Cli {
    /// Log line format on stderr; the level comes from TICKETFLOW_LOG.
    #[arg(long, global = true, value_enum, env = "TICKETFLOW_LOG_FORMAT", default_value = "compact")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Extract id, SQL and criteria from ticket text
    Parse(ParseArgs),
    /// Apply the correction rules to a ticket's SQL
    Fix(FixArgs),
    /// Check SQL and criteria for problems without running anything
    Validate(ValidateArgs),
    /// Run one ticket and evaluate its success criteria
    Evaluate(EvaluateArgs),
    /// Run every ticket of a `---` separated batch
    Batch(BatchArgs),
    /// Write a sample ticketflow.yaml
    Init(InitArgs),
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ParseArgs {
    /// Ticket file, or `-` for stdin
    #[arg(default_value = "-")]
    pub input: PathBuf,

    /// Treat the input as a batch and never fail on missing fields
    #[arg(long)]
    pub batch: bool,

    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug, Clone)]
pub struct FixArgs {
    /// Ticket file, or `-` for stdin
    #[arg(default_value = "-")]
    pub input: PathBuf,

    /// Input is bare SQL rather than ticket text
    #[arg(long)]
    pub sql: bool,

    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Ticket file, or `-` for stdin
    #[arg(default_value = "-")]
    pub input: PathBuf,

    /// Input is bare SQL rather than ticket text
    #[arg(long)]
    pub sql: bool,

    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug, Clone)]
pub struct EvaluateArgs {
    /// Ticket file, or `-` for stdin
    #[arg(default_value = "-")]
    pub input: PathBuf,

    /// JSON result rows to evaluate instead of executing: an array of rows
    /// for query 1, or an object keyed by query index
    #[arg(long)]
    pub results: Option<PathBuf>,

    /// Correct the SQL before executing it
    #[arg(long)]
    pub fix: bool,

    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Also print a reply template
    #[arg(long, value_enum)]
    pub reply: Option<ReplyKind>,

    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReplyKind {
    Email,
    Helpdesk,
}

#[derive(clap::Args, Debug, Clone)]
pub struct BatchArgs {
    /// Batch file, or `-` for stdin
    #[arg(default_value = "-")]
    pub input: PathBuf,

    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write completed tickets as a JSON array to this path
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Correct every ticket's SQL before executing it
    #[arg(long)]
    pub auto_fix: bool,

    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug, Clone)]
pub struct InitArgs {
    #[arg(long, default_value = "ticketflow.yaml")]
    pub config: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}
