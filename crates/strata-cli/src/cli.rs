use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Strata authorization CLI: validate policies and check decisions")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Engine configuration file (TOML)
    #[arg(short, long, global = true, env = "STRATA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level or filter directive (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse and build a policy file, reporting the first error
    Validate(PolicyArgs),
    /// Decide whether a user may run an operation
    Check(CheckArgs),
    /// Filter catalog objects down to those a user may see
    Visible(VisibleArgs),
    /// List a user's groups, roles and effective privileges
    Privileges(UserArgs),
    /// Watch a policy file and report every reload
    Watch(PolicyArgs),
}

#[derive(clap::Args)]
pub struct PolicyArgs {
    /// Policy file (.ini or .toml)
    #[arg(short, long)]
    pub policy: PathBuf,
}

#[derive(clap::Args)]
pub struct UserArgs {
    #[command(flatten)]
    pub policy: PolicyArgs,
    /// Subject to evaluate
    #[arg(short, long)]
    pub user: String,
}

#[derive(clap::Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub subject: UserArgs,
    /// Operation as JSON, e.g. '{"type": "query", "inputs": ["db1.t1"]}'
    #[arg(short, long, conflicts_with = "operation_file", required_unless_present = "operation_file")]
    pub operation: Option<String>,
    /// Path to a JSON file holding the operation
    #[arg(long)]
    pub operation_file: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct VisibleArgs {
    #[command(flatten)]
    pub subject: UserArgs,
    /// Objects written as server.db[.table[.column]]
    #[arg(required = true)]
    pub objects: Vec<String>,
}
