use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use medgate_authz::Action;

#[derive(Parser)]
#[command(name = "medgate")]
#[command(about = "Medgate access policy tool: validate, query and hot-reload hospital policies")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (TOML). Defaults to ./medgate.toml when present
    #[arg(short, long, global = true, env = "MEDGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Policy file (overrides authz.policy_path; the built-in policy is used when unset)
    #[arg(short, long, global = true, env = "MEDGATE_POLICY")]
    pub policy: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,

    /// Log level (overrides logging.level; RUST_LOG wins over both)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load and validate the policy
    Check,
    /// Decide a single request
    Decide(DecideArgs),
    /// Print the scope matrix
    Matrix(MatrixArgs),
    /// Watch the policy file and reload it on change
    Watch,
}

#[derive(clap::Args)]
pub struct DecideArgs {
    /// Role of the caller (e.g. patient, lab_assistant)
    #[arg(short, long)]
    pub role: String,
    /// Module (e.g. appointments)
    #[arg(short, long)]
    pub module: String,
    /// Action: create, read, update or delete
    #[arg(short, long)]
    pub action: Action,
    /// Acting user id
    #[arg(long, default_value_t = 0)]
    pub user_id: i64,
    #[arg(long)]
    pub patient_id: Option<i64>,
    #[arg(long)]
    pub doctor_id: Option<i64>,
    #[arg(long)]
    pub staff_id: Option<i64>,
    /// JSON file with a full context; replaces the identity flags
    #[arg(long, conflicts_with_all = ["patient_id", "doctor_id", "staff_id"])]
    pub context: Option<PathBuf>,
    /// JSON file with the target row
    #[arg(long)]
    pub row: Option<PathBuf>,
    /// Evaluate as of this RFC 3339 instant instead of now
    #[arg(long)]
    pub at: Option<String>,
    /// Print why a request was denied
    #[arg(long)]
    pub explain: bool,
}

#[derive(clap::Args)]
pub struct MatrixArgs {
    /// Only this module
    #[arg(short, long)]
    pub module: Option<String>,
    /// Only this role
    #[arg(short, long)]
    pub role: Option<String>,
}
