//! Clap derive structures for the `vaccimap` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// vaccimap -- crowd-sourced COVID testing and vaccination site registry
#[derive(Debug, Parser)]
#[command(
    name = "vaccimap",
    version,
    about = "Report and browse COVID testing and vaccination sites",
    long_about = "Reads and writes the VacciMap site registry in a realtime database.\n\n\
        Sites are identified by their coordinates rounded to three decimals;\n\
        reporting a site at the same rounded coordinates updates it in place.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Database profile to use
    #[arg(long, short = 'p', env = "VACCIMAP_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Database URL (overrides profile)
    #[arg(long, short = 'd', env = "VACCIMAP_DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// Database auth token
    #[arg(long, env = "VACCIMAP_AUTH_TOKEN", global = true, hide_env = true)]
    pub auth_token: Option<String>,

    /// Use an in-process demo database instead of a remote one
    #[arg(long, global = true)]
    pub offline: bool,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "VACCIMAP_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "VACCIMAP_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Seconds to wait for the initial site replay (overrides profile)
    #[arg(long, env = "VACCIMAP_SYNC_TIMEOUT", global = true)]
    pub sync_timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

/// Site kind as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// COVID testing site
    #[value(alias = "test")]
    Testing,
    /// COVID vaccination site
    #[value(alias = "vaccine")]
    Vaccination,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List, inspect, report, and remove sites
    #[command(alias = "s")]
    Sites(SitesArgs),

    /// Read and add site comments
    #[command(alias = "c")]
    Comments(CommentsArgs),

    /// Stream site changes as they happen
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Convert between coordinates and storage keys
    Key(KeyArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared Arguments ─────────────────────────────────────────────────

/// A site location. Negative values are accepted as-is (`40.7 -74.0`).
#[derive(Debug, Clone, Args)]
pub struct CoordArgs {
    /// Latitude in decimal degrees
    #[arg(allow_negative_numbers = true)]
    pub latitude: f64,

    /// Longitude in decimal degrees
    #[arg(allow_negative_numbers = true)]
    pub longitude: f64,
}

/// Filters shared by listing and watching.
#[derive(Debug, Clone, Args)]
pub struct FilterArgs {
    /// Only sites of this kind
    #[arg(long, short = 'k')]
    pub kind: Option<KindArg>,

    /// Only sites currently available
    #[arg(long, conflicts_with = "unavailable")]
    pub available: bool,

    /// Only sites currently unavailable
    #[arg(long)]
    pub unavailable: bool,

    /// Only sites with a reported wait of at most this many minutes
    #[arg(long, value_name = "MINUTES")]
    pub max_wait: Option<u32>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SITES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SitesArgs {
    #[command(subcommand)]
    pub command: SitesCommand,
}

#[derive(Debug, Subcommand)]
pub enum SitesCommand {
    /// List known sites with their pin colors
    #[command(alias = "ls")]
    List(FilterArgs),

    /// Show a single site
    Get(CoordArgs),

    /// Report a site, creating or overwriting it at its rounded coordinates
    Report {
        #[command(flatten)]
        at: CoordArgs,

        /// Kind of site
        #[arg(long, short = 'k', default_value = "testing")]
        kind: KindArg,

        /// Current wait in minutes
        #[arg(long, short = 'w', value_name = "MINUTES")]
        wait: Option<u32>,

        /// Mark the site as currently unavailable
        #[arg(long)]
        unavailable: bool,

        /// Comment to attach once the site is stored
        #[arg(long, short = 'm')]
        comment: Option<String>,
    },

    /// Remove a site
    #[command(alias = "rm")]
    Remove(CoordArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMMENTS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CommentsArgs {
    #[command(subcommand)]
    pub command: CommentsCommand,
}

#[derive(Debug, Subcommand)]
pub enum CommentsCommand {
    /// List a site's comments, oldest first
    #[command(alias = "ls")]
    List(CoordArgs),

    /// Add a comment to a site
    Add {
        #[command(flatten)]
        at: CoordArgs,

        /// Comment text
        text: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Exit after this many change batches
    #[arg(long, short = 'n')]
    pub count: Option<u64>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  KEY
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct KeyArgs {
    #[command(subcommand)]
    pub command: KeyCommand,
}

#[derive(Debug, Subcommand)]
pub enum KeyCommand {
    /// Encode coordinates as a storage key
    Encode(CoordArgs),

    /// Decode a storage or display key back to coordinates
    Decode {
        /// Key such as "40_713 -74_006" or "40.713 -74.006"
        #[arg(allow_hyphen_values = true)]
        key: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// Set a profile value
    Set {
        /// Profile key (e.g., "database_url", "testing_collection")
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store an auth token in the system keyring
    SetToken {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },

    /// Remove a profile's auth token from the system keyring
    RemoveToken {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
