//! Clap derive structures for the `emstrack` CLI.
//!
//! Also compiled by `build.rs` for man page generation, so this module may
//! only depend on `clap` and `clap_complete`.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// emstrack -- inspect and follow an EMSTrack dispatch server
#[derive(Debug, Parser)]
#[command(
    name = "emstrack",
    version,
    about = "Follow ambulances, hospitals and calls on an EMSTrack server",
    long_about = "Command-line client for EMSTrack dispatch servers.\n\n\
        Seeds its caches from the REST API, then keeps them current from\n\
        the server's MQTT broker.",
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
    /// Server profile to use
    #[arg(long, short = 'p', env = "EMSTRACK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// REST API root URL (overrides profile)
    #[arg(long, env = "EMSTRACK_API_URL", global = true)]
    pub api_url: Option<String>,

    /// MQTT broker URL (overrides profile)
    #[arg(long, env = "EMSTRACK_MQTT_URL", global = true)]
    pub mqtt_url: Option<String>,

    /// Username for the broker and the REST API
    #[arg(long, short = 'u', env = "EMSTRACK_USERNAME", global = true)]
    pub username: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "EMSTRACK_OUTPUT",
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

    /// Accept self-signed TLS certificates on the REST API
    #[arg(long, short = 'k', env = "EMSTRACK_INSECURE", global = true)]
    pub insecure: bool,

    /// Request and connect timeout in seconds (overrides profile)
    #[arg(long, env = "EMSTRACK_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one identifier per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Color when stdout is a terminal and NO_COLOR is unset
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List or inspect ambulances
    #[command(alias = "amb", alias = "a")]
    Ambulances(EntityArgs),

    /// List or inspect hospitals
    #[command(alias = "hosp")]
    Hospitals(EntityArgs),

    /// List or inspect calls
    #[command(alias = "c")]
    Calls(EntityArgs),

    /// List or inspect bases
    Bases(EntityArgs),

    /// Stream live updates from the broker
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Publish a message to a broker topic
    #[command(alias = "pub")]
    Publish(PublishArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Entities ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct EntityArgs {
    #[command(subcommand)]
    pub command: EntityCommand,
}

#[derive(Debug, Subcommand)]
pub enum EntityCommand {
    /// List every record the server reports
    #[command(alias = "ls")]
    List,

    /// Show one record by id
    Get {
        /// Record id
        id: String,
    },
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Follow ambulances
    #[arg(long)]
    pub ambulances: bool,

    /// Follow hospitals
    #[arg(long)]
    pub hospitals: bool,

    /// Follow calls
    #[arg(long)]
    pub calls: bool,

    /// Exit after this many updates
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

impl WatchArgs {
    /// No selection means "everything".
    pub fn follows_all(&self) -> bool {
        !(self.ambulances || self.hospitals || self.calls)
    }
}

// ── Publish ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PublishArgs {
    /// Destination topic, e.g. `user/dispatcher/client/abc/ambulance/7/status`
    pub topic: String,

    /// Message body, sent verbatim
    pub payload: String,

    /// Delivery guarantee (0, 1 or 2)
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub qos: u8,

    /// Ask the broker to retain the message
    #[arg(long)]
    pub retain: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration (secrets redacted)
    Show,

    /// Print the config file location
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a password in the system keyring
    SetPassword {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
