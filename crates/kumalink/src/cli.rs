//! Clap derive structures for the `kumalink` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use kumalink_core::MonitorId;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// kumalink -- live monitoring client for Uptime Kuma servers
#[derive(Debug, Parser)]
#[command(
    name = "kumalink",
    version,
    about = "Watch and manage Uptime Kuma monitors from the command line",
    long_about = "Connects to an Uptime Kuma server over its Socket.IO channel,\n\
        keeps a live mirror of monitors and heartbeats, and sends\n\
        monitor and account commands.",
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
    #[arg(long, short = 'p', env = "KUMALINK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Server URL (overrides profile)
    #[arg(long, short = 's', env = "KUMALINK_SERVER", global = true)]
    pub server: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "KUMALINK_OUTPUT",
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
    #[arg(long, env = "KUMALINK_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream notifications and status changes until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Show the current status of every monitor
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Log in with username and password
    Login(LoginArgs),

    /// Forget the stored session token
    Logout,

    /// Manage monitors
    #[command(alias = "mon", alias = "m")]
    Monitors(MonitorsArgs),

    /// View and change client preferences
    Prefs(PrefsArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),
}

// ── Session Arguments ────────────────────────────────────────────────

/// Credentials used when no stored token restores the session.
#[derive(Debug, Args)]
pub struct AuthArgs {
    /// Username (overrides profile)
    #[arg(long, short = 'u', env = "KUMALINK_USERNAME")]
    pub username: Option<String>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub auth: AuthArgs,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub auth: AuthArgs,

    /// How long to wait for heartbeat catch-up before printing
    #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
    pub settle: Duration,
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    #[command(flatten)]
    pub auth: AuthArgs,

    /// Keep the token across restarts
    #[arg(long, overrides_with = "no_remember")]
    pub remember: bool,

    /// Keep the token for this process only
    #[arg(long, overrides_with = "remember")]
    pub no_remember: bool,
}

impl LoginArgs {
    /// Explicit remember choice, `None` to keep the stored preference.
    pub fn remember_choice(&self) -> Option<bool> {
        match (self.remember, self.no_remember) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

// ── Monitors ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct MonitorsArgs {
    #[command(flatten)]
    pub auth: AuthArgs,

    #[command(subcommand)]
    pub command: MonitorsCommand,
}

#[derive(Debug, Subcommand)]
pub enum MonitorsCommand {
    /// Create a monitor
    Add {
        /// Display name
        #[arg(long)]
        name: String,

        /// Monitor type (http, keyword, port, ping, ...)
        #[arg(long = "type", default_value = "http")]
        kind: String,

        /// Target URL
        #[arg(long)]
        url: String,

        /// Check interval in seconds
        #[arg(long, default_value = "60")]
        interval: u32,
    },

    /// Show one monitor's full definition
    Get {
        /// Monitor ID
        id: MonitorId,
    },

    /// Delete a monitor
    #[command(alias = "rm")]
    Delete {
        /// Monitor ID
        id: MonitorId,
    },

    /// Stop checking a monitor
    Pause {
        /// Monitor ID
        id: MonitorId,
    },

    /// Resume checking a paused monitor
    Resume {
        /// Monitor ID
        id: MonitorId,
    },
}

// ── Preferences ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PrefsArgs {
    #[command(subcommand)]
    pub command: PrefsCommand,
}

#[derive(Debug, Subcommand)]
pub enum PrefsCommand {
    /// Keep the session token across restarts
    Remember {
        #[arg(value_enum)]
        value: Toggle,
    },

    /// Display timezone (IANA name, or "auto")
    Timezone { zone: String },

    /// Show stored preferences
    Show,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive configuration wizard
    Init,

    /// Show the current configuration (passwords redacted)
    Show,

    /// Print the config and state file paths
    Path,
}
