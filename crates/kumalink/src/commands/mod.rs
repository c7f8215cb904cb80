//! Command dispatch: bridges CLI args -> session calls -> output formatting.

pub mod auth;
pub mod config_cmd;
pub mod monitors;
pub mod prefs;
pub mod status;
pub mod util;
pub mod watch;

use kumalink_config::Config;

use crate::cli::{Command, GlobalOpts};
use crate::config::ActiveProfile;
use crate::error::CliError;

/// Everything resolved before a handler runs.
pub struct Context {
    pub config: Config,
    pub active: ActiveProfile,
    /// Colour on stderr (toasts, notices).
    pub color: bool,
}

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Watch(args) => watch::handle(ctx, args, global).await,
        Command::Status(args) => status::handle(ctx, args, global).await,
        Command::Login(args) => auth::login(ctx, args, global).await,
        Command::Logout => auth::logout(ctx, global).await,
        Command::Monitors(args) => monitors::handle(ctx, args, global).await,
        Command::Prefs(args) => prefs::handle(args, global),
        Command::Config(args) => config_cmd::handle(args, ctx, global),
    }
}
