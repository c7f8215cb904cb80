//! Preference handlers. These touch only the local state file.

use serde::Serialize;

use kumalink_core::StorageSelector;
use kumalink_core::host::detect_system_timezone;
use kumalink_core::storage::AUTO_TIMEZONE;

use crate::cli::{GlobalOpts, PrefsArgs, PrefsCommand, Toggle};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
pub struct Prefs {
    pub remember: bool,
    pub timezone: String,
    /// The zone actually used for display.
    pub effective_timezone: String,
    pub token_stored: bool,
}

pub fn read_prefs(storage: &StorageSelector) -> Result<Prefs, CliError> {
    let timezone = storage.timezone_preference()?;
    let effective_timezone = if timezone == AUTO_TIMEZONE {
        detect_system_timezone()
    } else {
        timezone.clone()
    };
    Ok(Prefs {
        remember: storage.remember()?,
        timezone,
        effective_timezone,
        token_stored: storage.token()?.is_some(),
    })
}

fn detail(p: &Prefs) -> String {
    [
        format!("Remember:  {}", if p.remember { "on" } else { "off" }),
        format!("Timezone:  {} ({})", p.timezone, p.effective_timezone),
        format!("Token:     {}", if p.token_stored { "stored" } else { "none" }),
    ]
    .join("\n")
}

pub fn handle_with(
    storage: &StorageSelector,
    args: PrefsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        PrefsCommand::Remember { value } => {
            storage.set_remember(matches!(value, Toggle::On))?;
            output::notice("Preference saved", global.quiet);
            Ok(())
        }
        PrefsCommand::Timezone { zone } => {
            storage.set_timezone_preference(&zone)?;
            output::notice("Preference saved", global.quiet);
            Ok(())
        }
        PrefsCommand::Show => {
            let prefs = read_prefs(storage)?;
            let out = output::render_single(global.output, &prefs, detail, |p| {
                p.effective_timezone.clone()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

pub fn handle(args: PrefsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    handle_with(&kumalink_config::default_storage(), args, global)
}
