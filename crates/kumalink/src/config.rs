//! CLI configuration: thin wrapper around `kumalink_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--server, --timeout, --username).

use std::time::Duration;

use secrecy::SecretString;

use kumalink_config::{Config, Profile};
use kumalink_core::SessionConfig;

use crate::cli::{AuthArgs, GlobalOpts};
use crate::error::CliError;

pub use kumalink_config::{config_path, load_config, save_config, state_path};

/// The profile in effect plus its name.
pub struct ActiveProfile {
    pub name: String,
    pub profile: Option<Profile>,
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

pub fn active_profile(global: &GlobalOpts, config: &Config) -> ActiveProfile {
    let name = active_profile_name(global, config);
    let profile = config.profiles.get(&name).cloned();
    ActiveProfile { name, profile }
}

fn profile_not_found(name: &str, config: &Config) -> CliError {
    let mut available: Vec<_> = config.profiles.keys().cloned().collect();
    available.sort();
    CliError::ProfileNotFound {
        name: name.into(),
        available: if available.is_empty() {
            "(none)".into()
        } else {
            available.join(", ")
        },
    }
}

/// Build a `SessionConfig`. CLI flags take priority over profile values.
pub fn resolve_session_config(
    active: &ActiveProfile,
    config: &Config,
    global: &GlobalOpts,
) -> Result<SessionConfig, CliError> {
    let mut profile = match (&active.profile, &global.server) {
        (Some(profile), _) => profile.clone(),
        (None, Some(_)) => Profile::default(),
        // An explicitly requested profile must exist.
        (None, None) if global.profile.is_some() => {
            return Err(profile_not_found(&active.name, config));
        }
        (None, None) => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };
    if let Some(server) = &global.server {
        profile.server.clone_from(server);
    }

    let mut session = kumalink_config::profile_to_session_config(&profile, &config.defaults)?;
    if let Some(secs) = global.timeout {
        session = session.with_request_timeout(Duration::from_secs(secs));
    }
    Ok(session)
}

/// Credentials for a fresh login: username from flag or profile, password
/// from env/profile, or an interactive prompt as a last resort.
pub fn resolve_credentials(
    active: &ActiveProfile,
    auth: &AuthArgs,
) -> Result<(String, SecretString), CliError> {
    let mut profile = active.profile.clone().unwrap_or_default();
    if let Some(username) = &auth.username {
        profile.username = Some(username.clone());
    }

    match kumalink_config::resolve_credentials(&profile, &active.name) {
        Ok(creds) => Ok(creds),
        Err(kumalink_config::ConfigError::NoCredentials { .. }) => {
            let Some(username) = profile.username else {
                return Err(CliError::NoCredentials {
                    profile: active.name.clone(),
                });
            };
            if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
                return Err(CliError::NoCredentials {
                    profile: active.name.clone(),
                });
            }
            let password = rpassword::prompt_password(format!("Password for {username}: "))?;
            Ok((username, SecretString::from(password)))
        }
        Err(e) => Err(e.into()),
    }
}
