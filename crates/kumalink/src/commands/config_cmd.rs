//! Config subcommand handlers.

use dialoguer::{Input, Select};

use kumalink_config::{Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::{CliError, prompt_err};
use crate::output;

use super::Context;

const REDACTED: &str = "********";

/// Copy of `cfg` safe to print.
pub fn redacted(cfg: &Config) -> Config {
    Config {
        default_profile: cfg.default_profile.clone(),
        defaults: kumalink_config::Defaults {
            output: cfg.defaults.output.clone(),
            color: cfg.defaults.color.clone(),
            timeout: cfg.defaults.timeout,
        },
        profiles: cfg
            .profiles
            .iter()
            .map(|(name, p)| {
                let mut p = p.clone();
                if p.password.is_some() {
                    p.password = Some(REDACTED.into());
                }
                (name.clone(), p)
            })
            .collect(),
    }
}

fn init_wizard(mut cfg: Config) -> Result<(), CliError> {
    let config_path = config::config_path();
    eprintln!("kumalink configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let server: String = Input::new()
        .with_prompt("Server URL")
        .default("http://localhost:3001".into())
        .validate_with(|s: &String| {
            s.parse::<url::Url>()
                .map(|_| ())
                .map_err(|e| format!("invalid URL: {e}"))
        })
        .interact_text()
        .map_err(prompt_err)?;

    let username: String = Input::new()
        .with_prompt("Username (empty to log in interactively)")
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;

    let choices = &[
        "Prompt when needed (recommended)",
        "Read from an environment variable",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where does the password come from?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    let (password, password_env) = match selection {
        1 => {
            let var: String = Input::new()
                .with_prompt("Environment variable")
                .default("KUMALINK_PASSWORD".into())
                .interact_text()
                .map_err(prompt_err)?;
            (None, Some(var))
        }
        2 => (Some(rpassword::prompt_password("Password: ")?), None),
        _ => (None, None),
    };

    cfg.profiles.insert(
        profile_name.clone(),
        Profile {
            server,
            username: Some(username).filter(|u| !u.is_empty()),
            password,
            password_env,
            timeout: None,
        },
    );
    if cfg.default_profile.is_none() || cfg.profiles.len() == 1 {
        cfg.default_profile = Some(profile_name.clone());
    }

    config::save_config(&cfg)?;
    eprintln!("\n   Profile '{profile_name}' saved.");
    eprintln!("   Next: kumalink login --profile {profile_name}");
    Ok(())
}

pub fn handle(args: ConfigArgs, ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => {
            let cfg = kumalink_config::load_config_or_default();
            init_wizard(cfg)
        }

        ConfigCommand::Show => {
            let safe = redacted(&ctx.config);
            let out = match global.output {
                OutputFormat::Json => serde_json::to_string_pretty(&safe)?,
                OutputFormat::JsonCompact => serde_json::to_string(&safe)?,
                OutputFormat::Table | OutputFormat::Plain => {
                    toml::to_string_pretty(&safe).map_err(kumalink_config::ConfigError::from)?
                }
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(
                &format!(
                    "config: {}\nstate:  {}",
                    config::config_path().display(),
                    config::state_path().display()
                ),
                global.quiet,
            );
            Ok(())
        }
    }
}
