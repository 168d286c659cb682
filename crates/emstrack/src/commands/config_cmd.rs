//! Config subcommand handlers.

use dialoguer::{Input, Select};

use emstrack_config::{self as config, Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{active_profile_name, available_profiles};
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Copy of the config with plaintext secrets masked.
fn redacted(cfg: &Config) -> Config {
    let profiles = cfg
        .profiles
        .iter()
        .map(|(name, p)| {
            let mut p = p.clone();
            if p.password.is_some() {
                p.password = Some(REDACTED.into());
            }
            if p.api_token.is_some() {
                p.api_token = Some(REDACTED.into());
            }
            (name.clone(), p)
        })
        .collect();
    Config {
        default_profile: cfg.default_profile.clone(),
        defaults: config::Defaults {
            output: cfg.defaults.output.clone(),
            color: cfg.defaults.color.clone(),
            insecure: cfg.defaults.insecure,
            timeout: cfg.defaults.timeout,
        },
        profiles,
    }
}

fn require_profile<'a>(cfg: &'a Config, name: &str) -> Result<&'a Profile, CliError> {
    cfg.profiles.get(name).ok_or_else(|| CliError::ProfileNotFound {
        name: name.into(),
        available: available_profiles(cfg),
    })
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(),

        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            let out = output::render_single(
                global.output,
                &redacted(&cfg),
                |c| toml::to_string_pretty(c).unwrap_or_else(|e| format!("{e}")),
                |_| config::config_path().display().to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config()?;
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: emstrack config init");
            } else {
                for name in cfg.profiles.keys() {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config()?;
            require_profile(&cfg, &name)?;
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("✓ Default profile set to '{name}'");
            }
            Ok(())
        }

        ConfigCommand::SetPassword { profile } => {
            let cfg = config::load_config()?;
            let profile_name = profile.unwrap_or_else(|| active_profile_name(global, &cfg));
            require_profile(&cfg, &profile_name)?;

            let secret = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
            if secret.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "password cannot be empty".into(),
                });
            }

            config::store_password(&profile_name, &secret)?;
            if !global.quiet {
                eprintln!("✓ Password stored in system keyring for profile '{profile_name}'");
            }
            Ok(())
        }
    }
}

// ── Init: interactive wizard ────────────────────────────────────────

fn init() -> Result<(), CliError> {
    let config_path = config::config_path();
    eprintln!("EMSTrack CLI configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let api_url: String = Input::new()
        .with_prompt("REST API URL")
        .default("https://localhost:8000/en/api/".into())
        .interact_text()
        .map_err(prompt_err)?;

    let mqtt_url: String = Input::new()
        .with_prompt("MQTT broker URL")
        .default("mqtts://localhost:8883".into())
        .interact_text()
        .map_err(prompt_err)?;

    for (field, raw) in [("api_url", &api_url), ("mqtt_url", &mqtt_url)] {
        raw.parse::<url::Url>().map_err(|e| CliError::Validation {
            field: field.into(),
            reason: format!("invalid URL '{raw}': {e}"),
        })?;
    }

    let username: String = Input::new()
        .with_prompt("Username")
        .interact_text()
        .map_err(prompt_err)?;
    let pass = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
    if username.is_empty() || pass.is_empty() {
        return Err(CliError::Validation {
            field: "credentials".into(),
            reason: "username and password cannot be empty".into(),
        });
    }

    let store_choices = &[
        "Store password in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let store_selection = Select::new()
        .with_prompt("Where to store the password?")
        .items(store_choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    let password = if store_selection == 0 {
        config::store_password(&profile_name, &pass)?;
        eprintln!("   ✓ Password stored in system keyring");
        None
    } else {
        Some(pass)
    };

    let mut cfg = config::load_config_or_default();
    cfg.profiles.insert(
        profile_name.clone(),
        Profile {
            api_url,
            mqtt_url,
            username: Some(username),
            password,
            ..Profile::default()
        },
    );
    cfg.default_profile = Some(profile_name.clone());

    let path = config::save_config(&cfg)?;
    eprintln!("\n✓ Configuration written to {}", path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Test it: emstrack ambulances list");
    Ok(())
}
