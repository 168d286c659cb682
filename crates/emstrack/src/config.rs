//! Resolve a `ClientConfig` from the config file, the active profile and
//! CLI flag overrides.
//!
//! Precedence per field: flag > env var > profile > `[defaults]`.

use std::time::Duration;

use secrecy::SecretString;

use emstrack_config::{self as config, Config, Profile};
use emstrack_core::{ClientConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Active profile name from `--profile`, else the config default.
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    cfg.active_profile_name(global.profile.as_deref())
}

/// Build the connection settings for a server-bound command.
pub fn build_client_config(global: &GlobalOpts) -> Result<ClientConfig, CliError> {
    let cfg = config::load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    match cfg.profiles.get(&profile_name) {
        Some(profile) => resolve_profile(profile, &profile_name, &cfg, global),
        None if global.profile.is_some() => Err(CliError::ProfileNotFound {
            name: profile_name,
            available: available_profiles(&cfg),
        }),
        None => from_flags(global, &cfg, &profile_name),
    }
}

/// Comma-separated profile names, or `(none)`.
pub fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        "(none)".into()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<ClientConfig, CliError> {
    let mut merged = profile.clone();
    if let Some(ref url) = global.api_url {
        merged.api_url.clone_from(url);
    }
    if let Some(ref url) = global.mqtt_url {
        merged.mqtt_url.clone_from(url);
    }
    if global.username.is_some() {
        merged.username.clone_from(&global.username);
    }
    if global.insecure {
        merged.insecure = Some(true);
    }
    if global.timeout.is_some() {
        merged.timeout = global.timeout;
    }

    Ok(config::profile_to_client_config(
        &merged,
        profile_name,
        &cfg.defaults,
    )?)
}

/// No profile on disk: `--api-url` and `--mqtt-url` are both required.
fn from_flags(
    global: &GlobalOpts,
    cfg: &Config,
    profile_name: &str,
) -> Result<ClientConfig, CliError> {
    let (Some(api_url), Some(mqtt_url)) = (global.api_url.as_deref(), global.mqtt_url.as_deref())
    else {
        return Err(CliError::NoConfig {
            path: config::config_path().display().to_string(),
        });
    };

    let mut client = ClientConfig::new(
        parse_url("api-url", api_url)?,
        parse_url("mqtt-url", mqtt_url)?,
    );
    client.timeout = Duration::from_secs(global.timeout.unwrap_or(cfg.defaults.timeout));
    if global.insecure || cfg.defaults.insecure {
        client.tls = TlsVerification::DangerAcceptInvalid;
    }

    if let Some(ref username) = global.username {
        let password = std::env::var("EMSTRACK_PASSWORD").map_err(|_| CliError::NoCredentials {
            profile: profile_name.into(),
        })?;
        client.username = Some(username.clone());
        client.password = Some(SecretString::from(password));
    }
    if let Ok(token) = std::env::var("EMSTRACK_API_TOKEN") {
        client.api_token = Some(SecretString::from(token));
    }

    Ok(client)
}

fn parse_url(field: &str, raw: &str) -> Result<url::Url, CliError> {
    raw.parse().map_err(|e| CliError::Validation {
        field: field.into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })
}
