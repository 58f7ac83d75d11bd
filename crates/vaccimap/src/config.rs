//! CLI-side configuration: global flag overrides on top of the shared
//! `vaccimap_config` profiles.
//!
//! Core never sees these types -- it receives a pre-built `ControllerConfig`.

use std::time::Duration;

use secrecy::SecretString;

use vaccimap_config::{Config, Defaults, Profile};
use vaccimap_core::ControllerConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use vaccimap_config::{config_path, load_config_or_default, save_config};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// List profile names for error help text.
pub fn available_profiles(config: &Config) -> String {
    if config.profiles.is_empty() {
        "(none)".into()
    } else {
        config
            .profiles
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Build a `ControllerConfig` from the config file, profile, and CLI overrides.
pub fn build_controller_config(global: &GlobalOpts) -> Result<ControllerConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    if let Some(profile) = cfg.profiles.get(&profile_name) {
        return resolve_profile(profile, &profile_name, &cfg.defaults, global);
    }

    // An explicitly requested profile must exist.
    if global.profile.is_some() {
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: available_profiles(&cfg),
        });
    }

    // No profile -- build from CLI flags / env vars alone.
    let url = global
        .database_url
        .as_deref()
        .ok_or_else(|| CliError::NoConfig {
            path: config_path().display().to_string(),
        })?;

    let mut config = ControllerConfig::new(vaccimap_config::parse_database_url(url)?);
    config.auth_token = global.auth_token.clone().map(SecretString::from);
    apply_timeouts(&mut config, &cfg.defaults, global);
    Ok(config)
}

/// Translate a profile + global flags into a `ControllerConfig`.
///
/// Flags win over the profile; the profile wins over `[defaults]`.
pub fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
    global: &GlobalOpts,
) -> Result<ControllerConfig, CliError> {
    let mut effective = profile.clone();
    if let Some(ref url) = global.database_url {
        effective.database_url.clone_from(url);
    }
    // A token flag bypasses the credential chain entirely.
    if global.auth_token.is_some() {
        effective.auth_required = false;
    }

    let mut config =
        vaccimap_config::profile_to_controller_config(&effective, profile_name, defaults)?;

    if let Some(ref token) = global.auth_token {
        config.auth_token = Some(SecretString::from(token.clone()));
    }
    if let Some(secs) = global.timeout {
        config.timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = global.sync_timeout {
        config.sync_timeout = Duration::from_secs(secs);
    }
    Ok(config)
}

fn apply_timeouts(config: &mut ControllerConfig, defaults: &Defaults, global: &GlobalOpts) {
    config.timeout = Duration::from_secs(global.timeout.unwrap_or(defaults.timeout));
    config.sync_timeout = Duration::from_secs(global.sync_timeout.unwrap_or(defaults.sync_timeout));
}
