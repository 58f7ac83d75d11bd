//! Config subcommand handlers.

use dialoguer::{Input, Select};

use vaccimap_config::{Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

const SETTABLE_KEYS: &str = "database_url, auth_token, auth_token_env, auth_required, \
                             testing_collection, vaccination_collection, ca_cert, timeout, \
                             sync_timeout, cascade_comments";

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn parse_field<T: std::str::FromStr>(field: &str, value: &str, expected: &str) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("must be {expected}"),
    })
}

/// Apply `key = value` to a profile.
fn set_profile_value(profile: &mut Profile, key: &str, value: String) -> Result<(), CliError> {
    match key {
        "database_url" | "database-url" | "url" => {
            vaccimap_config::parse_database_url(&value)?;
            profile.database_url = value;
        }
        "auth_token" | "auth-token" => profile.auth_token = Some(value),
        "auth_token_env" | "auth-token-env" => profile.auth_token_env = Some(value),
        "auth_required" | "auth-required" => {
            profile.auth_required = parse_field("auth_required", &value, "'true' or 'false'")?;
        }
        "testing_collection" | "testing-collection" => profile.testing_collection = Some(value),
        "vaccination_collection" | "vaccination-collection" => {
            profile.vaccination_collection = Some(value);
        }
        "ca_cert" | "ca-cert" => profile.ca_cert = Some(value.into()),
        "timeout" => {
            profile.timeout = Some(parse_field("timeout", &value, "a number (seconds)")?);
        }
        "sync_timeout" | "sync-timeout" => {
            profile.sync_timeout = Some(parse_field("sync_timeout", &value, "a number (seconds)")?);
        }
        "cascade_comments" | "cascade-comments" => {
            profile.cascade_comments =
                parse_field("cascade_comments", &value, "'true' or 'false'")?;
        }
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!("unknown config key '{other}'. Valid keys: {SETTABLE_KEYS}"),
            });
        }
    }
    Ok(())
}

fn require_profile<'a>(cfg: &'a Config, name: &str) -> Result<&'a Profile, CliError> {
    cfg.profiles
        .get(name)
        .ok_or_else(|| CliError::ProfileNotFound {
            name: name.into(),
            available: config::available_profiles(cfg),
        })
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let config_path = config::config_path();
            eprintln!("VacciMap configuration wizard");
            eprintln!("   Config path: {}\n", config_path.display());

            let profile_name: String = Input::new()
                .with_prompt("Profile name")
                .default("default".into())
                .interact_text()
                .map_err(prompt_err)?;

            let database_url: String = Input::new()
                .with_prompt("Database URL")
                .validate_with(|input: &String| {
                    vaccimap_config::parse_database_url(input)
                        .map(|_| ())
                        .map_err(|e| e.to_string())
                })
                .interact_text()
                .map_err(prompt_err)?;

            let mut profile = Profile::new(database_url);

            let auth_choices = &[
                "No token (public database rules)",
                "Store a token in the system keyring (recommended)",
                "Save a token to the config file (plaintext)",
            ];
            let auth_selection = Select::new()
                .with_prompt("Authentication")
                .items(auth_choices)
                .default(0)
                .interact()
                .map_err(prompt_err)?;

            if auth_selection > 0 {
                let token = rpassword::prompt_password("Auth token: ").map_err(prompt_err)?;
                if token.is_empty() {
                    return Err(CliError::Validation {
                        field: "auth_token".into(),
                        reason: "token cannot be empty".into(),
                    });
                }
                profile.auth_required = true;
                if auth_selection == 1 {
                    vaccimap_config::store_auth_token(&profile_name, &token)?;
                    eprintln!("   Token stored in system keyring");
                } else {
                    profile.auth_token = Some(token);
                }
            }

            let mut cfg = config::load_config_or_default();
            cfg.profiles.insert(profile_name.clone(), profile);
            cfg.default_profile = Some(profile_name.clone());
            config::save_config(&cfg)?;

            eprintln!("\nConfiguration written to {}", config_path.display());
            eprintln!("  Active profile: {profile_name}");
            eprintln!("\n  Test it: vaccimap sites list");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let out = output::render_single(
                &global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_else(|_| format!("{c:#?}")),
                |c| c.default_profile.clone().unwrap_or_default(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Set <key> <value> ───────────────────────────────────────
        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);

            let profile = cfg
                .profiles
                .entry(profile_name.clone())
                .or_insert_with(|| Profile::new(String::new()));
            set_profile_value(profile, &key, value)?;

            config::save_config(&cfg)?;
            eprintln!("Set {key} on profile '{profile_name}'");
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: vaccimap config init");
            } else {
                for name in cfg.profiles.keys() {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        // ── Use <name> ─────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            require_profile(&cfg, &name)?;

            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("Default profile set to '{name}'");
            Ok(())
        }

        // ── SetToken ────────────────────────────────────────────────
        ConfigCommand::SetToken { profile } => {
            let cfg = config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            require_profile(&cfg, &profile_name)?;

            let token = rpassword::prompt_password("Auth token: ").map_err(prompt_err)?;
            if token.is_empty() {
                return Err(CliError::Validation {
                    field: "auth_token".into(),
                    reason: "token cannot be empty".into(),
                });
            }

            vaccimap_config::store_auth_token(&profile_name, &token)?;
            eprintln!("Token stored in system keyring for profile '{profile_name}'");
            Ok(())
        }

        // ── RemoveToken ─────────────────────────────────────────────
        ConfigCommand::RemoveToken { profile } => {
            let cfg = config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));

            vaccimap_config::delete_auth_token(&profile_name)?;
            eprintln!("Token removed from system keyring for profile '{profile_name}'");
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn set_updates_profile_fields() {
        let mut profile = Profile::new("https://a.example.com");
        set_profile_value(&mut profile, "database-url", "https://b.example.com".into()).unwrap();
        set_profile_value(&mut profile, "cascade_comments", "false".into()).unwrap();
        set_profile_value(&mut profile, "sync-timeout", "5".into()).unwrap();

        assert_eq!(profile.database_url, "https://b.example.com");
        assert!(!profile.cascade_comments);
        assert_eq!(profile.sync_timeout, Some(5));
    }

    #[test]
    fn set_rejects_bad_values() {
        let mut profile = Profile::new("https://a.example.com");
        assert!(set_profile_value(&mut profile, "timeout", "soon".into()).is_err());
        assert!(set_profile_value(&mut profile, "database_url", "nope".into()).is_err());
        assert!(set_profile_value(&mut profile, "colour", "red".into()).is_err());
        assert_eq!(profile.database_url, "https://a.example.com");
    }
}
