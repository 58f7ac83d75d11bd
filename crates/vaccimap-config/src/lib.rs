//! Shared configuration for VacciMap tools.
//!
//! TOML profiles, auth-token resolution (env + keyring + plaintext),
//! and translation to `vaccimap_core::ControllerConfig`. The CLI adds
//! flag-aware wrappers on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use vaccimap_core::{Collections, ControllerConfig, SiteKind, TlsVerification};

/// Keyring service name shared by every profile.
pub const KEYRING_SERVICE: &str = "vaccimap";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' requires an auth token but none is configured")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named database profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// The profile a command runs against: `requested`, else the
    /// configured default.
    pub fn profile(&self, requested: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = requested
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, p)| (k.as_str(), p))
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Seconds to wait for the initial replay of both collections.
    #[serde(default = "default_sync_timeout")]
    pub sync_timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            sync_timeout: default_sync_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_sync_timeout() -> u64 {
    15
}
fn default_cascade() -> bool {
    true
}

/// A named database profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Database URL (e.g., "https://vaccimap-default-rtdb.firebaseio.com").
    pub database_url: String,

    /// Auth token (plaintext -- prefer keyring or env var).
    pub auth_token: Option<String>,

    /// Environment variable name containing the auth token.
    pub auth_token_env: Option<String>,

    /// Fail instead of connecting anonymously when no token resolves.
    #[serde(default)]
    pub auth_required: bool,

    pub testing_collection: Option<String>,
    pub vaccination_collection: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override request timeout.
    pub timeout: Option<u64>,

    /// Override initial replay timeout.
    pub sync_timeout: Option<u64>,

    /// Removing a site deletes its comments too.
    #[serde(default = "default_cascade")]
    pub cascade_comments: bool,
}

impl Profile {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            auth_token: None,
            auth_token_env: None,
            auth_required: false,
            testing_collection: None,
            vaccination_collection: None,
            ca_cert: None,
            timeout: None,
            sync_timeout: None,
            cascade_comments: true,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "vaccimap", "vaccimap").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("vaccimap");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment.
///
/// `VACCIMAP_` variables override file values; nested keys use a double
/// underscore (`VACCIMAP_DEFAULTS__TIMEOUT=5`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("VACCIMAP_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{profile_name}/auth-token"),
    )?)
}

/// Store a profile's auth token in the system keyring.
pub fn store_auth_token(profile_name: &str, token: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(token)?;
    Ok(())
}

/// Remove a profile's auth token from the system keyring.
pub fn delete_auth_token(profile_name: &str) -> Result<(), ConfigError> {
    match keyring_entry(profile_name)?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Resolve an auth token from the credential chain (no CLI flag step).
///
/// `Ok(None)` means the profile connects anonymously.
pub fn resolve_auth_token(
    profile: &Profile,
    profile_name: &str,
) -> Result<Option<SecretString>, ConfigError> {
    // 1. Profile's auth_token_env → env var lookup
    if let Some(val) = profile
        .auth_token_env
        .as_deref()
        .and_then(|name| std::env::var(name).ok())
    {
        return Ok(Some(SecretString::from(val)));
    }

    // 2. System keyring
    if let Some(secret) = keyring_entry(profile_name)
        .ok()
        .and_then(|entry| entry.get_password().ok())
    {
        return Ok(Some(SecretString::from(secret)));
    }

    // 3. Plaintext in config
    if let Some(ref token) = profile.auth_token {
        return Ok(Some(SecretString::from(token.clone())));
    }

    if profile.auth_required {
        return Err(ConfigError::NoCredentials {
            profile: profile_name.into(),
        });
    }
    Ok(None)
}

// ── Translation ─────────────────────────────────────────────────────

/// Parse and validate a profile's database URL.
pub fn parse_database_url(raw: &str) -> Result<url::Url, ConfigError> {
    let url: url::Url = raw.parse().map_err(|_| ConfigError::Validation {
        field: "database_url".into(),
        reason: format!("invalid URL: {raw}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: "database_url".into(),
            reason: format!("expected an http(s) URL, got '{}'", url.scheme()),
        });
    }
    Ok(url)
}

/// Collection names for a profile, falling back to the standard ones.
pub fn profile_collections(profile: &Profile) -> Collections {
    Collections {
        testing: profile
            .testing_collection
            .clone()
            .unwrap_or_else(|| SiteKind::TestingSite.default_collection().into()),
        vaccination: profile
            .vaccination_collection
            .clone()
            .unwrap_or_else(|| SiteKind::VaccinationSite.default_collection().into()),
    }
}

/// Build a `ControllerConfig` from a profile -- no CLI flag overrides.
pub fn profile_to_controller_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ControllerConfig, ConfigError> {
    let database_url = parse_database_url(&profile.database_url)?;
    let auth_token = resolve_auth_token(profile, profile_name)?;

    let tls = profile
        .ca_cert
        .clone()
        .map_or(TlsVerification::SystemDefaults, TlsVerification::CustomCa);

    Ok(ControllerConfig {
        database_url,
        auth_token,
        collections: profile_collections(profile),
        tls,
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
        sync_timeout: Duration::from_secs(profile.sync_timeout.unwrap_or(defaults.sync_timeout)),
        cascade_comments: profile.cascade_comments,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn write(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert_eq!(cfg.defaults.output, "table");
        assert_eq!(cfg.defaults.sync_timeout, 15);
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn profile_fields_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"
default_profile = "staging"

[defaults]
timeout = 10

[profiles.staging]
database_url = "https://vaccimap-staging.firebaseio.com"
auth_token = "plain-token"
testing_collection = "Staging Testing Sites"
cascade_comments = false
"#,
        );

        let cfg = load_config_from(&path).unwrap();
        let (name, profile) = cfg.profile(None).unwrap();
        assert_eq!(name, "staging");
        assert!(!profile.cascade_comments);

        let controller = profile_to_controller_config(profile, name, &cfg.defaults).unwrap();
        assert_eq!(
            controller.database_url.as_str(),
            "https://vaccimap-staging.firebaseio.com/"
        );
        assert_eq!(controller.collections.testing, "Staging Testing Sites");
        assert_eq!(controller.collections.vaccination, "Vaccination Sites");
        assert_eq!(controller.timeout, Duration::from_secs(10));
        assert_eq!(controller.sync_timeout, Duration::from_secs(15));
        assert_eq!(controller.tls, TlsVerification::SystemDefaults);
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let cfg = Config::default();
        let err = cfg.profile(Some("prod")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProfile { name } if name == "prod"));
    }

    #[test]
    fn bad_database_url_is_rejected() {
        assert!(parse_database_url("not a url").is_err());
        assert!(parse_database_url("ftp://example.com").is_err());
        assert!(parse_database_url("https://example.com").is_ok());
    }

    #[test]
    fn plaintext_token_resolves_last() {
        let mut profile = Profile::new("https://example.com");
        profile.auth_token = Some("from-file".into());
        // An unset variable falls through to the plaintext token.
        profile.auth_token_env = Some("VACCIMAP_TEST_TOKEN_THAT_IS_NEVER_SET".into());

        let token = resolve_auth_token(&profile, "vaccimap-test-no-keyring")
            .unwrap()
            .unwrap();
        assert_eq!(token.expose_secret(), "from-file");
    }

    #[test]
    fn required_token_must_resolve() {
        let mut profile = Profile::new("https://example.com");
        profile.auth_required = true;
        let err = resolve_auth_token(&profile, "vaccimap-test-no-keyring").unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { .. }));

        profile.auth_required = false;
        assert!(
            resolve_auth_token(&profile, "vaccimap-test-no-keyring")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        let mut profile = Profile::new("https://vaccimap.firebaseio.com");
        profile.ca_cert = Some(PathBuf::from("/etc/ssl/vaccimap.pem"));
        cfg.profiles.insert("default".into(), profile);
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        let (_, profile) = loaded.profile(None).unwrap();
        let controller = profile_to_controller_config(profile, "default", &loaded.defaults).unwrap();
        assert_eq!(
            controller.tls,
            TlsVerification::CustomCa(PathBuf::from("/etc/ssl/vaccimap.pem"))
        );
        assert!(controller.cascade_comments);
    }
}
