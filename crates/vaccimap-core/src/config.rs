// ── Runtime connection configuration ──
//
// These types describe how to reach the database and how the controller
// behaves. They carry credential data but never touch disk; the CLI
// builds a `ControllerConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::model::SiteKind;

/// Names of the remote collections, one per site kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collections {
    pub testing: String,
    pub vaccination: String,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            testing: SiteKind::TestingSite.default_collection().into(),
            vaccination: SiteKind::VaccinationSite.default_collection().into(),
        }
    }
}

impl Collections {
    pub fn name(&self, kind: SiteKind) -> &str {
        match kind {
            SiteKind::TestingSite => &self.testing,
            SiteKind::VaccinationSite => &self.vaccination,
        }
    }
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// Built-in root store.
    #[default]
    SystemDefaults,
    /// Additionally trust a custom CA certificate file.
    CustomCa(PathBuf),
}

/// Configuration for one database connection.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Database URL (e.g. `https://project-default-rtdb.firebaseio.com`).
    pub database_url: Url,
    /// Auth token sent with every request, if the rules require one.
    pub auth_token: Option<SecretString>,
    pub collections: Collections,
    pub tls: TlsVerification,
    /// Request timeout for REST calls.
    pub timeout: Duration,
    /// How long one-shot callers wait for the initial replay.
    pub sync_timeout: Duration,
    /// Removing a site deletes its comments too.
    pub cascade_comments: bool,
}

impl ControllerConfig {
    pub fn new(database_url: Url) -> Self {
        Self {
            database_url,
            auth_token: None,
            collections: Collections::default(),
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            sync_timeout: Duration::from_secs(15),
            cascade_comments: true,
        }
    }
}
