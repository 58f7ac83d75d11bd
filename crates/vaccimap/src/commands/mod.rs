//! Command dispatch: bridges CLI args -> core Commands -> output formatting.

pub mod comments;
pub mod config_cmd;
pub mod key;
pub mod sites;
pub mod util;
pub mod watch;

use std::sync::Arc;

use vaccimap_core::{Controller, ControllerConfig, CoreError, RealtimeStore, RemoteStore};

use crate::cli::{Command, GlobalOpts};
use crate::config;
use crate::error::CliError;

/// Everything a database-bound command needs: where to connect and the
/// store to connect through.
pub struct Session {
    pub config: ControllerConfig,
    pub store: Arc<dyn RemoteStore>,
}

impl Session {
    /// Resolve the session from flags and config, or the demo store with
    /// `--offline`.
    pub fn open(global: &GlobalOpts) -> Result<Self, CliError> {
        if global.offline {
            return util::offline_session();
        }
        let config = config::build_controller_config(global)?;
        let store = RealtimeStore::from_config(&config)?;
        Ok(Self {
            config,
            store: Arc::new(store),
        })
    }

    /// Connect, wait for the initial replay, run `f`, disconnect.
    pub async fn oneshot<F, Fut, T>(self, f: F) -> Result<T, CliError>
    where
        F: FnOnce(Controller) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        Ok(Controller::oneshot(self.config, self.store, f).await?)
    }
}

/// Dispatch a database-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, session: Session, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Sites(args) => sites::handle(session, args, global).await,
        Command::Comments(args) => comments::handle(session, args, global).await,
        Command::Watch(args) => watch::handle(session, args, global).await,
        // Handled before dispatch
        Command::Key(_) | Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
