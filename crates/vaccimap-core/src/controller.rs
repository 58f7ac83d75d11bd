// ── Controller abstraction ──
//
// Lifecycle management for one database session: change-feed
// subscriptions, command routing, and reactive access to the registry.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{RealtimeStore, RemoteStore};
use crate::command::{Command, CommandEnvelope, CommandResult};
use crate::comments;
use crate::config::ControllerConfig;
use crate::error::CoreError;
use crate::feed::FeedListener;
use crate::model::{Comment, CoordinateKey, Pin, SiteKind, SiteRecord};
use crate::store::SiteRegistry;
use crate::stream::SiteStream;

const COMMAND_CHANNEL_SIZE: usize = 64;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

// ── Controller ───────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Owns the remote store,
/// the site registry, the feed listener, and the command channel.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    store: Arc<dyn RemoteStore>,
    registry: Arc<SiteRegistry>,
    listener: Mutex<Option<Arc<FeedListener>>>,
    connection_state: watch::Sender<ConnectionState>,
    command_tx: mpsc::Sender<CommandEnvelope>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Controller {
    /// Create a controller over any remote store. Does NOT connect --
    /// call [`connect()`](Self::connect) to subscribe and start background tasks.
    pub fn new(config: ControllerConfig, store: Arc<dyn RemoteStore>) -> Self {
        // State changes go through `send_replace`, which stores the value
        // even while nobody holds a receiver.
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);

        Self {
            inner: Arc::new(ControllerInner {
                config,
                store,
                registry: Arc::new(SiteRegistry::new()),
                listener: Mutex::new(None),
                connection_state,
                command_tx,
                command_rx: Mutex::new(Some(command_rx)),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Create a controller for the hosted database described by `config`.
    pub fn realtime(config: ControllerConfig) -> Result<Self, CoreError> {
        let store = RealtimeStore::from_config(&config)?;
        Ok(Self::new(config, Arc::new(store)))
    }

    /// Access the controller configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    /// Access the underlying site registry.
    pub fn registry(&self) -> &Arc<SiteRegistry> {
        &self.inner.registry
    }

    /// Access the remote store.
    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.inner.store
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Subscribe to both collections and start the command processor.
    pub async fn connect(&self) -> Result<(), CoreError> {
        self.inner
            .connection_state
            .send_replace(ConnectionState::Connecting);

        let listener = Arc::new(FeedListener::new(
            Arc::clone(&self.inner.store),
            Arc::clone(&self.inner.registry),
            self.inner.cancel.child_token(),
        ));

        if let Err(e) = subscribe_all(&listener) {
            listener.shutdown().await;
            self.inner.connection_state.send_replace(ConnectionState::Failed);
            return Err(e);
        }
        *self.inner.listener.lock().await = Some(listener);

        let mut handles = self.inner.task_handles.lock().await;
        if let Some(rx) = self.inner.command_rx.lock().await.take() {
            let ctrl = self.clone();
            handles.push(tokio::spawn(command_processor_task(ctrl, rx)));
        }

        self.inner
            .connection_state
            .send_replace(ConnectionState::Connected);
        info!(url = %self.inner.config.database_url, "connected to database");
        Ok(())
    }

    /// Stop all subscriptions and background tasks.
    pub async fn disconnect(&self) {
        self.inner.cancel.cancel();

        if let Some(listener) = self.inner.listener.lock().await.take() {
            listener.shutdown().await;
        }

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        self.inner
            .connection_state
            .send_replace(ConnectionState::Disconnected);
        debug!("disconnected");
    }

    /// Start a fresh listening session: revoke both subscriptions, clear
    /// the registry, and subscribe again. Used when the app returns to
    /// the foreground.
    pub async fn restart_session(&self) -> Result<(), CoreError> {
        let guard = self.inner.listener.lock().await;
        let listener = guard.as_ref().ok_or(CoreError::Disconnected)?;

        listener.reset().await?;
        subscribe_all(listener)?;
        info!("listening session restarted");
        Ok(())
    }

    /// Wait until both collections delivered their initial replay.
    pub async fn wait_for_sync(&self, timeout: Duration) -> Result<(), CoreError> {
        self.inner
            .registry
            .wait_synced(&SiteKind::ALL, timeout)
            .await
    }

    // ── Command execution ────────────────────────────────────────

    /// Execute a command against the database.
    ///
    /// Sends the command through the internal channel to the command
    /// processor task and awaits the result.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        if *self.inner.connection_state.borrow() != ConnectionState::Connected {
            return Err(CoreError::Disconnected);
        }

        let (tx, rx) = tokio::sync::oneshot::channel();

        self.inner
            .command_tx
            .send(CommandEnvelope {
                command: cmd,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::Disconnected)?;

        rx.await.map_err(|_| CoreError::Disconnected)?
    }

    /// Read a site's comments once, oldest first.
    pub async fn comments(
        &self,
        kind: SiteKind,
        key: &CoordinateKey,
    ) -> Result<Vec<Comment>, CoreError> {
        comments::comments(self.inner.store.as_ref(), kind, key).await
    }

    // ── One-shot convenience ─────────────────────────────────────

    /// One-shot: connect, wait for the initial replay, run closure,
    /// disconnect.
    pub async fn oneshot<F, Fut, T>(
        config: ControllerConfig,
        store: Arc<dyn RemoteStore>,
        f: F,
    ) -> Result<T, CoreError>
    where
        F: FnOnce(Controller) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let sync_timeout = config.sync_timeout;
        let controller = Controller::new(config, store);
        controller.connect().await?;

        let result = match controller.wait_for_sync(sync_timeout).await {
            Ok(()) => f(controller.clone()).await,
            Err(e) => Err(e),
        };
        controller.disconnect().await;
        result
    }

    // ── State observation ────────────────────────────────────────

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    // ── Registry accessors ───────────────────────────────────────

    pub fn sites_snapshot(&self) -> Arc<Vec<Arc<SiteRecord>>> {
        self.inner.registry.snapshot()
    }

    pub fn sites(&self) -> SiteStream {
        self.inner.registry.subscribe()
    }

    pub fn pins(&self) -> Vec<Pin> {
        self.inner.registry.pins()
    }

    pub fn site(&self, key: &CoordinateKey) -> Option<Arc<SiteRecord>> {
        self.inner.registry.get(key)
    }

    /// Like [`site`](Self::site), but a missing key is an error.
    pub fn require_site(&self, key: &CoordinateKey) -> Result<Arc<SiteRecord>, CoreError> {
        self.site(key).ok_or_else(|| CoreError::SiteNotFound {
            key: key.display(),
        })
    }

    pub fn synced(&self, kind: SiteKind) -> bool {
        self.inner.registry.synced(kind)
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Process commands from the mpsc channel one at a time.
async fn command_processor_task(controller: Controller, mut rx: mpsc::Receiver<CommandEnvelope>) {
    let cancel = controller.inner.cancel.clone();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let result = route_command(&controller, envelope.command).await;
                if let Err(ref e) = result {
                    warn!(error = %e, "command failed");
                }
                let _ = envelope.response_tx.send(result);
            }
        }
    }
}

// ── Command routing ──────────────────────────────────────────────

async fn route_command(controller: &Controller, cmd: Command) -> Result<CommandResult, CoreError> {
    let store = controller.inner.store.as_ref();

    match cmd {
        Command::ReportSite(report) => {
            let record = report.to_record()?;
            store.write_site(&record).await?;
            debug!(key = %record.coordinate_key, kind = %record.kind, "site reported");

            // Comments follow only a stored site.
            let comment = match report.comment.as_deref().map(str::trim) {
                Some(text) if !text.is_empty() => Some(
                    comments::add_comment(store, record.collection, &record.coordinate_key, text)
                        .await?,
                ),
                _ => None,
            };

            Ok(CommandResult::Reported {
                key: record.coordinate_key,
                comment,
            })
        }

        Command::RemoveSite { kind, key } => {
            if controller.inner.config.cascade_comments {
                store.delete_site(kind, &key).await?;
            } else {
                store.delete_site_data(kind, &key).await?;
            }
            debug!(%key, ?kind, "site removed");
            Ok(CommandResult::Ok)
        }

        Command::AddComment { kind, key, text } => {
            let comment = comments::add_comment(store, kind, &key, &text).await?;
            Ok(CommandResult::Comment(comment))
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn subscribe_all(listener: &FeedListener) -> Result<(), CoreError> {
    for kind in SiteKind::ALL {
        listener.subscribe(kind)?;
    }
    Ok(())
}
