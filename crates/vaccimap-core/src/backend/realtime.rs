// ── Realtime database backend ──
//
// REST writes through `RealtimeClient`, change feed through `EventStream`
// folded into child events by a `ChildTracker`.

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use vaccimap_api::{EventStream, RealtimeClient, ReconnectConfig, TlsMode, TransportConfig};

use super::{FEED_CHANNEL_SIZE, RemoteStore, StoreFuture};
use crate::config::{Collections, ControllerConfig, TlsVerification};
use crate::convert::{decode_comments, encode_site_data, keys};
use crate::error::CoreError;
use crate::feed::{ChildTracker, FeedEvent};
use crate::model::{Comment, CommentId, CoordinateKey, SiteKind, SiteRecord};

/// [`RemoteStore`] backed by the hosted realtime database.
#[derive(Clone)]
pub struct RealtimeStore {
    client: RealtimeClient,
    collections: Collections,
    reconnect: ReconnectConfig,
}

impl RealtimeStore {
    pub fn new(client: RealtimeClient, collections: Collections) -> Self {
        Self {
            client,
            collections,
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Build a store for the database described by `config`.
    pub fn from_config(config: &ControllerConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig {
            tls: match &config.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            },
            timeout: config.timeout,
            ..TransportConfig::default()
        };
        let client = RealtimeClient::new(
            config.database_url.clone(),
            config.auth_token.clone(),
            &transport,
        )?;
        Ok(Self::new(client, config.collections.clone()))
    }

    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn client(&self) -> &RealtimeClient {
        &self.client
    }

    fn collection(&self, kind: SiteKind) -> &str {
        self.collections.name(kind)
    }
}

impl RemoteStore for RealtimeStore {
    fn listen(
        &self,
        kind: SiteKind,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<FeedEvent>, CoreError> {
        let collection = self.collection(kind).to_owned();
        let (tx, rx) = mpsc::channel(FEED_CHANNEL_SIZE);

        let mut stream = EventStream::connect(
            self.client.clone(),
            vec![collection.clone()],
            self.reconnect.clone(),
            cancel.clone(),
        );

        tokio::spawn(async move {
            let mut tracker = ChildTracker::new();
            'outer: loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    event = stream.recv() => {
                        let Some(event) = event else {
                            warn!(%collection, "event stream closed");
                            break;
                        };
                        for feed_event in tracker.apply(event) {
                            if tx.send(feed_event).await.is_err() {
                                break 'outer;
                            }
                        }
                    }
                }
            }
            stream.shutdown();
            debug!(%collection, "collection feed stopped");
        });

        Ok(rx)
    }

    fn write_site<'a>(&'a self, record: &'a SiteRecord) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let path = [
                self.collection(record.collection),
                record.coordinate_key.as_str(),
                keys::SITE_DATA,
            ];
            self.client
                .put(&path, &encode_site_data(record))
                .await
                .map_err(|e| CoreError::from(e).into_write_failure())
        })
    }

    fn delete_site<'a>(&'a self, kind: SiteKind, key: &'a CoordinateKey) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.client
                .delete(&[self.collection(kind), key.as_str()])
                .await
                .map_err(|e| CoreError::from(e).into_write_failure())
        })
    }

    fn delete_site_data<'a>(
        &'a self,
        kind: SiteKind,
        key: &'a CoordinateKey,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.client
                .delete(&[self.collection(kind), key.as_str(), keys::SITE_DATA])
                .await
                .map_err(|e| CoreError::from(e).into_write_failure())
        })
    }

    fn push_comment<'a>(
        &'a self,
        kind: SiteKind,
        key: &'a CoordinateKey,
        text: &'a str,
    ) -> StoreFuture<'a, CommentId> {
        Box::pin(async move {
            self.client
                .push(&[self.collection(kind), key.as_str(), keys::COMMENTS], &text)
                .await
                .map(CommentId::new)
                .map_err(|e| CoreError::from(e).into_write_failure())
        })
    }

    fn read_comments<'a>(
        &'a self,
        kind: SiteKind,
        key: &'a CoordinateKey,
    ) -> StoreFuture<'a, Vec<Comment>> {
        Box::pin(async move {
            let raw: Option<Value> = self
                .client
                .get(&[self.collection(kind), key.as_str(), keys::COMMENTS])
                .await?;
            Ok(decode_comments(raw))
        })
    }
}
