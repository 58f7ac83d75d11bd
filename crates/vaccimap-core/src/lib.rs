//! Location sync core for VacciMap.
//!
//! This crate owns the identity model and the reactive site registry that
//! sits between the realtime database and any front end:
//!
//! - **[`CoordinateKey`]** -- Storage identity of a site. A coordinate pair
//!   rounded half away from zero to three decimals, with `.` replaced by
//!   `_` so it is a valid database key. Equal after rounding means the
//!   same site.
//!
//! - **[`FeedListener`]** -- One subscription per collection, each folded
//!   into added/changed/removed child events and applied by a single
//!   writer task. Events from a revoked subscription never reach the
//!   registry.
//!
//! - **[`SiteRegistry`]** -- Lock-free reactive storage built on
//!   `DashMap` + `tokio::sync::watch`. Vends [`SiteStream`] handles for
//!   reactive rendering.
//!
//! - **[`Controller`]** -- Facade managing the session lifecycle.
//!   Writes go through [`Command`]s to a command processor task; the
//!   registry only changes when the change feed reports the result.
//!
//! - **[`RemoteStore`]** -- The database seen in domain terms, backed by
//!   the hosted database ([`RealtimeStore`]) or kept in process
//!   ([`MemoryStore`]).

pub mod backend;
pub mod command;
pub mod comments;
pub mod config;
pub mod controller;
pub mod convert;
pub mod error;
pub mod feed;
pub mod model;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use backend::{MemoryStore, RealtimeStore, RemoteStore};
pub use command::{Command, CommandResult};
pub use config::{Collections, ControllerConfig, TlsVerification};
pub use controller::{ConnectionState, Controller};
pub use error::CoreError;
pub use feed::{ChildEvent, FeedEvent, FeedListener};
pub use store::SiteRegistry;
pub use stream::{SiteFilter, SiteStream};

pub use model::{Comment, CommentId, CoordinateKey, Pin, PinColor, SiteKind, SiteRecord, SiteReport};
