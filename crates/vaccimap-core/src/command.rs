// ── Command API ──
//
// All writes flow through a unified `Command` enum. The controller's
// command processor executes them against the remote store; the local
// registry only changes when the change feed reports the result.

use crate::error::CoreError;
use crate::model::{Comment, CoordinateKey, SiteKind, SiteReport};

/// A command envelope sent through the command channel.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// All write operations against the database.
#[derive(Debug, Clone)]
pub enum Command {
    /// Create or overwrite a site, then attach the report's comment.
    ReportSite(SiteReport),
    /// Delete a site from its kind's collection.
    RemoveSite { kind: SiteKind, key: CoordinateKey },
    AddComment {
        kind: SiteKind,
        key: CoordinateKey,
        text: String,
    },
}

/// Result of a successfully executed command.
#[derive(Debug, Clone)]
pub enum CommandResult {
    Ok,
    Reported {
        key: CoordinateKey,
        /// The report's comment, when one was attached.
        comment: Option<Comment>,
    },
    Comment(Comment),
}
