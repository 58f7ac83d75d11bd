// ── Domain model ──

pub mod comment;
pub mod coordinate;
pub mod pin;
pub mod site;

pub use comment::{Comment, CommentId};
pub use coordinate::CoordinateKey;
pub use pin::{Pin, PinColor};
pub use site::{SiteKind, SiteRecord, SiteReport};
