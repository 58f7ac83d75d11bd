// vaccimap-api: Async Rust client for the realtime database (REST + event stream)

pub mod client;
pub mod error;
pub mod models;
pub mod stream;
pub mod transport;

pub use client::RealtimeClient;
pub use error::Error;
pub use models::{PushResponse, StreamEvent};
pub use stream::{EventStream, ReconnectConfig};
pub use transport::{TlsMode, TransportConfig};
