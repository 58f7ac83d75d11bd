// ── Reactive storage ──

mod collection;
mod registry;

pub use registry::SiteRegistry;
