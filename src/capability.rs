//! Capability catalog of the downstream API: document model, sources, and the TTL cache.

pub mod cache;
pub mod catalog;
pub mod source;

pub use cache::*;
pub use catalog::*;
pub use source::*;
