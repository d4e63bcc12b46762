//! Type definitions for rally storage.

mod ids;
mod members;
mod sessions;
mod slots;
mod votes;

// Re-export all types from submodules
pub use ids::*;
pub use members::*;
pub use sessions::*;
pub use slots::*;
pub use votes::*;
