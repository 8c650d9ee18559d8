//! Shared domain model, error taxonomy, identifiers, and configuration for
//! the codegraph workspace. Every other crate depends on this one; it
//! depends on nothing else in the workspace.

pub mod config;
pub mod domain;
pub mod error;
pub mod ids;

pub use config::Settings;
pub use error::{CodegraphError, Result};
pub use ids::Id;
