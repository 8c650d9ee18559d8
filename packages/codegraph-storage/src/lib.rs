//! Postgres-backed persistence for the core entities of §3: organizations,
//! repositories, files, symbols, references, parsing jobs, entry points, and
//! flows (C4).
//!
//! The store is one connection-pooled struct (`PostgresStore`) with its
//! operations split across modules by entity, mirroring the repository-per-
//! entity layout this system's distillation source uses (`JobRepository`,
//! `SymbolRepository`, ...).

pub mod entry_points;
pub mod files;
pub mod flows;
pub mod graph;
pub mod jobs;
pub mod organizations;
pub mod repositories;
pub mod rows;
pub mod store;
pub mod symbols;

pub use store::PostgresStore;
