//! Domain layer: the entities of §3 and the closed sum types they're built
//! from. No persistence or I/O lives here — see `codegraph-storage`.

pub mod entities;
pub mod enums;
pub mod flow;

pub use entities::{
    ConfirmedEntryPoint, EntryPointCandidate, File, LlmConfig, Organization, ParsingJob,
    Reference, Repository, Symbol,
};
pub use enums::{EntryPointType, JobStatus, Language, ReferenceType, RepositoryStatus, SymbolKind};
pub use flow::{CodeSnippet, EntryPointFlow, FlowStep, LineRange};
