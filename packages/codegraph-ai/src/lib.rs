//! LLM-mediated entry-point detection and flow synthesis (C8/C9/C10, §4.8-§4.10).

pub mod entry_point_service;
pub mod flow_service;
pub mod llm_client;

pub use entry_point_service::{EntryPointDetectionStats, EntryPointService};
pub use flow_service::FlowService;
pub use llm_client::{LlmClient, LlmClientConfig};
