//! Persisted entities (§3). These are plain data carriers; validation of the
//! invariants named in §3/§8 lives at the store boundary (`codegraph-storage`)
//! where it can be enforced atomically against the database, not here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::enums::{EntryPointType, JobStatus, Language, ReferenceType, RepositoryStatus, SymbolKind};
use crate::ids::Id;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model_id: String,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    pub llm_config: Option<LlmConfig>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: Id,
    pub org_id: Id,
    pub name: String,
    pub description: Option<String>,
    pub root_path: String,
    pub status: RepositoryStatus,
    pub total_files: i64,
    pub parsed_files: i64,
    pub error_message: Option<String>,
    pub languages: Vec<String>,
    pub repo_tree: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Repository {
    /// `0` when `total_files` is `0`, otherwise the documented percentage in
    /// `[0,100]`.
    pub fn progress_percentage(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.parsed_files as f64 / self.total_files as f64) * 100.0
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub id: Id,
    pub repo_id: Id,
    pub relative_path: String,
    pub language: Language,
    pub content_hash: String,
    pub content: Option<String>,
    pub folder_structure: Option<serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub id: Id,
    pub file_id: Id,
    pub repo_id: Id,
    pub name: String,
    pub qualified_name: String,
    pub kind: SymbolKind,
    pub source_code: String,
    pub signature: Option<String>,
    pub parent_symbol_id: Option<Id>,
    pub extra_data: serde_json::Value,
    pub start_line: Option<i32>,
    pub end_line: Option<i32>,
    pub start_col: Option<i32>,
    pub end_col: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    pub id: Id,
    pub repo_id: Id,
    pub source_symbol_id: Id,
    pub target_symbol_id: Option<Id>,
    pub source_file_path: String,
    pub source_symbol_name: String,
    pub target_file_path: String,
    pub target_symbol_name: String,
    pub reference_type: ReferenceType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsingJob {
    pub id: Id,
    pub repo_id: Id,
    pub status: JobStatus,
    pub worker_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryPointCandidate {
    pub id: Id,
    pub repo_id: Id,
    pub symbol_id: Id,
    pub file_id: Id,
    pub entry_point_type: EntryPointType,
    pub framework: String,
    pub detection_pattern: String,
    pub entry_metadata: serde_json::Value,
    pub confidence_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmedEntryPoint {
    pub id: Id,
    pub repo_id: Id,
    pub symbol_id: Id,
    pub file_id: Id,
    pub entry_point_type: EntryPointType,
    pub framework: String,
    pub name: String,
    pub description: String,
    pub entry_metadata: serde_json::Value,
    pub ai_confidence: f64,
    pub ai_reasoning: Option<String>,
    pub detected_at: DateTime<Utc>,
    pub confirmed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(total: i64, parsed: i64) -> Repository {
        Repository {
            id: Id::new(),
            org_id: Id::new(),
            name: "r".into(),
            description: None,
            root_path: "/tmp/r".into(),
            status: RepositoryStatus::Parsing,
            total_files: total,
            parsed_files: parsed,
            error_message: None,
            languages: vec![],
            repo_tree: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn progress_percentage_is_zero_when_total_is_zero() {
        assert_eq!(repo(0, 0).progress_percentage(), 0.0);
    }

    #[test]
    fn progress_percentage_is_in_range() {
        let p = repo(4, 2).progress_percentage();
        assert!((0.0..=100.0).contains(&p));
        assert_eq!(p, 50.0);
    }
}
