//! Entry-point flow documents (§3, §4.9).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CodegraphError, Result};
use crate::ids::Id;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineRange {
    pub start: i32,
    pub end: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSnippet {
    pub code: String,
    pub symbol_name: String,
    pub qualified_name: String,
    pub file_path: String,
    pub line_range: Option<LineRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowStep {
    pub step_number: u32,
    pub title: String,
    pub description: String,
    pub file_path: String,
    pub important_log_lines: Vec<String>,
    pub important_code_snippets: Vec<CodeSnippet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryPointFlow {
    pub id: Id,
    pub entry_point_id: Id,
    pub repo_id: Id,
    pub flow_name: String,
    pub technical_summary: String,
    pub file_paths: Vec<String>,
    pub steps: Vec<FlowStep>,
    pub max_depth_analyzed: i32,
    pub iterations_completed: u32,
    pub symbol_ids_analyzed: Vec<Id>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntryPointFlow {
    /// Validates the two invariants in §8: at least one step, and
    /// `iterations_completed` within `[1,4]`.
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(CodegraphError::input_invalid(
                "a flow must have at least one step",
            ));
        }
        if !(1..=4).contains(&self.iterations_completed) {
            return Err(CodegraphError::input_invalid(
                "iterations_completed must be in [1,4]",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step() -> FlowStep {
        FlowStep {
            step_number: 1,
            title: "t".into(),
            description: "d".into(),
            file_path: "a.py".into(),
            important_log_lines: vec![],
            important_code_snippets: vec![],
        }
    }

    fn flow(steps: Vec<FlowStep>, iterations: u32) -> EntryPointFlow {
        EntryPointFlow {
            id: Id::new(),
            entry_point_id: Id::new(),
            repo_id: Id::new(),
            flow_name: "f".into(),
            technical_summary: "s".into(),
            file_paths: vec![],
            steps,
            max_depth_analyzed: 0,
            iterations_completed: iterations,
            symbol_ids_analyzed: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn rejects_empty_steps() {
        assert!(flow(vec![], 1).validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_iterations() {
        assert!(flow(vec![step()], 5).validate().is_err());
        assert!(flow(vec![step()], 0).validate().is_err());
    }

    #[test]
    fn accepts_valid_flow() {
        assert!(flow(vec![step()], 3).validate().is_ok());
    }
}
