//! Entry-point detection (C8, §4.8). Two-phase, LLM-mediated: the LLM first
//! proposes file paths likely to hold entry points from the repo tree, then
//! confirms entry points per file in small batches, persisting after each
//! batch so a crash mid-detection keeps whatever was already confirmed.

use std::collections::BTreeSet;
use std::sync::Arc;

use codegraph_core::domain::{ConfirmedEntryPoint, EntryPointType, File, Repository, Symbol};
use codegraph_core::{CodegraphError, Id, Result, Settings};
use codegraph_storage::PostgresStore;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::llm_client::{LlmClient, LlmClientConfig};

const MIN_CONFIDENCE: f64 = 0.7;

/// Path-substring keyword table (§4.8) mapping a recognized keyword to the
/// framework label it implies.
const FRAMEWORK_KEYWORDS: &[(&str, &str)] = &[
    ("flask", "flask"),
    ("fastapi", "fastapi"),
    ("django", "django"),
    ("spring", "spring-boot"),
    ("camel", "apache-camel"),
    ("ktor", "ktor"),
    ("express", "express"),
    ("koa", "koa"),
    ("nestjs", "nestjs"),
    ("quartz", "quartz"),
    ("cron", "cron"),
    ("scheduler", "scheduler"),
    ("kafka", "kafka"),
    ("rabbitmq", "rabbitmq"),
    ("sqs", "sqs"),
];

fn infer_framework(file_path: &str) -> String {
    let lower = file_path.to_lowercase();
    for (keyword, framework) in FRAMEWORK_KEYWORDS {
        if lower.contains(keyword) {
            return (*framework).to_string();
        }
    }
    "unknown".to_string()
}

fn parse_entry_point_type(raw: &str) -> EntryPointType {
    match raw.to_lowercase().as_str() {
        "event" => EntryPointType::Event,
        "scheduler" => EntryPointType::Scheduler,
        _ => EntryPointType::Http,
    }
}

pub struct EntryPointDetectionStats {
    pub entry_points_confirmed: usize,
    pub frameworks_detected: Vec<String>,
}

#[derive(Deserialize)]
struct SuggestedPathsResponse {
    #[serde(default)]
    file_paths: Vec<String>,
}

#[derive(Deserialize)]
struct ConfirmationRecord {
    symbol_name: String,
    #[serde(default)]
    qualified_name: Option<String>,
    #[serde(rename = "type")]
    entry_type: String,
    name: String,
    description: String,
    confidence: f64,
    #[serde(default)]
    reasoning: Option<String>,
}

#[derive(Deserialize)]
struct ConfirmationResponse {
    #[serde(default)]
    entry_points: Vec<ConfirmationRecord>,
}

#[derive(Deserialize)]
struct DescriptionResponse {
    #[serde(default)]
    description: Option<String>,
}

pub struct EntryPointService {
    store: Arc<PostgresStore>,
    settings: Settings,
}

impl EntryPointService {
    pub fn new(store: Arc<PostgresStore>, settings: Settings) -> Self {
        Self { store, settings }
    }

    pub async fn detect_entry_points(
        &self,
        repo_id: Id,
        force_redetect: bool,
    ) -> Result<EntryPointDetectionStats> {
        let repo = self.store.get_repository(repo_id).await?;
        let org = self.store.get_organization(repo.org_id).await?;
        let llm = LlmClient::new(LlmClientConfig::resolve(&self.settings, org.llm_config.as_ref()))?;

        if force_redetect {
            self.store.clear_entry_points(repo_id).await?;
        }

        let files = self.store.list_files(repo_id).await?;
        info!(repo_id = %repo_id, file_count = files.len(), "entry_point_detection_started");

        if repo.repo_tree.is_null() || repo.repo_tree == json!({}) {
            warn!(repo_id = %repo_id, "no_repo_tree");
            return Ok(EntryPointDetectionStats {
                entry_points_confirmed: 0,
                frameworks_detected: vec![],
            });
        }

        let suggested_paths: BTreeSet<String> = self.suggest_file_paths(&llm, &repo).await?.into_iter().collect();
        info!(repo_id = %repo_id, suggested = suggested_paths.len(), "step1_ai_file_paths_complete");

        let mut files_to_analyze: Vec<&File> =
            files.iter().filter(|f| suggested_paths.contains(&f.relative_path)).collect();

        if files_to_analyze.len() > self.settings.entry_point_file_cap {
            warn!(
                total = files_to_analyze.len(),
                cap = self.settings.entry_point_file_cap,
                "too_many_files_for_ai"
            );
            files_to_analyze.truncate(self.settings.entry_point_file_cap);
        }

        info!(
            repo_id = %repo_id,
            ai_suggested_paths = suggested_paths.len(),
            files_to_analyze = files_to_analyze.len(),
            "files_selected_for_analysis"
        );

        if files_to_analyze.is_empty() {
            warn!(repo_id = %repo_id, "no_files_to_analyze");
            return Ok(EntryPointDetectionStats {
                entry_points_confirmed: 0,
                frameworks_detected: vec![],
            });
        }

        let mut confirmed_total: Vec<ConfirmedEntryPoint> = Vec::new();

        for (batch_index, batch) in files_to_analyze.chunks(self.settings.entry_point_batch_size).enumerate() {
            let mut batch_confirmed = Vec::new();

            for file in batch {
                let symbols = self.store.list_symbols_in_file(file.id).await?;
                if symbols.is_empty() {
                    continue;
                }

                match self.confirm_file(&llm, file, &symbols).await {
                    Ok(records) => batch_confirmed.extend(records),
                    Err(e) => {
                        warn!(file = %file.relative_path, error = %e, "entry_point_confirmation_file_failed");
                    }
                }
            }

            for (symbol, file_id, entry_type, framework, name, description, confidence, reasoning) in
                batch_confirmed
            {
                let stored = self
                    .store
                    .insert_confirmed_entry_point(
                        repo_id,
                        symbol.id,
                        file_id,
                        entry_type,
                        &framework,
                        &name,
                        &description,
                        &json!({}),
                        confidence,
                        reasoning.as_deref(),
                    )
                    .await?;
                confirmed_total.push(stored);
            }

            info!(
                repo_id = %repo_id,
                batch_index,
                confirmed_count = confirmed_total.len(),
                "batch_confirmed_stored"
            );
        }

        info!(repo_id = %repo_id, confirmed_count = confirmed_total.len(), "entry_point_confirmation_complete");

        let frameworks: BTreeSet<String> = confirmed_total
            .iter()
            .map(|e| e.framework.clone())
            .filter(|f| f != "unknown")
            .collect();
        let frameworks_detected: Vec<String> = frameworks.into_iter().collect();

        if !confirmed_total.is_empty() {
            match self
                .generate_repo_description(&llm, &repo, &frameworks_detected, &confirmed_total)
                .await
            {
                Ok(Some(description)) => {
                    self.store.update_repository_description(repo_id, &description).await?;
                    info!(repo_id = %repo_id, description_length = description.len(), "repo_description_generated");
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(repo_id = %repo_id, error = %e, "repo_description_generation_failed");
                }
            }
        }

        Ok(EntryPointDetectionStats {
            entry_points_confirmed: confirmed_total.len(),
            frameworks_detected,
        })
    }

    async fn suggest_file_paths(&self, llm: &LlmClient, repo: &Repository) -> Result<Vec<String>> {
        let prompt = format!(
            "You are analyzing the file tree of a source repository to find files likely to \
             contain entry points (HTTP handlers, event/message consumers, or scheduled jobs).\n\n\
             Languages: {languages:?}\n\
             Repository tree (JSON):\n{tree}\n\n\
             Respond with JSON only: {{\"file_paths\": [\"path/to/file\", ...]}}. \
             List only files that plausibly define an entry point; do not invent paths \
             absent from the tree.",
            languages = repo.languages,
            tree = repo.repo_tree,
        );

        let value = llm.call(&prompt, None).await?;
        let response: SuggestedPathsResponse = serde_json::from_value(value)
            .map_err(|e| CodegraphError::llm_failure(format!("malformed file-path suggestion response: {e}")))?;

        Ok(response.file_paths)
    }

    #[allow(clippy::type_complexity)]
    async fn confirm_file(
        &self,
        llm: &LlmClient,
        file: &File,
        symbols: &[Symbol],
    ) -> Result<Vec<(Symbol, Id, EntryPointType, String, String, String, f64, Option<String>)>> {
        let symbol_list: Vec<_> = symbols
            .iter()
            .map(|s| json!({"name": s.name, "qualified_name": s.qualified_name, "kind": format!("{:?}", s.kind)}))
            .collect();

        let prompt = format!(
            "Analyze this source file and identify any entry points (HTTP route handlers, \
             event/message consumers, scheduled jobs). File path: {path}\n\n\
             Symbols defined in this file:\n{symbols}\n\n\
             File content:\n```\n{content}\n```\n\n\
             Respond with JSON only: {{\"entry_points\": [{{\"symbol_name\": str, \
             \"qualified_name\": str | null, \"type\": \"http\"|\"event\"|\"scheduler\", \
             \"name\": str, \"description\": str, \"confidence\": float 0..1, \
             \"reasoning\": str}}]}}. If there are none, return an empty list.",
            path = file.relative_path,
            symbols = serde_json::to_string(&symbol_list).unwrap_or_default(),
            content = file.content.as_deref().unwrap_or(""),
        );

        let value = llm.call(&prompt, None).await?;
        let response: ConfirmationResponse = serde_json::from_value(value)
            .map_err(|e| CodegraphError::llm_failure(format!("malformed confirmation response: {e}")))?;

        let mut resolved = Vec::new();
        for record in response.entry_points {
            if record.confidence < MIN_CONFIDENCE {
                continue;
            }

            let Some(symbol) = resolve_symbol(symbols, &record) else {
                warn!(file = %file.relative_path, symbol_name = %record.symbol_name, "entry_point_symbol_unresolved");
                continue;
            };

            let framework = infer_framework(&file.relative_path);
            resolved.push((
                symbol.clone(),
                file.id,
                parse_entry_point_type(&record.entry_type),
                framework,
                record.name,
                record.description,
                record.confidence,
                record.reasoning,
            ));
        }

        Ok(resolved)
    }

    async fn generate_repo_description(
        &self,
        llm: &LlmClient,
        repo: &Repository,
        frameworks: &[String],
        entry_points: &[ConfirmedEntryPoint],
    ) -> Result<Option<String>> {
        let entries: Vec<_> = entry_points
            .iter()
            .map(|e| json!({"name": e.name, "type": format!("{:?}", e.entry_point_type), "description": e.description}))
            .collect();

        let prompt = format!(
            "Write a 2-4 sentence description of a repository named \"{name}\" given its \
             languages, frameworks, and detected entry points. Respond with JSON only: \
             {{\"description\": str}}.\n\n\
             Languages: {languages:?}\nFrameworks: {frameworks:?}\nEntry points: {entries}",
            name = repo.name,
            languages = repo.languages,
            frameworks = frameworks,
            entries = serde_json::to_string(&entries).unwrap_or_default(),
        );

        let value = llm.call(&prompt, None).await?;
        let response: DescriptionResponse = serde_json::from_value(value)
            .map_err(|e| CodegraphError::llm_failure(format!("malformed description response: {e}")))?;

        Ok(response.description.filter(|d| !d.trim().is_empty()))
    }
}

/// Resolves an LLM-reported entry-point record to a concrete symbol in the
/// file, trying, in order: exact qualified name, exact name, the last two
/// dotted segments of the qualified name as a suffix match, then any symbol
/// in the file as a last resort (§4.8).
fn resolve_symbol<'a>(symbols: &'a [Symbol], record: &ConfirmationRecord) -> Option<&'a Symbol> {
    if let Some(qn) = &record.qualified_name {
        if let Some(s) = symbols.iter().find(|s| &s.qualified_name == qn) {
            return Some(s);
        }
    }

    if let Some(s) = symbols.iter().find(|s| s.name == record.symbol_name) {
        return Some(s);
    }

    if let Some(qn) = &record.qualified_name {
        let parts: Vec<&str> = qn.rsplitn(3, '.').collect();
        if parts.len() >= 2 {
            let suffix = format!("{}.{}", parts[1], parts[0]);
            if let Some(s) = symbols.iter().find(|s| s.qualified_name.ends_with(&suffix)) {
                return Some(s);
            }
        }
    }

    symbols.first()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_framework_from_known_keywords() {
        assert_eq!(infer_framework("src/flask_app/routes.py"), "flask");
        assert_eq!(infer_framework("service/KafkaConsumer.java"), "kafka");
        assert_eq!(infer_framework("src/lib.rs"), "unknown");
    }

    #[test]
    fn parses_entry_point_type_case_insensitively() {
        assert_eq!(parse_entry_point_type("EVENT"), EntryPointType::Event);
        assert_eq!(parse_entry_point_type("scheduler"), EntryPointType::Scheduler);
        assert_eq!(parse_entry_point_type("http"), EntryPointType::Http);
        assert_eq!(parse_entry_point_type("unrecognized"), EntryPointType::Http);
    }
}
