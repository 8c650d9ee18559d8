//! Flow synthesis (C9, §4.9). Iteratively widens the downstream call graph
//! in bands of 3 depths, feeding each band's source code plus the prior
//! iteration's steps back into the LLM, until four iterations are reached
//! or a band comes back empty.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use codegraph_core::domain::{CodeSnippet, EntryPointFlow, EntryPointType, FlowStep, LineRange, Symbol};
use codegraph_core::{CodegraphError, Id, Result, Settings};
use codegraph_orchestration::GraphService;
use codegraph_storage::graph::GraphNode;
use codegraph_storage::PostgresStore;
use serde::Deserialize;
use tracing::{info, warn};

use crate::llm_client::{LlmClient, LlmClientConfig};

const MAX_ITERATIONS: i32 = 4;
const BAND_WIDTH: i32 = 3;

#[derive(Deserialize, Clone)]
struct AiLineRange {
    start: i32,
    end: i32,
}

#[derive(Deserialize, Clone)]
struct AiCodeSnippetRef {
    symbol_name: String,
    #[serde(default)]
    qualified_name: Option<String>,
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default)]
    line_range: Option<AiLineRange>,
    #[serde(default, skip_deserializing)]
    resolved_code: Option<String>,
}

#[derive(Deserialize, Clone)]
struct AiFlowStep {
    step_number: u32,
    title: String,
    description: String,
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default)]
    important_log_lines: Vec<String>,
    #[serde(default)]
    important_code_snippets: Vec<AiCodeSnippetRef>,
}

#[derive(Deserialize)]
struct AiFlowResponse {
    flow_name: String,
    technical_summary: String,
    #[serde(default)]
    steps: Vec<AiFlowStep>,
}

/// One call-graph node flattened with its source code, ready to hand to
/// the LLM or to resolve a code-snippet reference against.
struct BandNode {
    qualified_name: Option<String>,
    name: String,
    depth: i32,
    source_code: String,
    signature: Option<String>,
    file_path: String,
    language: String,
}

pub struct FlowService {
    store: Arc<PostgresStore>,
    graph: GraphService,
    settings: Settings,
}

impl FlowService {
    pub fn new(store: Arc<PostgresStore>, settings: Settings) -> Self {
        let graph = GraphService::new(store.clone());
        Self { store, graph, settings }
    }

    pub async fn generate_flow(&self, repo_id: Id, entry_point_id: Id) -> Result<EntryPointFlow> {
        let entry_point = self.store.get_confirmed_entry_point(entry_point_id).await?;
        if entry_point.repo_id != repo_id {
            return Err(CodegraphError::not_found(format!("entry point {entry_point_id} not found")));
        }

        let entry_symbol = self.store.get_symbol(entry_point.symbol_id).await?;
        let entry_file = self.store.get_file(entry_point.file_id).await?;
        let repo = self.store.get_repository(repo_id).await?;
        let org = self.store.get_organization(repo.org_id).await?;
        let llm = LlmClient::new(LlmClientConfig::resolve(&self.settings, org.llm_config.as_ref()))?;

        info!(
            entry_point_id = %entry_point_id,
            symbol_id = %entry_point.symbol_id,
            entry_point_name = %entry_point.name,
            "flow_generation_started"
        );

        let mut all_symbol_ids: BTreeSet<Id> = BTreeSet::from([entry_point.symbol_id]);
        let mut all_file_paths: BTreeSet<String> = BTreeSet::from([entry_file.relative_path.clone()]);

        let mut previous_steps: Vec<AiFlowStep> = Vec::new();
        let mut last_flow_name: Option<String> = None;
        let mut last_summary: Option<String> = None;
        let mut max_depth_reached = 0i32;
        let mut iterations_completed = 0u32;

        for iteration in 1..=MAX_ITERATIONS {
            let start_depth = (iteration - 1) * BAND_WIDTH;
            let end_depth = iteration * BAND_WIDTH;

            info!(iteration, start_depth, end_depth, "flow_iteration_started");

            let graph_result = self.graph.get_downstream(repo_id, entry_point.symbol_id, end_depth).await?;
            let nodes_in_band: Vec<&GraphNode> = graph_result
                .nodes
                .iter()
                .filter(|n| n.depth >= start_depth && n.depth <= end_depth)
                .collect();

            if iteration > 1 && nodes_in_band.is_empty() {
                info!(iteration, "flow_iteration_no_nodes");
                break;
            }

            for node in &nodes_in_band {
                if let Some(id) = node.symbol_id {
                    all_symbol_ids.insert(id);
                }
            }

            let symbol_ids_to_fetch: Vec<Id> = nodes_in_band.iter().filter_map(|n| n.symbol_id).collect();
            let symbols = self.store.get_symbols(&symbol_ids_to_fetch).await?;
            let symbol_map: HashMap<Id, &Symbol> = symbols.iter().map(|s| (s.id, s)).collect();

            let mut band_nodes: Vec<BandNode> = Vec::new();
            for node in &nodes_in_band {
                let Some(symbol_id) = node.symbol_id else { continue };
                let Some(symbol) = symbol_map.get(&symbol_id) else { continue };

                let file_path = match self.store.get_file(symbol.file_id).await {
                    Ok(f) => f.relative_path,
                    Err(_) => "unknown".to_string(),
                };
                let language = files_language(&self.store, symbol.file_id).await;
                if file_path != "unknown" {
                    all_file_paths.insert(file_path.clone());
                }
                max_depth_reached = max_depth_reached.max(node.depth);

                band_nodes.push(BandNode {
                    qualified_name: node.qualified_name.clone().or_else(|| Some(symbol.qualified_name.clone())),
                    name: node.name.clone(),
                    depth: node.depth,
                    source_code: symbol.source_code.clone(),
                    signature: symbol.signature.clone(),
                    file_path,
                    language,
                });
            }

            if iteration == 1 {
                band_nodes.insert(
                    0,
                    BandNode {
                        qualified_name: Some(entry_symbol.qualified_name.clone()),
                        name: entry_symbol.name.clone(),
                        depth: 0,
                        source_code: entry_symbol.source_code.clone(),
                        signature: entry_symbol.signature.clone(),
                        file_path: entry_file.relative_path.clone(),
                        language: entry_file.language.as_str().to_string(),
                    },
                );
            }

            let prompt = build_flow_prompt(
                &entry_point.name,
                entry_point_type_str(entry_point.entry_point_type),
                &entry_point.description,
                &entry_symbol.qualified_name,
                &band_nodes,
                &previous_steps,
                iteration,
                start_depth,
                end_depth,
            );

            let ai_value = match llm.call(&prompt, None).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(iteration, error = %e, "flow_iteration_error");
                    if previous_steps.is_empty() {
                        return Err(e);
                    }
                    break;
                }
            };

            let ai_response: AiFlowResponse = match serde_json::from_value(ai_value) {
                Ok(r) => r,
                Err(e) => {
                    warn!(iteration, error = %e, "flow_iteration_error");
                    if previous_steps.is_empty() {
                        return Err(CodegraphError::llm_failure(format!("malformed flow response: {e}")));
                    }
                    break;
                }
            };

            last_flow_name = Some(ai_response.flow_name);
            last_summary = Some(ai_response.technical_summary);
            previous_steps = resolve_snippet_code(ai_response.steps, &band_nodes);
            iterations_completed = iteration as u32;

            info!(iteration, steps_count = previous_steps.len(), "flow_iteration_complete");
        }

        if previous_steps.is_empty() {
            return Err(CodegraphError::llm_failure("no flow steps generated"));
        }

        let flow_name = last_flow_name.unwrap_or_else(|| format!("{} Flow", entry_point.name));
        let technical_summary = last_summary.unwrap_or_else(|| entry_point.description.clone());

        let flow_steps: Vec<FlowStep> = previous_steps
            .into_iter()
            .map(|s| {
                let code_snippets: Vec<CodeSnippet> = s
                    .important_code_snippets
                    .into_iter()
                    .filter_map(|snip| {
                        snip.resolved_code.clone().filter(|c| !c.trim().is_empty()).map(|code| CodeSnippet {
                            code,
                            symbol_name: snip.symbol_name.clone(),
                            qualified_name: snip.qualified_name.clone().unwrap_or_default(),
                            file_path: snip.file_path.clone().unwrap_or_default(),
                            line_range: snip.line_range.map(|r| LineRange { start: r.start, end: r.end }),
                        })
                    })
                    .collect();

                let file_path = s
                    .file_path
                    .unwrap_or_else(|| code_snippets.first().map(|c| c.file_path.clone()).unwrap_or_default());

                FlowStep {
                    step_number: s.step_number,
                    title: s.title,
                    description: s.description,
                    file_path,
                    important_log_lines: s.important_log_lines,
                    important_code_snippets: code_snippets,
                }
            })
            .collect();

        let file_paths_list: Vec<String> = all_file_paths.into_iter().collect();
        let symbol_ids_list: Vec<Id> = all_symbol_ids.into_iter().collect();

        let stored = self
            .store
            .upsert_flow(
                entry_point_id,
                repo_id,
                &flow_name,
                &technical_summary,
                &file_paths_list,
                &flow_steps,
                max_depth_reached,
                iterations_completed,
                &symbol_ids_list,
            )
            .await?;

        info!(
            entry_point_id = %entry_point_id,
            flow_name = %flow_name,
            steps_count = flow_steps.len(),
            max_depth = max_depth_reached,
            iterations = iterations_completed,
            "flow_generation_complete"
        );

        Ok(stored)
    }

    pub async fn get_flow(&self, repo_id: Id, entry_point_id: Id) -> Result<EntryPointFlow> {
        let flow = self.store.get_flow_by_entry_point(entry_point_id).await?;
        if flow.repo_id != repo_id {
            return Err(CodegraphError::not_found(format!(
                "flow for entry point {entry_point_id} not found"
            )));
        }
        Ok(flow)
    }
}

async fn files_language(store: &PostgresStore, file_id: Id) -> String {
    store.get_file(file_id).await.map(|f| f.language.as_str().to_string()).unwrap_or_default()
}

fn entry_point_type_str(t: EntryPointType) -> &'static str {
    match t {
        EntryPointType::Http => "http",
        EntryPointType::Event => "event",
        EntryPointType::Scheduler => "scheduler",
    }
}

fn build_flow_prompt(
    entry_point_name: &str,
    entry_point_type: &str,
    entry_point_description: &str,
    entry_symbol_qualified_name: &str,
    band_nodes: &[BandNode],
    previous_steps: &[AiFlowStep],
    iteration: i32,
    start_depth: i32,
    end_depth: i32,
) -> String {
    let nodes_json: Vec<_> = band_nodes
        .iter()
        .map(|n| {
            serde_json::json!({
                "name": n.name,
                "qualified_name": n.qualified_name,
                "depth": n.depth,
                "language": n.language,
                "file_path": n.file_path,
                "signature": n.signature,
                "source_code": n.source_code,
            })
        })
        .collect();

    let previous_json = serde_json::to_string(
        &previous_steps
            .iter()
            .map(|s| {
                serde_json::json!({
                    "step_number": s.step_number,
                    "title": s.title,
                    "description": s.description,
                })
            })
            .collect::<Vec<_>>(),
    )
    .unwrap_or_default();

    format!(
        "You are documenting the execution flow of an entry point named \"{entry_point_name}\" \
         ({entry_point_type}): {entry_point_description}\n\
         Root symbol: {entry_symbol_qualified_name}\n\n\
         This is iteration {iteration}, covering downstream call-graph depths {start_depth}..{end_depth}.\n\
         Nodes discovered in this depth range (JSON):\n{nodes}\n\n\
         Previously generated steps (from earlier iterations, empty if this is the first):\n{previous}\n\n\
         Return the FULL, updated list of steps (not a delta) as JSON only: \
         {{\"flow_name\": str, \"technical_summary\": str, \"steps\": [{{\"step_number\": int, \
         \"title\": str, \"description\": str, \"file_path\": str, \"important_log_lines\": [str], \
         \"important_code_snippets\": [{{\"symbol_name\": str, \"qualified_name\": str | null, \
         \"file_path\": str | null, \"line_range\": {{\"start\": int, \"end\": int}} | null}}]}}]}}.",
        nodes = serde_json::to_string(&nodes_json).unwrap_or_default(),
        previous = previous_json,
    )
}

/// Resolves each step's code-snippet references against the band's nodes,
/// in order: exact `qualified_name`, then `(symbol_name, file_path)`, then
/// `symbol_name` alone. A `line_range` slices the matched node's source;
/// otherwise the full source is used. Unresolvable snippets are left with
/// no code and dropped downstream.
fn resolve_snippet_code(mut steps: Vec<AiFlowStep>, band_nodes: &[BandNode]) -> Vec<AiFlowStep> {
    for step in &mut steps {
        for snippet in &mut step.important_code_snippets {
            let matched = snippet
                .qualified_name
                .as_ref()
                .and_then(|qn| band_nodes.iter().find(|n| n.qualified_name.as_deref() == Some(qn.as_str())))
                .or_else(|| {
                    snippet.file_path.as_ref().and_then(|fp| {
                        band_nodes.iter().find(|n| n.name == snippet.symbol_name && &n.file_path == fp)
                    })
                })
                .or_else(|| band_nodes.iter().find(|n| n.name == snippet.symbol_name));

            let Some(node) = matched else { continue };

            snippet.resolved_code = Some(match &snippet.line_range {
                Some(range) => slice_lines(&node.source_code, range.start, range.end),
                None => node.source_code.clone(),
            });
        }
    }
    steps
}

fn slice_lines(source: &str, start: i32, end: i32) -> String {
    let lines: Vec<&str> = source.split('\n').collect();
    let start_idx = (start - 1).max(0) as usize;
    let end_idx = (end as usize).min(lines.len());
    if start_idx >= end_idx {
        return source.to_string();
    }
    lines[start_idx..end_idx].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, qn: &str, file_path: &str, code: &str) -> BandNode {
        BandNode {
            qualified_name: Some(qn.to_string()),
            name: name.to_string(),
            depth: 1,
            source_code: code.to_string(),
            signature: None,
            file_path: file_path.to_string(),
            language: "python".to_string(),
        }
    }

    fn snippet_ref(symbol_name: &str, qualified_name: Option<&str>, file_path: Option<&str>) -> AiCodeSnippetRef {
        AiCodeSnippetRef {
            symbol_name: symbol_name.to_string(),
            qualified_name: qualified_name.map(str::to_string),
            file_path: file_path.map(str::to_string),
            line_range: None,
            resolved_code: None,
        }
    }

    #[test]
    fn resolves_by_qualified_name() {
        let nodes = vec![node("foo", "a.foo", "a.py", "def foo():\n    pass")];
        let steps = vec![AiFlowStep {
            step_number: 1,
            title: "t".into(),
            description: "d".into(),
            file_path: None,
            important_log_lines: vec![],
            important_code_snippets: vec![snippet_ref("foo", Some("a.foo"), None)],
        }];

        let resolved = resolve_snippet_code(steps, &nodes);
        assert_eq!(resolved[0].important_code_snippets[0].resolved_code.as_deref(), Some("def foo():\n    pass"));
    }

    #[test]
    fn falls_back_to_symbol_name_and_file_path() {
        let nodes = vec![node("bar", "pkg.bar", "pkg/b.py", "def bar(): pass")];
        let steps = vec![AiFlowStep {
            step_number: 1,
            title: "t".into(),
            description: "d".into(),
            file_path: None,
            important_log_lines: vec![],
            important_code_snippets: vec![snippet_ref("bar", None, Some("pkg/b.py"))],
        }];

        let resolved = resolve_snippet_code(steps, &nodes);
        assert!(resolved[0].important_code_snippets[0].resolved_code.is_some());
    }

    #[test]
    fn leaves_unresolvable_snippet_without_code() {
        let nodes = vec![node("foo", "a.foo", "a.py", "code")];
        let steps = vec![AiFlowStep {
            step_number: 1,
            title: "t".into(),
            description: "d".into(),
            file_path: None,
            important_log_lines: vec![],
            important_code_snippets: vec![snippet_ref("unknown_symbol", None, None)],
        }];

        let resolved = resolve_snippet_code(steps, &nodes);
        assert!(resolved[0].important_code_snippets[0].resolved_code.is_none());
    }

    #[test]
    fn slices_lines_within_range() {
        let source = "line1\nline2\nline3\nline4";
        assert_eq!(slice_lines(source, 2, 3), "line2\nline3");
    }
}
