//! Entry-point flow documents (C9, §3/§4.9). A flow is replaced wholesale
//! on regeneration, never patched in place — the synthesis loop always
//! produces a complete document, so partial updates would only let a
//! stale step survive alongside fresher ones.

use codegraph_core::domain::{EntryPointFlow, FlowStep};
use codegraph_core::{CodegraphError, Id, Result};
use sqlx::Row;

use crate::store::PostgresStore;

impl PostgresStore {
    /// Inserts or fully replaces the flow for `entry_point_id` in one
    /// transaction, so a reader never observes a half-written document.
    pub async fn upsert_flow(
        &self,
        entry_point_id: Id,
        repo_id: Id,
        flow_name: &str,
        technical_summary: &str,
        file_paths: &[String],
        steps: &[FlowStep],
        max_depth_analyzed: i32,
        iterations_completed: u32,
        symbol_ids_analyzed: &[Id],
    ) -> Result<EntryPointFlow> {
        let file_paths_json = serde_json::to_value(file_paths)?;
        let steps_json = serde_json::to_value(steps)?;
        let symbol_ids_json =
            serde_json::to_value(symbol_ids_analyzed.iter().map(|id| id.to_string()).collect::<Vec<_>>())?;

        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM entry_point_flows WHERE entry_point_id = $1")
            .bind(entry_point_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query(
            r#"
            INSERT INTO entry_point_flows (
                id, entry_point_id, repo_id, flow_name, technical_summary, file_paths,
                steps, max_depth_analyzed, iterations_completed, symbol_ids_analyzed
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, entry_point_id, repo_id, flow_name, technical_summary, file_paths,
                      steps, max_depth_analyzed, iterations_completed, symbol_ids_analyzed,
                      created_at, updated_at
            "#,
        )
        .bind(Id::new().as_uuid())
        .bind(entry_point_id.as_uuid())
        .bind(repo_id.as_uuid())
        .bind(flow_name)
        .bind(technical_summary)
        .bind(file_paths_json)
        .bind(steps_json)
        .bind(max_depth_analyzed)
        .bind(iterations_completed as i32)
        .bind(symbol_ids_json)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row_to_flow(&row)
    }

    pub async fn get_flow_by_entry_point(&self, entry_point_id: Id) -> Result<EntryPointFlow> {
        let row = sqlx::query(
            r#"
            SELECT id, entry_point_id, repo_id, flow_name, technical_summary, file_paths,
                   steps, max_depth_analyzed, iterations_completed, symbol_ids_analyzed,
                   created_at, updated_at
            FROM entry_point_flows WHERE entry_point_id = $1
            "#,
        )
        .bind(entry_point_id.as_uuid())
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| {
            CodegraphError::not_found(format!("flow for entry point {entry_point_id} not found"))
        })?;

        row_to_flow(&row)
    }
}

fn row_to_flow(row: &sqlx::postgres::PgRow) -> Result<EntryPointFlow> {
    let file_paths: serde_json::Value = row.try_get("file_paths")?;
    let steps: serde_json::Value = row.try_get("steps")?;
    let symbol_ids: serde_json::Value = row.try_get("symbol_ids_analyzed")?;
    let symbol_ids: Vec<String> = serde_json::from_value(symbol_ids)?;
    let iterations_completed: i32 = row.try_get("iterations_completed")?;

    Ok(EntryPointFlow {
        id: Id::from_uuid(row.try_get("id")?),
        entry_point_id: Id::from_uuid(row.try_get("entry_point_id")?),
        repo_id: Id::from_uuid(row.try_get("repo_id")?),
        flow_name: row.try_get("flow_name")?,
        technical_summary: row.try_get("technical_summary")?,
        file_paths: serde_json::from_value(file_paths)?,
        steps: serde_json::from_value(steps)?,
        max_depth_analyzed: row.try_get("max_depth_analyzed")?,
        iterations_completed: iterations_completed as u32,
        symbol_ids_analyzed: symbol_ids
            .iter()
            .map(|s| s.parse().map_err(|_| CodegraphError::infra("invalid symbol id in stored flow")))
            .collect::<Result<Vec<_>>>()?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
