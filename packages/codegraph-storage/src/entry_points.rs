//! Entry-point candidates and AI-confirmed entry points (C8, §3/§4.8).

use codegraph_core::domain::{ConfirmedEntryPoint, EntryPointCandidate, EntryPointType};
use codegraph_core::{CodegraphError, Id, Result};

use crate::rows::{row_to_candidate, row_to_confirmed_entry_point};
use crate::store::PostgresStore;

fn type_str(t: EntryPointType) -> &'static str {
    match t {
        EntryPointType::Http => "http",
        EntryPointType::Event => "event",
        EntryPointType::Scheduler => "scheduler",
    }
}

impl PostgresStore {
    pub async fn insert_candidate(
        &self,
        repo_id: Id,
        symbol_id: Id,
        file_id: Id,
        entry_point_type: EntryPointType,
        framework: &str,
        detection_pattern: &str,
        entry_metadata: &serde_json::Value,
        confidence_score: Option<f64>,
    ) -> Result<EntryPointCandidate> {
        let row = sqlx::query(
            r#"
            INSERT INTO entry_point_candidates (
                id, repo_id, symbol_id, file_id, entry_point_type, framework,
                detection_pattern, entry_metadata, confidence_score
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, repo_id, symbol_id, file_id, entry_point_type, framework,
                      detection_pattern, entry_metadata, confidence_score, created_at
            "#,
        )
        .bind(Id::new().as_uuid())
        .bind(repo_id.as_uuid())
        .bind(symbol_id.as_uuid())
        .bind(file_id.as_uuid())
        .bind(type_str(entry_point_type))
        .bind(framework)
        .bind(detection_pattern)
        .bind(entry_metadata)
        .bind(confidence_score)
        .fetch_one(self.pool())
        .await?;

        row_to_candidate(&row)
    }

    pub async fn list_candidates(&self, repo_id: Id) -> Result<Vec<EntryPointCandidate>> {
        let rows = sqlx::query(
            r#"
            SELECT id, repo_id, symbol_id, file_id, entry_point_type, framework,
                   detection_pattern, entry_metadata, confidence_score, created_at
            FROM entry_point_candidates WHERE repo_id = $1 ORDER BY created_at
            "#,
        )
        .bind(repo_id.as_uuid())
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(row_to_candidate).collect()
    }

    pub async fn insert_confirmed_entry_point(
        &self,
        repo_id: Id,
        symbol_id: Id,
        file_id: Id,
        entry_point_type: EntryPointType,
        framework: &str,
        name: &str,
        description: &str,
        entry_metadata: &serde_json::Value,
        ai_confidence: f64,
        ai_reasoning: Option<&str>,
    ) -> Result<ConfirmedEntryPoint> {
        let row = sqlx::query(
            r#"
            INSERT INTO confirmed_entry_points (
                id, repo_id, symbol_id, file_id, entry_point_type, framework, name,
                description, entry_metadata, ai_confidence, ai_reasoning, detected_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, now())
            RETURNING id, repo_id, symbol_id, file_id, entry_point_type, framework, name,
                      description, entry_metadata, ai_confidence, ai_reasoning, detected_at,
                      confirmed_at
            "#,
        )
        .bind(Id::new().as_uuid())
        .bind(repo_id.as_uuid())
        .bind(symbol_id.as_uuid())
        .bind(file_id.as_uuid())
        .bind(type_str(entry_point_type))
        .bind(framework)
        .bind(name)
        .bind(description)
        .bind(entry_metadata)
        .bind(ai_confidence)
        .bind(ai_reasoning)
        .fetch_one(self.pool())
        .await?;

        row_to_confirmed_entry_point(&row)
    }

    pub async fn get_confirmed_entry_point(&self, id: Id) -> Result<ConfirmedEntryPoint> {
        let row = sqlx::query(
            r#"
            SELECT id, repo_id, symbol_id, file_id, entry_point_type, framework, name,
                   description, entry_metadata, ai_confidence, ai_reasoning, detected_at,
                   confirmed_at
            FROM confirmed_entry_points WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| CodegraphError::not_found(format!("entry point {id} not found")))?;

        row_to_confirmed_entry_point(&row)
    }

    pub async fn list_confirmed_entry_points(&self, repo_id: Id) -> Result<Vec<ConfirmedEntryPoint>> {
        let rows = sqlx::query(
            r#"
            SELECT id, repo_id, symbol_id, file_id, entry_point_type, framework, name,
                   description, entry_metadata, ai_confidence, ai_reasoning, detected_at,
                   confirmed_at
            FROM confirmed_entry_points WHERE repo_id = $1 ORDER BY confirmed_at
            "#,
        )
        .bind(repo_id.as_uuid())
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(row_to_confirmed_entry_point).collect()
    }

    /// Drops every candidate and confirmed entry point for a repository, so
    /// entry-point detection can be forced to start over.
    pub async fn clear_entry_points(&self, repo_id: Id) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM confirmed_entry_points WHERE repo_id = $1")
            .bind(repo_id.as_uuid())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM entry_point_candidates WHERE repo_id = $1")
            .bind(repo_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
