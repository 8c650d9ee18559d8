//! Organization CRUD (C4). An organization owns zero or more repositories
//! and optionally carries the LLM credentials used for entry-point
//! detection and flow synthesis within it.

use codegraph_core::domain::Organization;
use codegraph_core::{CodegraphError, Id, Result};

use crate::rows::row_to_organization;
use crate::store::PostgresStore;

impl PostgresStore {
    pub async fn create_organization(&self, name: &str, description: Option<&str>) -> Result<Organization> {
        let row = sqlx::query(
            r#"
            INSERT INTO organizations (id, name, description)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, llm_base_url, llm_api_key, llm_model_id,
                      llm_max_tokens, created_at, updated_at
            "#,
        )
        .bind(Id::new().as_uuid())
        .bind(name)
        .bind(description)
        .fetch_one(self.pool())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                CodegraphError::conflict(format!("organization '{name}' already exists"))
            }
            other => CodegraphError::from(other),
        })?;

        row_to_organization(&row)
    }

    pub async fn get_organization(&self, id: Id) -> Result<Organization> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, llm_base_url, llm_api_key, llm_model_id,
                   llm_max_tokens, created_at, updated_at
            FROM organizations WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| CodegraphError::not_found(format!("organization {id} not found")))?;

        row_to_organization(&row)
    }

    pub async fn list_organizations(&self) -> Result<Vec<Organization>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, llm_base_url, llm_api_key, llm_model_id,
                   llm_max_tokens, created_at, updated_at
            FROM organizations ORDER BY created_at DESC
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(row_to_organization).collect()
    }

    pub async fn set_organization_llm_config(
        &self,
        id: Id,
        base_url: &str,
        api_key: &str,
        model_id: &str,
        max_tokens: u32,
    ) -> Result<Organization> {
        let row = sqlx::query(
            r#"
            UPDATE organizations
            SET llm_base_url = $2, llm_api_key = $3, llm_model_id = $4, llm_max_tokens = $5,
                updated_at = now()
            WHERE id = $1
            RETURNING id, name, description, llm_base_url, llm_api_key, llm_model_id,
                      llm_max_tokens, created_at, updated_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(base_url)
        .bind(api_key)
        .bind(model_id)
        .bind(max_tokens as i32)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| CodegraphError::not_found(format!("organization {id} not found")))?;

        row_to_organization(&row)
    }

    pub async fn delete_organization(&self, id: Id) -> Result<()> {
        let result = sqlx::query("DELETE FROM organizations WHERE id = $1")
            .bind(id.as_uuid())
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CodegraphError::not_found(format!("organization {id} not found")));
        }
        Ok(())
    }
}
