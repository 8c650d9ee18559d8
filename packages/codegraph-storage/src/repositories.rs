//! Repository CRUD and status-transition helpers (C4, §3/§4.4).

use codegraph_core::domain::{Repository, RepositoryStatus};
use codegraph_core::{CodegraphError, Id, Result};

use crate::rows::row_to_repository;
use crate::store::PostgresStore;

const SELECT_COLUMNS: &str = r#"
    id, org_id, name, description, root_path, status, total_files, parsed_files,
    error_message, languages, repo_tree, created_at, updated_at
"#;

fn status_str(status: RepositoryStatus) -> &'static str {
    match status {
        RepositoryStatus::Pending => "pending",
        RepositoryStatus::Parsing => "parsing",
        RepositoryStatus::Completed => "completed",
        RepositoryStatus::Failed => "failed",
    }
}

impl PostgresStore {
    pub async fn create_repository(
        &self,
        org_id: Id,
        name: &str,
        description: Option<&str>,
        root_path: &str,
    ) -> Result<Repository> {
        let query = format!(
            r#"
            INSERT INTO repositories (id, org_id, name, description, root_path, status, languages, repo_tree)
            VALUES ($1, $2, $3, $4, $5, 'pending', '[]'::jsonb, '{{}}'::jsonb)
            RETURNING {SELECT_COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(Id::new().as_uuid())
            .bind(org_id.as_uuid())
            .bind(name)
            .bind(description)
            .bind(root_path)
            .fetch_one(self.pool())
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => CodegraphError::conflict(
                    format!("repository '{root_path}' already registered for this organization"),
                ),
                other => CodegraphError::from(other),
            })?;

        row_to_repository(&row)
    }

    pub async fn get_repository(&self, id: Id) -> Result<Repository> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM repositories WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id.as_uuid())
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| CodegraphError::not_found(format!("repository {id} not found")))?;

        row_to_repository(&row)
    }

    pub async fn list_repositories(&self, org_id: Id) -> Result<Vec<Repository>> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM repositories WHERE org_id = $1 ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&query)
            .bind(org_id.as_uuid())
            .fetch_all(self.pool())
            .await?;

        rows.iter().map(row_to_repository).collect()
    }

    pub async fn set_repository_status(
        &self,
        id: Id,
        status: RepositoryStatus,
        error_message: Option<&str>,
    ) -> Result<Repository> {
        let query = format!(
            r#"
            UPDATE repositories
            SET status = $2, error_message = $3, updated_at = now()
            WHERE id = $1
            RETURNING {SELECT_COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(id.as_uuid())
            .bind(status_str(status))
            .bind(error_message)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| CodegraphError::not_found(format!("repository {id} not found")))?;

        row_to_repository(&row)
    }

    pub async fn update_repository_progress(
        &self,
        id: Id,
        total_files: i64,
        parsed_files: i64,
    ) -> Result<Repository> {
        let query = format!(
            r#"
            UPDATE repositories
            SET total_files = $2, parsed_files = $3, updated_at = now()
            WHERE id = $1
            RETURNING {SELECT_COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(id.as_uuid())
            .bind(total_files)
            .bind(parsed_files)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| CodegraphError::not_found(format!("repository {id} not found")))?;

        row_to_repository(&row)
    }

    pub async fn increment_parsed_files(&self, id: Id, delta: i64) -> Result<Repository> {
        let query = format!(
            r#"
            UPDATE repositories
            SET parsed_files = parsed_files + $2, updated_at = now()
            WHERE id = $1
            RETURNING {SELECT_COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(id.as_uuid())
            .bind(delta)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| CodegraphError::not_found(format!("repository {id} not found")))?;

        row_to_repository(&row)
    }

    pub async fn update_repository_tree(
        &self,
        id: Id,
        languages: &[String],
        repo_tree: &serde_json::Value,
    ) -> Result<Repository> {
        let languages_json = serde_json::to_value(languages)?;

        let query = format!(
            r#"
            UPDATE repositories
            SET languages = $2, repo_tree = $3, updated_at = now()
            WHERE id = $1
            RETURNING {SELECT_COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(id.as_uuid())
            .bind(languages_json)
            .bind(repo_tree)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| CodegraphError::not_found(format!("repository {id} not found")))?;

        row_to_repository(&row)
    }

    pub async fn update_repository_description(&self, id: Id, description: &str) -> Result<Repository> {
        let query = format!(
            r#"
            UPDATE repositories
            SET description = $2, updated_at = now()
            WHERE id = $1
            RETURNING {SELECT_COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(id.as_uuid())
            .bind(description)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| CodegraphError::not_found(format!("repository {id} not found")))?;

        row_to_repository(&row)
    }

    pub async fn delete_repository(&self, id: Id) -> Result<()> {
        let result = sqlx::query("DELETE FROM repositories WHERE id = $1")
            .bind(id.as_uuid())
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CodegraphError::not_found(format!("repository {id} not found")));
        }
        Ok(())
    }
}
