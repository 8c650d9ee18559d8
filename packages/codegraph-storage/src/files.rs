//! File upserts (C4, §4.1). A file is keyed by `(repo_id, relative_path)`;
//! re-parsing a repository overwrites the row in place so stale `content`
//! and `content_hash` never linger.

use codegraph_core::domain::{File, Language};
use codegraph_core::{CodegraphError, Id, Result};

use crate::rows::row_to_file;
use crate::store::PostgresStore;

fn language_str(language: Language) -> &'static str {
    match language {
        Language::Python => "python",
        Language::Java => "java",
        Language::Rust => "rust",
        Language::Javascript => "javascript",
        Language::Kotlin => "kotlin",
    }
}

impl PostgresStore {
    pub async fn upsert_file(
        &self,
        repo_id: Id,
        relative_path: &str,
        language: Language,
        content_hash: &str,
        content: Option<&str>,
        folder_structure: Option<&serde_json::Value>,
    ) -> Result<File> {
        let row = sqlx::query(
            r#"
            INSERT INTO files (id, repo_id, relative_path, language, content_hash, content, folder_structure)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (repo_id, relative_path) DO UPDATE SET
                language = EXCLUDED.language,
                content_hash = EXCLUDED.content_hash,
                content = EXCLUDED.content,
                folder_structure = EXCLUDED.folder_structure,
                updated_at = now()
            RETURNING id, repo_id, relative_path, language, content_hash, content, folder_structure, updated_at
            "#,
        )
        .bind(Id::new().as_uuid())
        .bind(repo_id.as_uuid())
        .bind(relative_path)
        .bind(language_str(language))
        .bind(content_hash)
        .bind(content)
        .bind(folder_structure)
        .fetch_one(self.pool())
        .await?;

        row_to_file(&row)
    }

    pub async fn get_file(&self, id: Id) -> Result<File> {
        let row = sqlx::query(
            r#"
            SELECT id, repo_id, relative_path, language, content_hash, content, folder_structure, updated_at
            FROM files WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| CodegraphError::not_found(format!("file {id} not found")))?;

        row_to_file(&row)
    }

    pub async fn get_file_by_path(&self, repo_id: Id, relative_path: &str) -> Result<File> {
        let row = sqlx::query(
            r#"
            SELECT id, repo_id, relative_path, language, content_hash, content, folder_structure, updated_at
            FROM files WHERE repo_id = $1 AND relative_path = $2
            "#,
        )
        .bind(repo_id.as_uuid())
        .bind(relative_path)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| {
            CodegraphError::not_found(format!("file {relative_path} not found in repository {repo_id}"))
        })?;

        row_to_file(&row)
    }

    pub async fn list_files(&self, repo_id: Id) -> Result<Vec<File>> {
        let rows = sqlx::query(
            r#"
            SELECT id, repo_id, relative_path, language, content_hash, content, folder_structure, updated_at
            FROM files WHERE repo_id = $1 ORDER BY relative_path
            "#,
        )
        .bind(repo_id.as_uuid())
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(row_to_file).collect()
    }

    /// Used by the parsing service to decide whether a file can be skipped:
    /// returns the stored hash, if any, without pulling the full row.
    pub async fn get_file_hash(&self, repo_id: Id, relative_path: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT content_hash FROM files WHERE repo_id = $1 AND relative_path = $2")
            .bind(repo_id.as_uuid())
            .bind(relative_path)
            .fetch_optional(self.pool())
            .await?;

        Ok(match row {
            Some(row) => Some(sqlx::Row::try_get::<String, _>(&row, "content_hash")?),
            None => None,
        })
    }

    pub async fn delete_files_for_repo(&self, repo_id: Id) -> Result<u64> {
        let result = sqlx::query("DELETE FROM files WHERE repo_id = $1")
            .bind(repo_id.as_uuid())
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }
}
