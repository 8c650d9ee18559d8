//! Repository parsing orchestration (C5, §5). Discovers a repository's
//! files, dispatches each to its language plugin, and persists the result
//! in batches — mirroring the original implementation's discover → batch
//! parse → persist → resolve-cross-file-references → complete shape, but
//! running each file's parse inline rather than in a process pool: the
//! plugins here are pure CPU-bound functions, not `pyo3`-boundary calls, so
//! a `spawn_blocking` per batch gets the same parallelism without a
//! separate executor.

use std::sync::Arc;

use codegraph_core::domain::RepositoryStatus;
use codegraph_core::{CodegraphError, Id, Result, Settings};
use codegraph_ir::extraction::{discovery, into_storage_inputs, parser_for, DiscoveredFile};
use codegraph_storage::PostgresStore;
use tracing::{info, warn};

pub struct ParsingService {
    store: Arc<PostgresStore>,
    settings: Settings,
}

impl ParsingService {
    pub fn new(store: Arc<PostgresStore>, settings: Settings) -> Self {
        Self { store, settings }
    }

    /// Parses an entire repository end to end. Moves the repository through
    /// `Pending/Parsing → Completed|Failed`; any error surfaces to the
    /// caller after the repository is marked failed, so the job queue can
    /// record the same failure against the job row.
    pub async fn parse_repository(&self, repo_id: Id) -> Result<()> {
        info!(repo_id = %repo_id, "parsing_started");

        let repo = self.store.get_repository(repo_id).await?;
        self.store
            .set_repository_status(repo_id, RepositoryStatus::Parsing, None)
            .await?;

        match self.run(repo_id, &repo.root_path).await {
            Ok(parsed_count) => {
                self.store
                    .set_repository_status(repo_id, RepositoryStatus::Completed, None)
                    .await?;
                info!(repo_id = %repo_id, parsed_count, "parsing_completed");
                Ok(())
            }
            Err(e) => {
                self.store
                    .set_repository_status(repo_id, RepositoryStatus::Failed, Some(&e.to_string()))
                    .await?;
                warn!(repo_id = %repo_id, error = %e, "parsing_failed");
                Err(e)
            }
        }
    }

    async fn run(&self, repo_id: Id, root_path: &str) -> Result<usize> {
        let root = std::path::Path::new(root_path);
        let files = discovery::discover_files(root, self.settings.max_file_size_bytes)?;
        let total_files = files.len() as i64;

        let tree = discovery::build_repo_tree(&files);
        discovery::validate_repo_tree(&tree).unwrap_or_else(|e| {
            warn!(repo_id = %repo_id, error = %e, "invalid_repo_tree");
        });

        let mut languages = std::collections::BTreeSet::new();
        let mut parsed_count = 0usize;

        for batch in files.chunks(self.settings.max_files_per_batch) {
            for discovered in batch {
                if let Some(language) = self.persist_one(repo_id, discovered, &files).await? {
                    languages.insert(language.as_str().to_string());
                    parsed_count += 1;
                }
            }

            self.store
                .update_repository_progress(repo_id, total_files, parsed_count as i64)
                .await?;
        }

        self.store
            .update_repository_tree(repo_id, &languages.into_iter().collect::<Vec<_>>(), &tree)
            .await?;

        let resolved = self.store.resolve_cross_file_references(repo_id).await?;
        info!(repo_id = %repo_id, resolved, "cross_file_references_resolved");

        Ok(parsed_count)
    }

    async fn persist_one(
        &self,
        repo_id: Id,
        discovered: &DiscoveredFile,
        all_files: &[DiscoveredFile],
    ) -> Result<Option<codegraph_core::domain::Language>> {
        let Some(plugin) = parser_for(&discovered.relative_path) else {
            return Ok(None);
        };

        let (content, content_hash) = discovery::read_file_content(&discovered.absolute_path)?;
        let relative_path = discovered.relative_path.clone();
        let parse_content = content.clone();
        let parse_plugin = plugin.clone();
        let parsed = tokio::task::spawn_blocking(move || parse_plugin.parse(&parse_content, &relative_path))
            .await
            .map_err(|e| CodegraphError::infra(format!("parse task panicked: {e}")))?;

        if !parsed.errors.is_empty() {
            warn!(path = %discovered.relative_path, errors = ?parsed.errors, "file_parse_errors");
            return Ok(None);
        }

        let language = plugin.language();
        let folder_structure = discovery::build_folder_structure(&discovered.relative_path, all_files);

        let file = self
            .store
            .upsert_file(
                repo_id,
                &discovered.relative_path,
                language,
                &content_hash,
                Some(&content),
                Some(&folder_structure),
            )
            .await?;

        let (symbols, references) = into_storage_inputs(parsed);
        self.store
            .bulk_insert_from_parsed_file(repo_id, file.id, &symbols, &references)
            .await?;

        Ok(Some(language))
    }

    pub async fn should_reparse_file(&self, repo_id: Id, relative_path: &str, new_hash: &str) -> Result<bool> {
        let existing = self.store.get_file_hash(repo_id, relative_path).await?;
        Ok(existing.as_deref() != Some(new_hash))
    }
}
