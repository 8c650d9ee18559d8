//! Call-graph query service (C7, §4.7). A thin wrapper over
//! `codegraph-storage::graph`'s traversal that first confirms the root
//! symbol exists and belongs to the repository the caller claims it does,
//! mirroring the original service's two guard checks before traversal.

use std::sync::Arc;

use codegraph_core::{CodegraphError, Id, Result};
use codegraph_storage::graph::GraphNode;
use codegraph_storage::PostgresStore;

pub struct GraphQueryResult {
    pub root_symbol_id: Id,
    pub root_qualified_name: String,
    pub nodes: Vec<GraphNode>,
}

impl GraphQueryResult {
    pub fn total_count(&self) -> usize {
        self.nodes.len()
    }
}

pub struct GraphService {
    store: Arc<PostgresStore>,
}

impl GraphService {
    pub fn new(store: Arc<PostgresStore>) -> Self {
        Self { store }
    }

    pub async fn get_downstream(&self, repo_id: Id, symbol_id: Id, max_depth: i32) -> Result<GraphQueryResult> {
        let symbol = self.verify_symbol(repo_id, symbol_id).await?;
        let nodes = self.store.get_downstream(symbol_id, max_depth).await?;
        Ok(GraphQueryResult {
            root_symbol_id: symbol_id,
            root_qualified_name: symbol.qualified_name,
            nodes,
        })
    }

    pub async fn get_upstream(&self, repo_id: Id, symbol_id: Id, max_depth: i32) -> Result<GraphQueryResult> {
        let symbol = self.verify_symbol(repo_id, symbol_id).await?;
        let nodes = self.store.get_upstream(symbol_id, max_depth).await?;
        Ok(GraphQueryResult {
            root_symbol_id: symbol_id,
            root_qualified_name: symbol.qualified_name,
            nodes,
        })
    }

    async fn verify_symbol(&self, repo_id: Id, symbol_id: Id) -> Result<codegraph_core::domain::Symbol> {
        let symbol = self.store.get_symbol(symbol_id).await?;
        if symbol.repo_id != repo_id {
            return Err(CodegraphError::input_invalid(
                "symbol does not belong to the specified repository",
            ));
        }
        Ok(symbol)
    }
}
