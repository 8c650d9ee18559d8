//! Repository file discovery (C3, §4.3). Walks a root directory, prunes a
//! fixed set of VCS/dependency/cache directories, and admits files whose
//! extension the registry recognizes and whose size fits under the cap.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use codegraph_core::{CodegraphError, Result};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::extraction::registry::supported_extensions;

const SKIP_DIRECTORIES: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    "node_modules",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".ruff_cache",
    "venv",
    ".venv",
    "env",
    ".env",
    "target",
    "build",
    "dist",
    ".idea",
    ".vscode",
];

const MAX_TREE_DEPTH: usize = 100;

#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub size_bytes: u64,
}

/// Walks `root`, returning files sorted by relative path for deterministic
/// downstream processing. `max_file_size_bytes` comes from configuration.
pub fn discover_files(root: &Path, max_file_size_bytes: u64) -> Result<Vec<DiscoveredFile>> {
    if !root.is_dir() {
        return Err(CodegraphError::input_invalid(format!(
            "root path is not a directory: {}",
            root.display()
        )));
    }

    let extensions: BTreeSet<&str> = supported_extensions().into_iter().collect();
    let mut discovered = Vec::new();

    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if entry.file_type().is_dir() {
            let name = entry.file_name().to_string_lossy();
            !SKIP_DIRECTORIES.contains(&name.as_ref())
        } else {
            true
        }
    });

    for entry in walker {
        let entry = entry.map_err(|e| CodegraphError::infra(format!("directory walk failed: {e}")))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let ext = entry
            .path()
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !extensions.contains(ext.as_str()) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(_) => continue,
        };
        if metadata.len() > max_file_size_bytes {
            continue;
        }

        let relative_path = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");

        discovered.push(DiscoveredFile {
            relative_path,
            absolute_path: entry.path().to_path_buf(),
            size_bytes: metadata.len(),
        });
    }

    discovered.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(discovered)
}

pub fn read_file_content(path: &Path) -> Result<(String, String)> {
    let raw = std::fs::read(path)?;
    let content_hash = compute_file_hash(&raw);
    let content = String::from_utf8_lossy(&raw).into_owned();
    Ok((content, content_hash))
}

pub fn compute_file_hash(raw_content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_content);
    format!("{:x}", hasher.finalize())
}

/// Builds the full nested directory tree for a repository: each directory
/// is an inner object, each file an empty object — distinguishable only by
/// position, never by a marker key.
pub fn build_repo_tree(files: &[DiscoveredFile]) -> serde_json::Value {
    let mut tree = serde_json::Map::new();

    for file in files {
        let parts: Vec<&str> = file.relative_path.split('/').collect();
        let Some((filename, dirs)) = parts.split_last() else {
            continue;
        };

        let mut current = &mut tree;
        for dir in dirs {
            current = current
                .entry(dir.to_string())
                .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()))
                .as_object_mut()
                .expect("tree node overwritten by a file with the same name as a directory");
        }
        current.insert(filename.to_string(), serde_json::Value::Object(serde_json::Map::new()));
    }

    serde_json::Value::Object(tree)
}

/// Rejects trees nested deeper than [`MAX_TREE_DEPTH`] rather than silently
/// truncating them.
pub fn validate_repo_tree(tree: &serde_json::Value) -> Result<()> {
    fn walk(node: &serde_json::Value, depth: usize) -> Result<()> {
        if depth > MAX_TREE_DEPTH {
            return Err(CodegraphError::input_invalid(format!(
                "repo tree exceeds max depth of {MAX_TREE_DEPTH}"
            )));
        }
        let Some(object) = node.as_object() else {
            return Err(CodegraphError::input_invalid("repo tree node is not an object"));
        };
        for value in object.values() {
            walk(value, depth + 1)?;
        }
        Ok(())
    }

    walk(tree, 0)
}

/// The immediate parent directory's contents (files and subdirectories, one
/// level), keyed by the parent path (or `.` for root-level files).
pub fn build_folder_structure(file_path: &str, all_files: &[DiscoveredFile]) -> serde_json::Value {
    let parent_parts: Vec<&str> = {
        let mut parts: Vec<&str> = file_path.split('/').collect();
        parts.pop();
        parts
    };

    let mut child_files = BTreeSet::new();
    let mut child_dirs = BTreeSet::new();

    for file in all_files {
        let parts: Vec<&str> = file.relative_path.split('/').collect();
        let Some((name, dirs)) = parts.split_last() else {
            continue;
        };

        if dirs == parent_parts.as_slice() {
            child_files.insert(name.to_string());
        } else if dirs.len() > parent_parts.len() && dirs[..parent_parts.len()] == parent_parts[..] {
            child_dirs.insert(dirs[parent_parts.len()].to_string());
        }
    }

    let parent_name = if parent_parts.is_empty() {
        ".".to_string()
    } else {
        parent_parts.join("/")
    };

    let mut children = serde_json::Map::new();
    for name in &child_files {
        children.insert(name.clone(), serde_json::Value::Object(serde_json::Map::new()));
    }
    for name in &child_dirs {
        children.insert(name.clone(), serde_json::Value::Object(serde_json::Map::new()));
    }

    let mut structure = serde_json::Map::new();
    structure.insert(parent_name, serde_json::Value::Object(children));
    serde_json::Value::Object(structure)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str) -> DiscoveredFile {
        DiscoveredFile {
            relative_path: path.to_string(),
            absolute_path: PathBuf::from(path),
            size_bytes: 10,
        }
    }

    #[test]
    fn builds_nested_tree_from_flat_file_list() {
        let files = vec![file("routes/user.py"), file("routes/util/helper.py"), file("main.py")];
        let tree = build_repo_tree(&files);
        assert!(tree.get("main.py").is_some());
        assert!(tree.get("routes").unwrap().get("user.py").is_some());
        assert!(tree.get("routes").unwrap().get("util").unwrap().get("helper.py").is_some());
    }

    #[test]
    fn validate_rejects_trees_deeper_than_the_cap() {
        let mut node = serde_json::json!({});
        for i in 0..(MAX_TREE_DEPTH + 5) {
            node = serde_json::json!({ format!("d{i}"): node });
        }
        assert!(validate_repo_tree(&node).is_err());
    }

    #[test]
    fn folder_structure_uses_dot_for_root_level_files() {
        let files = vec![file("main.py"), file("routes/user.py")];
        let structure = build_folder_structure("main.py", &files);
        assert!(structure.get(".").unwrap().get("main.py").is_some());
        assert!(structure.get(".").unwrap().get("routes").is_some());
    }

    #[test]
    fn folder_structure_keys_by_parent_directory() {
        let files = vec![file("routes/user.py"), file("routes/models.py"), file("routes/util/helper.py")];
        let structure = build_folder_structure("routes/user.py", &files);
        let routes = structure.get("routes").unwrap();
        assert!(routes.get("user.py").is_some());
        assert!(routes.get("models.py").is_some());
        assert!(routes.get("util").is_some());
    }
}
