//! Process-wide parser registry (C2). `parser_for` is an `O(1)` extension
//! lookup against a lazily-built map; unsupported extensions return `None`
//! so discovery can silently skip them.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::extraction::plugin::LanguagePlugin;
use crate::extraction::plugins::{javascript, java_lang, kotlin, python, rust_lang};

fn build_registry() -> HashMap<&'static str, Arc<dyn LanguagePlugin>> {
    let plugins: Vec<Arc<dyn LanguagePlugin>> = vec![
        Arc::new(python::PythonPlugin),
        Arc::new(java_lang::JavaPlugin),
        Arc::new(kotlin::KotlinPlugin),
        Arc::new(javascript::JavaScriptPlugin),
        Arc::new(rust_lang::RustPlugin),
    ];

    let mut map = HashMap::new();
    for plugin in plugins {
        for ext in plugin.extensions() {
            map.insert(*ext, plugin.clone());
        }
    }
    map
}

fn registry() -> &'static HashMap<&'static str, Arc<dyn LanguagePlugin>> {
    static REGISTRY: OnceLock<HashMap<&'static str, Arc<dyn LanguagePlugin>>> = OnceLock::new();
    REGISTRY.get_or_init(build_registry)
}

/// Extension → plugin lookup (`.py`, `.java`, `.kt`/`.kts`, `.js`/`.mjs`/`.cjs`,
/// `.rs`). `path` may be a bare extension or a full relative path.
pub fn parser_for(path: &str) -> Option<Arc<dyn LanguagePlugin>> {
    let ext = path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or(path);
    registry().get(ext).cloned()
}

/// Every extension the registry currently recognizes, used by discovery to
/// decide which files are admitted.
pub fn supported_extensions() -> Vec<&'static str> {
    registry().keys().copied().collect()
}
