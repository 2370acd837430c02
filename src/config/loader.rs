//! File inputs: URL lists, request bodies and script bodies

use std::path::Path;

use crate::errors::{ErrorContext, Result};

/// Read a whitespace- and newline-separated URL list.
pub fn load_urls(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_config_context(&format!("{} file read error", path.display()))?;
    Ok(content
        .split_whitespace()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Read a body or script file verbatim.
pub fn load_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_config_context(&format!("{} file read error", path.display()))
}
