use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Dynamic,
    Static,
    Physic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEntry {
    Section(Section),
    Model(String),
}

/// One entry per meaningful line. Blank lines and `#` comments are dropped;
/// `dynamic`, `static` and `physic` switch the section.
pub fn parse_model_list(source: &str) -> Vec<ModelEntry> {
    source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| match line {
            "dynamic" => ModelEntry::Section(Section::Dynamic),
            "static" => ModelEntry::Section(Section::Static),
            "physic" => ModelEntry::Section(Section::Physic),
            model => ModelEntry::Model(model.to_string()),
        })
        .collect()
}

pub fn load_model_list(path: &Path) -> Result<Vec<ModelEntry>, String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read model list {}: {e}", path.display()))?;
    Ok(parse_model_list(&raw))
}
