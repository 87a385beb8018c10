use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Result, SmartKgError};

/// Kinds of import file a datastore folder can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Vertexes,
    Edges,
    Colors,
    IntentRules,
    Entities,
    EntityAttributes,
    Scenarios,
}

impl FileKind {
    /// Folder under the datastore root and file-name prefix.
    fn location(self) -> (&'static str, &'static str) {
        match self {
            FileKind::Vertexes => ("kg", "vertexes"),
            FileKind::Edges => ("kg", "edges"),
            FileKind::Colors => ("kg", "colorconfig"),
            FileKind::IntentRules => ("nlu", "intentrules"),
            FileKind::Entities => ("nlu", "entitymap"),
            FileKind::EntityAttributes => ("nlu", "entityattributemap"),
            FileKind::Scenarios => ("nlu", "scenarios"),
        }
    }

    fn pattern(self) -> Regex {
        let (_, prefix) = self.location();
        Regex::new(&format!(r"(?i)^{}.*\.json$", regex::escape(prefix))).expect("Invalid file pattern")
    }
}

/// Import files of one datastore, grouped by kind, each list sorted by file name.
#[derive(Debug, Clone, Default)]
pub struct DatastoreFiles {
    pub vertexes: Vec<PathBuf>,
    pub edges: Vec<PathBuf>,
    pub colors: Vec<PathBuf>,
    pub intent_rules: Vec<PathBuf>,
    pub entities: Vec<PathBuf>,
    pub entity_attributes: Vec<PathBuf>,
    pub scenarios: Vec<PathBuf>,
}

impl DatastoreFiles {
    fn slot(&mut self, kind: FileKind) -> &mut Vec<PathBuf> {
        match kind {
            FileKind::Vertexes => &mut self.vertexes,
            FileKind::Edges => &mut self.edges,
            FileKind::Colors => &mut self.colors,
            FileKind::IntentRules => &mut self.intent_rules,
            FileKind::Entities => &mut self.entities,
            FileKind::EntityAttributes => &mut self.entity_attributes,
            FileKind::Scenarios => &mut self.scenarios,
        }
    }
}

const ALL_KINDS: [FileKind; 7] = [
    FileKind::Vertexes,
    FileKind::Edges,
    FileKind::Colors,
    FileKind::IntentRules,
    FileKind::Entities,
    FileKind::EntityAttributes,
    FileKind::Scenarios,
];

/// Discover the import files under a datastore folder (`<root>/kg`, `<root>/nlu`).
///
/// Vertex and edge files are required; a datastore without them fails to load.
pub fn discover_files(root: &Path) -> Result<DatastoreFiles> {
    if !root.is_dir() {
        return Err(SmartKgError::MissingFiles(format!(
            "datastore folder {} does not exist",
            root.display()
        )));
    }

    let mut files = DatastoreFiles::default();

    for kind in ALL_KINDS {
        let (folder, _) = kind.location();
        let dir = root.join(folder);
        if !dir.is_dir() {
            continue;
        }
        let pattern = kind.pattern();

        let mut found: Vec<PathBuf> = WalkDir::new(&dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.file_name().to_str().map(|n| pattern.is_match(n)).unwrap_or(false))
            .map(|e| e.into_path())
            .collect();
        found.sort();
        *files.slot(kind) = found;
    }

    let mut missing = Vec::new();
    if files.vertexes.is_empty() {
        missing.push("kg/vertexes*.json");
    }
    if files.edges.is_empty() {
        missing.push("kg/edges*.json");
    }
    if !missing.is_empty() {
        return Err(SmartKgError::MissingFiles(format!(
            "{} in {}",
            missing.join(", "),
            root.display()
        )));
    }

    Ok(files)
}

/// Names of datastore folders directly under `data_folder`, sorted.
pub fn discover_datastores(data_folder: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in WalkDir::new(data_folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if !name.starts_with('.') {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
