//! Datastore import: discover JSON record files on disk and parse them into
//! the parts a [`crate::registry::Datastore`] is built from.

pub mod walker;

pub use walker::{discover_datastores, discover_files, DatastoreFiles, FileKind};

use serde::de::DeserializeOwned;
use std::path::{Component, Path, PathBuf};

use crate::error::{Result, SmartKgError};
use crate::graph::{Edge, Vertex};
use crate::nlu::NluData;
use crate::visual::ScenarioColorConfig;

/// Everything parsed for one datastore, before indexing.
#[derive(Debug, Clone, Default)]
pub struct DatastoreParts {
    pub vertexes: Vec<Vertex>,
    pub edges: Vec<Edge>,
    pub colors: Vec<ScenarioColorConfig>,
    pub nlu: NluData,
}

/// Where datastores come from. The registry only talks to this trait.
pub trait DatastoreSource: Send + Sync {
    /// Names of the datastores this source can load.
    fn list(&self) -> Result<Vec<String>>;

    /// Read and parse every file of datastore `name`. Blocking.
    fn load(&self, name: &str) -> Result<DatastoreParts>;
}

/// Reads datastores from `<root>/<name>/{kg,nlu}/*.json`.
#[derive(Debug, Clone)]
pub struct DirectoryImporter {
    root: PathBuf,
}

impl DirectoryImporter {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder of datastore `name`; names that would escape the root are rejected.
    pub fn datastore_dir(&self, name: &str) -> Result<PathBuf> {
        let path = Path::new(name);
        let mut components = path.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(path)),
            _ => Err(SmartKgError::InvalidInput(format!("invalid datastore name '{}'", name))),
        }
    }
}

impl DatastoreSource for DirectoryImporter {
    fn list(&self) -> Result<Vec<String>> {
        discover_datastores(&self.root)
    }

    fn load(&self, name: &str) -> Result<DatastoreParts> {
        let dir = self.datastore_dir(name)?;
        let files = discover_files(&dir)?;

        let parts = DatastoreParts {
            vertexes: read_records(&files.vertexes)?,
            edges: read_records(&files.edges)?,
            colors: read_records(&files.colors)?,
            nlu: NluData {
                settings: read_records(&files.scenarios)?,
                intent_rules: read_records(&files.intent_rules)?,
                entities: read_records(&files.entities)?,
                entity_attributes: read_records(&files.entity_attributes)?,
            },
        };

        log::debug!(
            "datastore '{}': read {} vertexes, {} edges, {} color configs, {} scenario settings",
            name,
            parts.vertexes.len(),
            parts.edges.len(),
            parts.colors.len(),
            parts.nlu.settings.len()
        );
        Ok(parts)
    }
}

/// Concatenate the JSON arrays stored in `paths`, in order.
pub fn read_records<T: DeserializeOwned>(paths: &[PathBuf]) -> Result<Vec<T>> {
    let mut records = Vec::new();
    for path in paths {
        let content = std::fs::read_to_string(path).map_err(SmartKgError::Io)?;
        let mut batch: Vec<T> = serde_json::from_str(&content)
            .map_err(|e| SmartKgError::Parse(format!("JSON parse error in {}: {}", path.display(), e)))?;
        records.append(&mut batch);
    }
    Ok(records)
}
