//! Named, atomically replaceable datastore snapshots.
//!
//! Readers take an `Arc<Datastore>` and keep working against it for as long as
//! they hold it. A reload builds a complete new [`Datastore`] off to the side
//! and swaps the map entry in one step, so nobody ever sees half a graph.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::error::{Result, SmartKgError};
use crate::graph::{KnowledgeGraph, QueryEngine};
use crate::ingest::{DatastoreParts, DatastoreSource, DirectoryImporter};
use crate::nlu::NluStore;
use crate::visual::{GraphExecutor, VisualizationConfig};

/// One fully loaded, immutable datastore: graph, NLU settings and colors.
#[derive(Debug)]
pub struct Datastore {
    name: String,
    graph: KnowledgeGraph,
    nlu: NluStore,
    visual: VisualizationConfig,
    generation: u64,
    loaded_at: DateTime<Utc>,
}

impl Datastore {
    /// Index `parts`. Structural errors (dangling edges, duplicate ids) fail here.
    pub fn build(name: &str, parts: DatastoreParts, generation: u64) -> Result<Self> {
        let graph = KnowledgeGraph::build(parts.vertexes, parts.edges)?;
        let nlu = NluStore::new(parts.nlu);

        for scenario in nlu.scenarios() {
            if let Some(root) = nlu.root(scenario) {
                if graph.vertexes_by_name(root).is_empty() {
                    log::warn!(
                        "datastore '{}': root '{}' of scenario '{}' matches no vertex",
                        name,
                        root,
                        scenario
                    );
                }
            }
        }

        Ok(Self {
            name: name.to_string(),
            graph,
            nlu,
            visual: VisualizationConfig::new(parts.colors),
            generation,
            loaded_at: Utc::now(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graph(&self) -> &KnowledgeGraph {
        &self.graph
    }

    pub fn nlu(&self) -> &NluStore {
        &self.nlu
    }

    pub fn visual(&self) -> &VisualizationConfig {
        &self.visual
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Query engine over this snapshot.
    pub fn query(&self) -> QueryEngine<'_> {
        QueryEngine::new(&self.graph, &self.nlu)
    }

    /// Visualization adapter over this snapshot.
    pub fn executor(&self) -> GraphExecutor<'_> {
        GraphExecutor::new(&self.graph, &self.visual)
    }
}

/// Result of [`GraphRegistry::load_all`].
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Datastore name -> published snapshot.
pub struct GraphRegistry {
    source: Arc<dyn DatastoreSource>,
    datastores: RwLock<HashMap<String, Arc<Datastore>>>,
    reload_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    generation: AtomicU64,
    load_timeout: Duration,
    configured: Vec<String>,
}

impl GraphRegistry {
    pub fn new(source: Arc<dyn DatastoreSource>, load_timeout: Duration) -> Self {
        Self {
            source,
            datastores: RwLock::new(HashMap::new()),
            reload_locks: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            load_timeout,
            configured: Vec::new(),
        }
    }

    /// Registry reading from the configured data folder.
    pub fn from_config(config: &Config) -> Self {
        let importer = DirectoryImporter::new(config.data_folder());
        Self::new(Arc::new(importer), config.load_timeout()).with_datastores(config.smartkg.datastores.clone())
    }

    /// Restrict the served set to `names`. An empty list serves every datastore the source lists.
    pub fn with_datastores(mut self, names: Vec<String>) -> Self {
        self.configured = names;
        self
    }

    /// Current snapshot of `name`. Unknown names are never created implicitly.
    pub fn get(&self, name: &str) -> Option<Arc<Datastore>> {
        self.datastores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .datastores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.datastores.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `name` is one of the datastores this registry serves.
    pub fn is_tracked(&self, name: &str) -> bool {
        self.configured.is_empty() || self.configured.iter().any(|n| n == name)
    }

    pub fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Publish an already built datastore, replacing any previous one of the same name.
    pub fn publish(&self, datastore: Datastore) -> Arc<Datastore> {
        let datastore = Arc::new(datastore);
        self.datastores
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(datastore.name().to_string(), Arc::clone(&datastore));
        datastore
    }

    /// Load (or reload) datastore `name` from the source and publish it.
    ///
    /// Reloads of one name run one at a time; readers are never blocked. On
    /// any failure, including the timeout, the previous snapshot stays published.
    /// Names outside the configured set are refused.
    pub async fn load(&self, name: &str) -> Result<Arc<Datastore>> {
        if !self.is_tracked(name) {
            log::warn!("refusing to load unconfigured datastore '{}'", name);
            return Err(SmartKgError::DatastoreNotFound(name.to_string()));
        }

        let lock = self.reload_lock(name);
        let _guard = lock.lock().await;

        let start = Instant::now();
        let generation = self.next_generation();
        let source = Arc::clone(&self.source);
        let owned = name.to_string();

        let task = tokio::task::spawn_blocking(move || {
            let parts = source.load(&owned)?;
            Datastore::build(&owned, parts, generation)
        });

        let built = match tokio::time::timeout(self.load_timeout, task).await {
            Ok(Ok(built)) => built,
            Ok(Err(e)) => Err(SmartKgError::Task(format!("load task for '{}' failed: {}", name, e))),
            Err(_) => Err(SmartKgError::Timeout(format!(
                "loading '{}' exceeded {:?}",
                name, self.load_timeout
            ))),
        };

        let datastore = match built {
            Ok(d) => d,
            Err(e) => {
                log::error!("datastore '{}' not published: {}", name, e);
                return Err(e);
            }
        };

        log::info!(
            "datastore '{}' generation {} published: {} vertexes, {} edges in {:?}",
            name,
            generation,
            datastore.graph().vertex_count(),
            datastore.graph().edge_count(),
            start.elapsed()
        );
        Ok(self.publish(datastore))
    }

    /// Load every configured datastore, or every one the source lists when
    /// none are configured. One failure does not stop the others.
    pub async fn load_all(&self) -> Result<LoadReport> {
        let names = if self.configured.is_empty() {
            self.source.list()?
        } else {
            self.configured.clone()
        };

        let mut report = LoadReport::default();
        for name in names {
            match self.load(&name).await {
                Ok(_) => report.loaded.push(name),
                Err(e) => report.failed.push((name, e.to_string())),
            }
        }
        Ok(report)
    }

    fn reload_lock(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.reload_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(name.to_string()).or_default())
    }
}
