pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod graph;
pub mod http;
pub mod ingest;
pub mod nlu;
pub mod registry;
pub mod visual;
pub mod watch;

pub use config::Config;
pub use error::{QueryOutcome, Result, SmartKgError};
pub use graph::{AttributePair, Edge, KnowledgeGraph, QueryEngine, Vertex};
pub use registry::{Datastore, GraphRegistry};
