use thiserror::Error;

/// Main error type for SmartKG
#[derive(Error, Debug)]
pub enum SmartKgError {
    /// Context store (SQLite) errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Import file parse errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Required datastore files are absent
    #[error("Missing required files: {0}")]
    MissingFiles(String),

    /// Two vertexes share one id
    #[error("Duplicate vertex id: {0}")]
    DuplicateVertex(String),

    /// Edge endpoint does not resolve to a loaded vertex
    #[error("Dangling edge {head} -[{relation_type}]-> {tail}: unknown vertex {missing}")]
    DanglingEdge {
        head: String,
        tail: String,
        relation_type: String,
        missing: String,
    },

    /// Datastore is not published in the registry
    #[error("Datastore not found: {0}")]
    DatastoreNotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Load exceeded its time budget
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Background task failure (join error, watcher thread)
    #[error("Task error: {0}")]
    Task(String),
}

/// Convenient Result type using SmartKgError
pub type Result<T> = std::result::Result<T, SmartKgError>;

/// Failure of a single vertex property lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PropertyError {
    #[error("property '{name}' on vertex {vertex_id} has {count} conflicting values")]
    Ambiguous {
        vertex_id: String,
        name: String,
        count: usize,
    },
}

/// Outcome of a graph query.
///
/// Keeps "the caller asked for nothing sensible" apart from "the question was
/// fine but the graph has no answer", so handlers and tests can tell them apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome<T> {
    Found(T),
    NotFound(String),
    InvalidInput(String),
}

impl<T> QueryOutcome<T> {
    pub fn not_found(msg: impl Into<String>) -> Self {
        QueryOutcome::NotFound(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        QueryOutcome::InvalidInput(msg.into())
    }

    pub fn is_found(&self) -> bool {
        matches!(self, QueryOutcome::Found(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, QueryOutcome::NotFound(_))
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, QueryOutcome::InvalidInput(_))
    }

    /// Borrow the found value, if any.
    pub fn found(&self) -> Option<&T> {
        match self {
            QueryOutcome::Found(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            QueryOutcome::Found(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> QueryOutcome<U> {
        match self {
            QueryOutcome::Found(v) => QueryOutcome::Found(f(v)),
            QueryOutcome::NotFound(m) => QueryOutcome::NotFound(m),
            QueryOutcome::InvalidInput(m) => QueryOutcome::InvalidInput(m),
        }
    }

    /// Chain another query on a found value.
    pub fn and_then<U, F: FnOnce(T) -> QueryOutcome<U>>(self, f: F) -> QueryOutcome<U> {
        match self {
            QueryOutcome::Found(v) => f(v),
            QueryOutcome::NotFound(m) => QueryOutcome::NotFound(m),
            QueryOutcome::InvalidInput(m) => QueryOutcome::InvalidInput(m),
        }
    }

    /// Message carried by a non-found outcome.
    pub fn message(&self) -> Option<&str> {
        match self {
            QueryOutcome::Found(_) => None,
            QueryOutcome::NotFound(m) | QueryOutcome::InvalidInput(m) => Some(m),
        }
    }
}
