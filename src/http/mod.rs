//! JSON HTTP surface over the graph registry.

pub mod types;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::{QueryOutcome, Result, SmartKgError};
use crate::registry::{Datastore, GraphRegistry};
use types::*;

/// HTTP server over a shared [`GraphRegistry`]
pub struct HttpServer {
    registry: Arc<GraphRegistry>,
    allowed_origins: Vec<String>,
}

impl HttpServer {
    pub fn new(registry: Arc<GraphRegistry>, allowed_origins: Vec<String>) -> Self {
        Self {
            registry,
            allowed_origins,
        }
    }

    /// Run the HTTP server
    pub async fn run(&self, port: u16) -> Result<()> {
        let addr = format!("127.0.0.1:{}", port);
        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            SmartKgError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to bind to {}: {}. Set http_server.port in config.toml", addr, e),
            ))
        })?;

        log::info!("Serving {} datastores on http://{}", self.registry.len(), addr);

        axum::serve(listener, self.router())
            .await
            .map_err(|e| SmartKgError::Io(std::io::Error::new(std::io::ErrorKind::Other, format!("HTTP server error: {}", e))))?;

        Ok(())
    }

    /// Create the axum router
    pub fn router(&self) -> Router {
        // No configured origins means local use: allow any.
        let cors = if self.allowed_origins.is_empty() {
            CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
        } else {
            let origins: Vec<axum::http::HeaderValue> =
                self.allowed_origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .route("/health", get(handle_health))
            .route("/api/datastores", get(handle_list_datastores))
            .route("/api/datastores/:name/reload", post(handle_reload))
            .route("/api/kg/:ds/vertexes/:id", get(handle_vertex))
            .route("/api/kg/:ds/search", get(handle_search))
            .route("/api/kg/:ds/filter", get(handle_filter))
            .route("/api/kg/:ds/scenarios", get(handle_scenarios))
            .route("/api/kg/:ds/entitycolor", get(handle_entity_color))
            .route("/api/kg/:ds/graph", get(handle_scenario_graph))
            .route("/api/kg/:ds/relations/:id", get(handle_relations))
            .route("/api/kg/:ds/filtergraph", post(handle_filter_graph))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
            .with_state(AppState {
                registry: Arc::clone(&self.registry),
            })
    }
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    registry: Arc<GraphRegistry>,
}

impl AppState {
    fn datastore(&self, name: &str) -> std::result::Result<Arc<Datastore>, Response> {
        self.registry.get(name).ok_or_else(|| {
            failure(
                StatusCode::NOT_FOUND,
                format!("datastore '{}' is not loaded", name),
            )
        })
    }
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "success": false,
            "responseMessage": message.into()
        })),
    )
        .into_response()
}

/// `{success, responseMessage, ..payload}` with the status of `outcome`.
fn respond(outcome: QueryOutcome<Value>) -> Response {
    let status = outcome_status(&outcome);
    match outcome {
        QueryOutcome::Found(payload) => {
            let mut body = Map::new();
            body.insert("success".to_string(), Value::Bool(true));
            body.insert("responseMessage".to_string(), Value::String("Success".to_string()));
            if let Value::Object(fields) = payload {
                body.extend(fields);
            }
            (status, Json(Value::Object(body))).into_response()
        }
        QueryOutcome::NotFound(message) | QueryOutcome::InvalidInput(message) => failure(status, message),
    }
}

async fn handle_health() -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "smartkg",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
        .into_response()
}

async fn handle_list_datastores(State(state): State<AppState>) -> Response {
    let summaries: Vec<DatastoreSummary> = state
        .registry
        .names()
        .iter()
        .filter_map(|name| state.registry.get(name))
        .map(|ds| DatastoreSummary::from(&*ds))
        .collect();
    respond(QueryOutcome::Found(json!({ "datastores": summaries })))
}

async fn handle_reload(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.registry.load(&name).await {
        Ok(ds) => respond(QueryOutcome::Found(json!({ "datastore": DatastoreSummary::from(&*ds) }))),
        Err(e) => failure(error_status(&e), e.to_string()),
    }
}

async fn handle_vertex(State(state): State<AppState>, Path((ds, id)): Path<(String, String)>) -> Response {
    let ds = match state.datastore(&ds) {
        Ok(ds) => ds,
        Err(response) => return response,
    };
    respond(ds.executor().vertex_by_id(&id).map(|node| json!({ "nodes": [node] })))
}

async fn handle_search(
    State(state): State<AppState>,
    Path(ds): Path<String>,
    Query(params): Query<SearchParams>,
) -> Response {
    let ds = match state.datastore(&ds) {
        Ok(ds) => ds,
        Err(response) => return response,
    };
    respond(
        ds.executor()
            .search_vertexes_by_name(&params.keyword)
            .map(|nodes| json!({ "nodes": nodes })),
    )
}

async fn handle_filter(
    State(state): State<AppState>,
    Path(ds): Path<String>,
    Query(params): Query<PropertyFilterParams>,
) -> Response {
    let ds = match state.datastore(&ds) {
        Ok(ds) => ds,
        Err(response) => return response,
    };
    respond(
        ds.executor()
            .filter_vertexes_by_property(&params.property_name, &params.property_value)
            .map(|nodes| json!({ "nodes": nodes })),
    )
}

async fn handle_scenarios(State(state): State<AppState>, Path(ds): Path<String>) -> Response {
    let ds = match state.datastore(&ds) {
        Ok(ds) => ds,
        Err(response) => return response,
    };
    respond(ds.executor().scenario_names().map(|names| json!({ "scenarioNames": names })))
}

async fn handle_entity_color(
    State(state): State<AppState>,
    Path(ds): Path<String>,
    Query(params): Query<EntityColorParams>,
) -> Response {
    let ds = match state.datastore(&ds) {
        Ok(ds) => ds,
        Err(response) => return response,
    };
    respond(
        ds.executor()
            .entity_color_map(params.scenario_name.as_deref())
            .map(|colors| json!({ "entityColorConfig": colors })),
    )
}

async fn handle_scenario_graph(
    State(state): State<AppState>,
    Path(ds): Path<String>,
    Query(params): Query<ScenarioListParams>,
) -> Response {
    let ds = match state.datastore(&ds) {
        Ok(ds) => ds,
        Err(response) => return response,
    };
    let scenarios = params.scenario_list();
    if scenarios.is_empty() {
        return failure(StatusCode::BAD_REQUEST, "scenarios is empty");
    }
    let (nodes, relations) = ds.executor().vertexes_and_edges_by_scenarios(&scenarios);
    respond(QueryOutcome::Found(json!({ "nodes": nodes, "relations": relations })))
}

async fn handle_relations(State(state): State<AppState>, Path((ds, id)): Path<(String, String)>) -> Response {
    let ds = match state.datastore(&ds) {
        Ok(ds) => ds,
        Err(response) => return response,
    };
    respond(
        ds.executor()
            .first_level_relationships(&id)
            .map(|(nodes, relations)| json!({ "nodes": nodes, "relations": relations })),
    )
}

async fn handle_filter_graph(
    State(state): State<AppState>,
    Path(ds): Path<String>,
    Json(request): Json<FilterGraphRequest>,
) -> Response {
    let ds = match state.datastore(&ds) {
        Ok(ds) => ds,
        Err(response) => return response,
    };
    let engine = ds.query();
    let outcome = engine
        .filter_graph(
            &request.start_name,
            &request.scenario,
            request.relation_filter(),
            &request.attributes,
        )
        .map(|results| json!({ "results": results }));

    let failures = engine.diagnostics().failure_count();
    if failures > 0 {
        log::warn!("filtergraph on '{}': {} predicate failures recovered", ds.name(), failures);
    }
    respond(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures::write_laptop_datastore;
    use crate::ingest::DirectoryImporter;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn router(root: &TempDir) -> Router {
        write_laptop_datastore(root.path(), "retail");
        let registry = GraphRegistry::new(Arc::new(DirectoryImporter::new(root.path())), Duration::from_secs(10))
            .with_datastores(vec!["retail".to_string()]);
        registry.load("retail").await.unwrap();
        HttpServer::new(Arc::new(registry), Vec::new()).router()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let root = TempDir::new().unwrap();
        let (status, body) = send(router(&root).await, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_vertex_lookup() {
        let root = TempDir::new().unwrap();
        let (status, body) = send(router(&root).await, get("/api/kg/retail/vertexes/v1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["nodes"][0]["name"], "Laptop");

        let (status, body) = send(router(&root).await, get("/api/kg/retail/vertexes/zzz")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_unknown_datastore_is_404() {
        let root = TempDir::new().unwrap();
        let (status, _) = send(router(&root).await, get("/api/kg/ghost/scenarios")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_blank_keyword_is_400() {
        let root = TempDir::new().unwrap();
        let (status, body) = send(router(&root).await, get("/api/kg/retail/search?keyword=")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["responseMessage"].as_str().unwrap().contains("keyword"));

        let (status, body) = send(router(&root).await, get("/api/kg/retail/search?keyword=lap")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["nodes"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_entity_color() {
        let root = TempDir::new().unwrap();
        let (status, body) = send(
            router(&root).await,
            get("/api/kg/retail/entitycolor?scenarioName=shopping"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["entityColorConfig"]["Product"], "#ff0000");
    }

    #[tokio::test]
    async fn test_filter_graph() {
        let root = TempDir::new().unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("/api/kg/retail/filtergraph")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"scenario":"shopping","attributes":[{"attributeName":"years","attributeValue":"5"}]}"#,
            ))
            .unwrap();
        let (status, body) = send(router(&root).await, request).await;
        assert_eq!(status, StatusCode::OK);
        let children = body["results"]["hasSpec"].as_array().unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0]["name"], "RAM");
    }

    #[tokio::test]
    async fn test_filter_graph_empty_relation_list_follows_all() {
        let root = TempDir::new().unwrap();
        let app = router(&root).await;

        let (status, body) = send(
            app.clone(),
            post_json("/api/kg/retail/filtergraph", r#"{"scenario":"shopping","relationTypes":[]}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"]["hasSpec"].as_array().unwrap().len(), 2);

        let (_, omitted) = send(app, post_json("/api/kg/retail/filtergraph", r#"{"scenario":"shopping"}"#)).await;
        assert_eq!(omitted["results"], body["results"]);
    }

    #[tokio::test]
    async fn test_reload_of_unconfigured_folder_is_404() {
        let root = TempDir::new().unwrap();
        let app = router(&root).await;
        write_laptop_datastore(root.path(), "secret");

        let (status, body) = send(app.clone(), post_json("/api/datastores/secret/reload", "")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);

        let (_, body) = send(app.clone(), get("/api/datastores")).await;
        assert_eq!(body["datastores"].as_array().unwrap().len(), 1);
        let (status, _) = send(app, get("/api/kg/secret/scenarios")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_and_reload() {
        let root = TempDir::new().unwrap();
        let app = router(&root).await;

        let (status, body) = send(app.clone(), get("/api/datastores")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["datastores"][0]["name"], "retail");
        assert_eq!(body["datastores"][0]["vertexCount"], 3);
        let generation = body["datastores"][0]["generation"].as_u64().unwrap();

        let reload = Request::builder()
            .method("POST")
            .uri("/api/datastores/retail/reload")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app.clone(), reload).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["datastore"]["generation"].as_u64().unwrap() > generation);

        let missing = Request::builder()
            .method("POST")
            .uri("/api/datastores/ghost/reload")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(app, missing).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_scenario_graph_requires_scenarios() {
        let root = TempDir::new().unwrap();
        let (status, _) = send(router(&root).await, get("/api/kg/retail/graph")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(router(&root).await, get("/api/kg/retail/graph?scenarios=shopping")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["nodes"].as_array().unwrap().len(), 1);
    }
}
