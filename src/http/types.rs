use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{QueryOutcome, SmartKgError};
use crate::graph::AttributePair;
use crate::registry::Datastore;

/// `?keyword=`
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub keyword: String,
}

/// `?propertyName=&propertyValue=`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyFilterParams {
    #[serde(default)]
    pub property_name: String,
    #[serde(default)]
    pub property_value: String,
}

/// `?scenarioName=`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityColorParams {
    pub scenario_name: Option<String>,
}

/// `?scenarios=a,b`
#[derive(Debug, Default, Deserialize)]
pub struct ScenarioListParams {
    #[serde(default)]
    pub scenarios: String,
}

impl ScenarioListParams {
    pub fn scenario_list(&self) -> Vec<String> {
        self.scenarios
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}

/// Body of `POST /api/kg/:ds/filtergraph`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterGraphRequest {
    #[serde(default)]
    pub start_name: String,
    #[serde(default)]
    pub scenario: String,
    /// Absent, `null` or `[]` follows every relation type.
    pub relation_types: Option<Vec<String>>,
    #[serde(default)]
    pub attributes: Vec<AttributePair>,
}

impl FilterGraphRequest {
    /// Relation types to follow; `None` when every type is followed.
    pub fn relation_filter(&self) -> Option<&[String]> {
        self.relation_types.as_deref().filter(|types| !types.is_empty())
    }
}

/// One published datastore, as listed by `GET /api/datastores`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatastoreSummary {
    pub name: String,
    pub generation: u64,
    pub loaded_at: DateTime<Utc>,
    pub vertex_count: usize,
    pub edge_count: usize,
    pub scenario_count: usize,
}

impl From<&Datastore> for DatastoreSummary {
    fn from(ds: &Datastore) -> Self {
        Self {
            name: ds.name().to_string(),
            generation: ds.generation(),
            loaded_at: ds.loaded_at(),
            vertex_count: ds.graph().vertex_count(),
            edge_count: ds.graph().edge_count(),
            scenario_count: ds.graph().scenario_names().len(),
        }
    }
}

pub fn outcome_status<T>(outcome: &QueryOutcome<T>) -> StatusCode {
    match outcome {
        QueryOutcome::Found(_) => StatusCode::OK,
        QueryOutcome::NotFound(_) => StatusCode::NOT_FOUND,
        QueryOutcome::InvalidInput(_) => StatusCode::BAD_REQUEST,
    }
}

pub fn error_status(error: &SmartKgError) -> StatusCode {
    match error {
        SmartKgError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        SmartKgError::DatastoreNotFound(_) | SmartKgError::MissingFiles(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
