use serde::{Deserialize, Serialize};

use crate::domain::FailureScenario;

/// Body of `POST /simulate`. A `None` scenario requests a baseline run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimulateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<FailureScenario>,
}

/// Body of `POST /explain`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExplainRequest {
    pub scenario: FailureScenario,
}

/// Body of `GET /scenarios`. Ids are raw strings; the session core maps
/// them onto [`FailureScenario`] and drops ids it does not recognize.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScenariosResponse {
    pub scenarios: Vec<String>,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}
