use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Aggregate system health as reported by the simulation backend.
///
/// Never derived locally; only a simulation response may change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemMode {
    #[default]
    Healthy,
    Degraded,
    Unhealthy,
}

impl SystemMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemMode::Healthy => "healthy",
            SystemMode::Degraded => "degraded",
            SystemMode::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for SystemMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of failure scenarios agreed upon with the backend.
///
/// Kept as an enum rather than free-form strings so drift between the
/// console's scenario list and the backend's accepted set fails at the
/// boundary instead of deep inside a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureScenario {
    DatabaseLatencySpike,
    ExternalDependencyDegradation,
    RetryAmplification,
}

impl FailureScenario {
    pub const ALL: [FailureScenario; 3] = [
        FailureScenario::DatabaseLatencySpike,
        FailureScenario::ExternalDependencyDegradation,
        FailureScenario::RetryAmplification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureScenario::DatabaseLatencySpike => "database_latency_spike",
            FailureScenario::ExternalDependencyDegradation => "external_dependency_degradation",
            FailureScenario::RetryAmplification => "retry_amplification",
        }
    }
}

impl fmt::Display for FailureScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown failure scenario '{0}'")]
pub struct UnknownScenario(pub String);

impl FromStr for FailureScenario {
    type Err = UnknownScenario;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "database_latency_spike" => Ok(FailureScenario::DatabaseLatencySpike),
            "external_dependency_degradation" => {
                Ok(FailureScenario::ExternalDependencyDegradation)
            }
            "retry_amplification" => Ok(FailureScenario::RetryAmplification),
            other => Err(UnknownScenario(other.to_string())),
        }
    }
}

/// One service in a topology snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceNode {
    pub id: String,
    pub name: String,
    pub status: SystemMode,
    pub latency_ms: f64,
    pub error_rate_pct: f64,
}

/// Directed dependency edge between two service ids.
///
/// Both endpoints should reference ids present in the same topology; the
/// normalizer tolerates violations, they are a backend data-quality concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub source: String,
    pub target: String,
}

/// Services plus dependency edges at one point in simulated time.
/// Replaced wholesale on each successful simulation; never merged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SystemTopology {
    pub services: Vec<ServiceNode>,
    pub dependencies: Vec<DependencyEdge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub time: f64,
    pub value: f64,
}

/// The four metric channels, each an ordered series. Time values are
/// non-decreasing by backend convention, not enforced here.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricsBundle {
    pub latency_ms: Vec<MetricPoint>,
    pub error_rate_pct: Vec<MetricPoint>,
    pub request_volume: Vec<MetricPoint>,
    pub queue_depth: Vec<MetricPoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MitigationSuggestion {
    pub action: String,
    pub description: String,
}

/// Canonical explanation shape. All fields are always present after
/// normalization; an absent wire field becomes an empty sequence.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Explanation {
    pub text: Vec<String>,
    pub identified_factors: Vec<String>,
    pub mitigation_suggestions: Vec<MitigationSuggestion>,
}

impl Explanation {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
            && self.identified_factors.is_empty()
            && self.mitigation_suggestions.is_empty()
    }
}

/// Canonical result of one simulation run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimulationState {
    pub system_mode: SystemMode,
    pub topology: SystemTopology,
    pub metrics: MetricsBundle,
}
