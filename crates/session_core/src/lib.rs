use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use shared::{
    domain::{
        Explanation, FailureScenario, MetricsBundle, SystemMode, SystemTopology,
    },
    protocol::{ExplainRequest, HealthResponse, ScenariosResponse, SimulateRequest},
};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub mod normalize;
pub mod workflow;

use normalize::{normalize_explanation, normalize_simulation};
use workflow::{ExplainBlocked, WorkflowStage, WorkflowState};

/// Opaque simulation backend. Transport failures and non-2xx statuses both
/// surface as errors; 2xx bodies are returned undecoded so the normalizer
/// is the only layer that interprets them.
#[async_trait]
pub trait SimulationBackend: Send + Sync {
    async fn simulate(&self, request: &SimulateRequest) -> Result<Value>;
    async fn explain(&self, request: &ExplainRequest) -> Result<Value>;
    async fn scenarios(&self) -> Result<ScenariosResponse>;
    async fn health(&self) -> Result<HealthResponse>;
}

/// JSON-over-HTTP implementation of [`SimulationBackend`].
pub struct HttpSimulationBackend {
    http: Client,
    base_url: String,
}

impl HttpSimulationBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SimulationBackend for HttpSimulationBackend {
    async fn simulate(&self, request: &SimulateRequest) -> Result<Value> {
        let raw = self
            .http
            .post(format!("{}/simulate", self.base_url))
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(raw)
    }

    async fn explain(&self, request: &ExplainRequest) -> Result<Value> {
        let raw = self
            .http
            .post(format!("{}/explain", self.base_url))
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(raw)
    }

    async fn scenarios(&self) -> Result<ScenariosResponse> {
        let response = self
            .http
            .get(format!("{}/scenarios", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response)
    }

    async fn health(&self) -> Result<HealthResponse> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response)
    }
}

/// Discrete user intents the rendering layer forwards to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionIntent {
    SelectScenario(FailureScenario),
    InjectFailure(FailureScenario),
    RunSimulation,
    RequestExplanation,
}

/// Controller → UI notifications.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    ScenarioSelected(FailureScenario),
    FailureInjected(FailureScenario),
    SimulationCompleted { system_mode: SystemMode },
    SimulationFailed(String),
    ExplanationReady,
    ExplanationFailed(String),
    ExplanationBlocked(ExplainBlocked),
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// Another user-triggered request is still in flight; the intent was
    /// dropped without issuing a network call.
    #[error("a request is already in flight")]
    Busy,
    /// The explanation gate rejected the request; no network call was made.
    #[error("explanation blocked: {0}")]
    ExplainBlocked(#[from] ExplainBlocked),
    /// The backend call failed. Prior state is untouched; re-issuing the
    /// intent retries the operation.
    #[error("backend request failed: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Monotonic fence: only the most recently issued request of one kind may
/// apply its response, so a slow stale response cannot overwrite state
/// written by a newer one.
#[derive(Debug, Default)]
struct RequestFence {
    issued: u64,
}

impl RequestFence {
    fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    fn is_current(&self, seq: u64) -> bool {
        seq == self.issued
    }
}

#[derive(Default)]
struct SessionState {
    workflow: WorkflowState,
    topology: Option<SystemTopology>,
    metrics: Option<MetricsBundle>,
    system_mode: SystemMode,
    explanation: Option<Explanation>,
    loading: bool,
    last_simulated_at: Option<DateTime<Utc>>,
    simulate_fence: RequestFence,
    explain_fence: RequestFence,
}

/// Cloned, read-only mirror of the controller state for rendering layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub active_scenario: Option<FailureScenario>,
    pub stage: WorkflowStage,
    pub topology: Option<SystemTopology>,
    pub metrics: Option<MetricsBundle>,
    pub system_mode: SystemMode,
    pub explanation: Option<Explanation>,
    pub loading: bool,
    pub can_request_explanation: bool,
    pub last_simulated_at: Option<DateTime<Utc>>,
}

/// Owns the canonical session state and is its single writer. Rendering
/// layers hold no authoritative state: they mirror [`SessionSnapshot`]s and
/// forward [`SessionIntent`]s.
pub struct SessionController {
    backend: Arc<dyn SimulationBackend>,
    inner: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    session_id: Uuid,
}

impl SessionController {
    pub fn new(backend: Arc<dyn SimulationBackend>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            backend,
            inner: Mutex::new(SessionState::default()),
            events,
            session_id: Uuid::new_v4(),
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn dispatch(&self, intent: SessionIntent) -> Result<(), SessionError> {
        match intent {
            SessionIntent::SelectScenario(scenario) => {
                self.select_scenario(scenario).await;
                Ok(())
            }
            SessionIntent::InjectFailure(scenario) => {
                self.inject_failure(scenario).await;
                Ok(())
            }
            SessionIntent::RunSimulation => self.run_simulation().await,
            SessionIntent::RequestExplanation => self.request_explanation().await,
        }
    }

    /// Local transition: makes `scenario` active and resets its progress
    /// flags. Any held explanation belongs to the previous selection and is
    /// dropped.
    pub async fn select_scenario(&self, scenario: FailureScenario) {
        {
            let mut guard = self.inner.lock().await;
            guard.workflow.select_scenario(scenario);
            guard.explanation = None;
        }
        info!(session = %self.session_id, scenario = %scenario, "scenario selected");
        let _ = self.events.send(SessionEvent::ScenarioSelected(scenario));
    }

    /// Local transition: selects `scenario` if it is not already active and
    /// marks its failure injected. Issues no network call.
    pub async fn inject_failure(&self, scenario: FailureScenario) {
        {
            let mut guard = self.inner.lock().await;
            if guard.workflow.active_scenario() != Some(scenario) {
                guard.workflow.select_scenario(scenario);
            }
            let _ = guard.workflow.inject_failure();
            guard.explanation = None;
        }
        info!(session = %self.session_id, scenario = %scenario, "failure injected");
        let _ = self.events.send(SessionEvent::FailureInjected(scenario));
    }

    /// Runs a simulation for the active scenario (or a baseline run when no
    /// scenario is selected). On success topology, metrics and system mode
    /// are replaced wholesale; on failure prior state stays visible.
    pub async fn run_simulation(&self) -> Result<(), SessionError> {
        let (scenario, seq) = {
            let mut guard = self.inner.lock().await;
            if guard.loading {
                return Err(SessionError::Busy);
            }
            guard.loading = true;
            guard.explanation = None;
            (guard.workflow.active_scenario(), guard.simulate_fence.issue())
        };

        debug!(session = %self.session_id, scenario = ?scenario, seq, "issuing simulate request");
        let outcome = self.backend.simulate(&SimulateRequest { scenario }).await;

        let mut guard = self.inner.lock().await;
        if !guard.simulate_fence.is_current(seq) {
            // A newer request owns the loading flag and the next write.
            warn!(session = %self.session_id, seq, "discarding stale simulate response");
            return Ok(());
        }
        guard.loading = false;
        match outcome {
            Ok(raw) => {
                let state = normalize_simulation(&raw);
                let system_mode = state.system_mode;
                info!(
                    session = %self.session_id,
                    system_mode = %system_mode,
                    services = state.topology.services.len(),
                    "simulation completed"
                );
                guard.topology = Some(state.topology);
                guard.metrics = Some(state.metrics);
                guard.system_mode = system_mode;
                guard.workflow.record_simulation();
                guard.last_simulated_at = Some(Utc::now());
                drop(guard);
                let _ = self
                    .events
                    .send(SessionEvent::SimulationCompleted { system_mode });
                Ok(())
            }
            Err(err) => {
                drop(guard);
                warn!(session = %self.session_id, error = %err, "simulation failed");
                let _ = self
                    .events
                    .send(SessionEvent::SimulationFailed(err.to_string()));
                Err(SessionError::Backend(err))
            }
        }
    }

    /// Requests an explanation for the active scenario. Unless the workflow
    /// is ready and a topology snapshot is present, the request is rejected
    /// locally without a network call.
    pub async fn request_explanation(&self) -> Result<(), SessionError> {
        let (scenario, seq) = {
            let mut guard = self.inner.lock().await;
            if guard.loading {
                return Err(SessionError::Busy);
            }
            let scenario = match guard.workflow.check_explain(guard.topology.is_some()) {
                Ok(scenario) => scenario,
                Err(blocked) => {
                    drop(guard);
                    info!(session = %self.session_id, reason = %blocked, "explanation request blocked");
                    let _ = self.events.send(SessionEvent::ExplanationBlocked(blocked));
                    return Err(SessionError::ExplainBlocked(blocked));
                }
            };
            guard.loading = true;
            (scenario, guard.explain_fence.issue())
        };

        debug!(session = %self.session_id, scenario = %scenario, seq, "issuing explain request");
        let outcome = self.backend.explain(&ExplainRequest { scenario }).await;

        let mut guard = self.inner.lock().await;
        if !guard.explain_fence.is_current(seq) {
            warn!(session = %self.session_id, seq, "discarding stale explain response");
            return Ok(());
        }
        guard.loading = false;
        match outcome {
            Ok(raw) => {
                let explanation = normalize_explanation(&raw);
                info!(
                    session = %self.session_id,
                    paragraphs = explanation.text.len(),
                    factors = explanation.identified_factors.len(),
                    mitigations = explanation.mitigation_suggestions.len(),
                    "explanation ready"
                );
                guard.explanation = Some(explanation);
                drop(guard);
                let _ = self.events.send(SessionEvent::ExplanationReady);
                Ok(())
            }
            Err(err) => {
                drop(guard);
                warn!(session = %self.session_id, error = %err, "explanation failed");
                let _ = self
                    .events
                    .send(SessionEvent::ExplanationFailed(err.to_string()));
                Err(SessionError::Backend(err))
            }
        }
    }

    /// Scenarios the backend advertises, mapped onto the closed enum.
    /// Unknown ids are dropped with a warning rather than carried as
    /// free-form strings.
    pub async fn list_scenarios(&self) -> Result<Vec<FailureScenario>, SessionError> {
        let response = self.backend.scenarios().await?;
        let mut scenarios = Vec::with_capacity(response.scenarios.len());
        for id in response.scenarios {
            match id.parse::<FailureScenario>() {
                Ok(scenario) => scenarios.push(scenario),
                Err(err) => {
                    warn!(session = %self.session_id, error = %err, "backend advertised unsupported scenario")
                }
            }
        }
        Ok(scenarios)
    }

    pub async fn health_check(&self) -> Result<bool, SessionError> {
        let health = self.backend.health().await?;
        Ok(health.is_ok())
    }

    pub async fn can_request_explanation(&self) -> bool {
        let guard = self.inner.lock().await;
        guard.workflow.check_explain(guard.topology.is_some()).is_ok()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let guard = self.inner.lock().await;
        SessionSnapshot {
            active_scenario: guard.workflow.active_scenario(),
            stage: guard.workflow.stage(),
            topology: guard.topology.clone(),
            metrics: guard.metrics.clone(),
            system_mode: guard.system_mode,
            explanation: guard.explanation.clone(),
            loading: guard.loading,
            can_request_explanation: guard
                .workflow
                .check_explain(guard.topology.is_some())
                .is_ok(),
            last_simulated_at: guard.last_simulated_at,
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
