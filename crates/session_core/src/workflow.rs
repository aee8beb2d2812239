//! Workflow gating: tracks how far the select → inject → simulate sequence
//! has progressed and decides when an explanation may be requested.

use serde::Serialize;
use shared::domain::FailureScenario;
use thiserror::Error;

/// Derived view of the workflow flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    /// No scenario chosen yet.
    Idle,
    /// Scenario chosen, no failure injected for it.
    ScenarioSelected,
    /// Failure injected, simulation not yet run against it.
    FailureInjected,
    /// Simulation has run after the injection; explanation may be requested.
    Ready,
}

/// Why an explanation request was rejected. Names the first incomplete step
/// so the rendering layer can point the operator at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplainBlocked {
    #[error("no scenario selected")]
    NoScenario,
    #[error("no failure injected for the selected scenario")]
    FailureNotInjected,
    #[error("simulation has not run since the failure was injected")]
    SimulationNotRun,
    #[error("no topology snapshot available")]
    TopologyMissing,
}

#[derive(Debug, Error)]
#[error("no scenario selected")]
pub struct SelectionRequired;

/// Scenario-scoped progress flags. Selecting a scenario resets everything;
/// injecting resets the simulation flag so that [`WorkflowStage::Ready`]
/// always means "simulation ran after the current injection".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowState {
    active_scenario: Option<FailureScenario>,
    has_injected_failure: bool,
    has_run_simulation: bool,
}

impl WorkflowState {
    pub fn active_scenario(&self) -> Option<FailureScenario> {
        self.active_scenario
    }

    pub fn has_injected_failure(&self) -> bool {
        self.has_injected_failure
    }

    pub fn has_run_simulation(&self) -> bool {
        self.has_run_simulation
    }

    pub fn stage(&self) -> WorkflowStage {
        match (
            self.active_scenario,
            self.has_injected_failure,
            self.has_run_simulation,
        ) {
            (None, _, _) => WorkflowStage::Idle,
            (Some(_), false, _) => WorkflowStage::ScenarioSelected,
            (Some(_), true, false) => WorkflowStage::FailureInjected,
            (Some(_), true, true) => WorkflowStage::Ready,
        }
    }

    /// Valid from any state. Both progress flags are scoped to the scenario
    /// and reset, even when re-selecting the current one.
    pub fn select_scenario(&mut self, scenario: FailureScenario) {
        self.active_scenario = Some(scenario);
        self.has_injected_failure = false;
        self.has_run_simulation = false;
    }

    /// Valid only with an active scenario. Clears the simulation flag: any
    /// earlier run predates this injection and must not satisfy the gate.
    pub fn inject_failure(&mut self) -> Result<(), SelectionRequired> {
        if self.active_scenario.is_none() {
            return Err(SelectionRequired);
        }
        self.has_injected_failure = true;
        self.has_run_simulation = false;
        Ok(())
    }

    /// Always permitted; a run without an injected failure is a baseline run
    /// that updates topology/metrics but leaves the gate closed.
    pub fn record_simulation(&mut self) {
        self.has_run_simulation = true;
    }

    /// The explanation gate. Returns the active scenario when every step is
    /// complete, otherwise the first incomplete step.
    pub fn check_explain(
        &self,
        topology_present: bool,
    ) -> Result<FailureScenario, ExplainBlocked> {
        let Some(scenario) = self.active_scenario else {
            return Err(ExplainBlocked::NoScenario);
        };
        if !self.has_injected_failure {
            return Err(ExplainBlocked::FailureNotInjected);
        }
        if !self.has_run_simulation {
            return Err(ExplainBlocked::SimulationNotRun);
        }
        if !topology_present {
            return Err(ExplainBlocked::TopologyMissing);
        }
        Ok(scenario)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle_with_closed_gate() {
        let state = WorkflowState::default();
        assert_eq!(state.stage(), WorkflowStage::Idle);
        assert_eq!(state.check_explain(true), Err(ExplainBlocked::NoScenario));
    }

    #[test]
    fn walks_the_full_sequence_to_ready() {
        let mut state = WorkflowState::default();
        state.select_scenario(FailureScenario::DatabaseLatencySpike);
        assert_eq!(state.stage(), WorkflowStage::ScenarioSelected);
        assert_eq!(
            state.check_explain(true),
            Err(ExplainBlocked::FailureNotInjected)
        );

        state.inject_failure().expect("scenario is selected");
        assert_eq!(state.stage(), WorkflowStage::FailureInjected);
        assert_eq!(
            state.check_explain(true),
            Err(ExplainBlocked::SimulationNotRun)
        );

        state.record_simulation();
        assert_eq!(state.stage(), WorkflowStage::Ready);
        assert_eq!(
            state.check_explain(true),
            Ok(FailureScenario::DatabaseLatencySpike)
        );
    }

    #[test]
    fn gate_requires_a_topology_snapshot() {
        let mut state = WorkflowState::default();
        state.select_scenario(FailureScenario::RetryAmplification);
        state.inject_failure().expect("scenario is selected");
        state.record_simulation();
        assert_eq!(
            state.check_explain(false),
            Err(ExplainBlocked::TopologyMissing)
        );
    }

    #[test]
    fn inject_requires_selection() {
        let mut state = WorkflowState::default();
        assert!(state.inject_failure().is_err());
        assert_eq!(state.stage(), WorkflowStage::Idle);
    }

    #[test]
    fn baseline_run_does_not_open_the_gate() {
        let mut state = WorkflowState::default();
        state.select_scenario(FailureScenario::RetryAmplification);
        state.record_simulation();
        assert_eq!(state.stage(), WorkflowStage::ScenarioSelected);
        assert_eq!(
            state.check_explain(true),
            Err(ExplainBlocked::FailureNotInjected)
        );
    }

    #[test]
    fn selecting_a_new_scenario_resets_progress() {
        let mut state = WorkflowState::default();
        state.select_scenario(FailureScenario::DatabaseLatencySpike);
        state.inject_failure().expect("scenario is selected");
        state.record_simulation();
        assert_eq!(state.stage(), WorkflowStage::Ready);

        state.select_scenario(FailureScenario::RetryAmplification);
        assert_eq!(state.stage(), WorkflowStage::ScenarioSelected);
        assert!(!state.has_injected_failure());
        assert!(!state.has_run_simulation());
    }

    #[test]
    fn reselecting_the_same_scenario_also_resets() {
        let mut state = WorkflowState::default();
        state.select_scenario(FailureScenario::DatabaseLatencySpike);
        state.inject_failure().expect("scenario is selected");
        state.record_simulation();

        state.select_scenario(FailureScenario::DatabaseLatencySpike);
        assert_eq!(state.stage(), WorkflowStage::ScenarioSelected);
    }

    #[test]
    fn reinjecting_demands_a_fresh_simulation() {
        let mut state = WorkflowState::default();
        state.select_scenario(FailureScenario::ExternalDependencyDegradation);
        state.inject_failure().expect("scenario is selected");
        state.record_simulation();
        assert_eq!(state.stage(), WorkflowStage::Ready);

        state.inject_failure().expect("scenario is selected");
        assert_eq!(state.stage(), WorkflowStage::FailureInjected);
        assert_eq!(
            state.check_explain(true),
            Err(ExplainBlocked::SimulationNotRun)
        );
    }
}
