//! Simulation controller: the per-run state machine.
//!
//! `SelectingScenario → PhaseIntro(i) → AwaitingDecision(i) → PhaseIntro(i+1) | Complete`.
//! A confirmed decision is reported through [`DecisionReceipt`]. Phases
//! always advance in list order; `nextPhase` in consequence maps is never
//! followed.

use sdlc_catalog::{CatalogError, ScenarioCatalog};
use sdlc_core::{validate_scenario, Context, Decision, HistoryEntry, Phase, Scenario, ValidationError};
use sdlc_outcome::{compute_outcome, FinalOutcome};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, info};

/// Controller state. Indices are zero-based phase positions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "phase", rename_all = "camelCase")]
pub enum SimState {
    #[default]
    SelectingScenario,
    PhaseIntro(usize),
    AwaitingDecision(usize),
    Complete,
}

impl fmt::Display for SimState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimState::SelectingScenario => f.write_str("selecting scenario"),
            SimState::PhaseIntro(i) => write!(f, "introducing phase {i}"),
            SimState::AwaitingDecision(i) => write!(f, "awaiting decision in phase {i}"),
            SimState::Complete => f.write_str("complete"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SimError {
    #[error("scenario not found: {0}")]
    ScenarioNotFound(String),
    /// A caller broke the state-machine contract.
    #[error("invalid state transition: cannot {action} while {state}")]
    InvalidStateTransition {
        state: SimState,
        action: &'static str,
    },
    #[error("decision {decision} is not offered in phase {phase}")]
    UnknownDecision { phase: String, decision: String },
    #[error("invalid scenario: {0}")]
    InvalidScenario(#[from] ValidationError),
    /// Catalog failure other than a missing id or invalid data.
    #[error("catalog error: {0}")]
    Catalog(String),
}

impl From<CatalogError> for SimError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::NotFound(id) => SimError::ScenarioNotFound(id),
            CatalogError::Invalid { source, .. } => SimError::InvalidScenario(source),
            other => SimError::Catalog(other.to_string()),
        }
    }
}

/// What a confirmed decision did.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionReceipt {
    /// Phase the decision was made in.
    pub phase_index: usize,
    pub entry: HistoryEntry,
    /// Live context after the consequences were applied.
    pub context: Context,
    /// State the controller moved to.
    pub next: SimState,
}

/// Owns the live context, history and final outcome of one run.
#[derive(Clone, Debug, Default)]
pub struct SimulationController {
    state: SimState,
    scenario: Option<Scenario>,
    context: Context,
    history: Vec<HistoryEntry>,
    outcome: Option<FinalOutcome>,
}

impl SimulationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `id` in the catalog and start a fresh run of it.
    pub fn start_scenario(
        &mut self,
        catalog: &ScenarioCatalog,
        id: &str,
    ) -> Result<SimState, SimError> {
        let scenario = catalog.get_scenario(id).map_err(|e| {
            info!(%id, error = %e, "scenario lookup failed");
            SimError::from(e)
        })?;
        self.start(scenario.clone())
    }

    /// Start a fresh run of an already-resolved scenario.
    pub fn start(&mut self, scenario: Scenario) -> Result<SimState, SimError> {
        validate_scenario(&scenario)?;
        info!(id = %scenario.id, track = %scenario.track, phases = scenario.phase_count(), "starting scenario");
        self.scenario = Some(scenario);
        self.begin_run();
        Ok(self.state)
    }

    /// `PhaseIntro(i) → AwaitingDecision(i)`.
    pub fn acknowledge_phase_intro(&mut self) -> Result<SimState, SimError> {
        match self.state {
            SimState::PhaseIntro(i) => {
                self.state = SimState::AwaitingDecision(i);
                Ok(self.state)
            }
            _ => Err(self.reject("acknowledge a phase intro")),
        }
    }

    /// Apply a decision of the current phase and advance.
    ///
    /// On the last phase the outcome is computed once and the run completes.
    pub fn submit_decision(&mut self, decision: &Decision) -> Result<DecisionReceipt, SimError> {
        let SimState::AwaitingDecision(index) = self.state else {
            return Err(self.reject("submit a decision"));
        };
        let (entry, next_context, last) = {
            let Some(phase) = self.scenario.as_ref().and_then(|s| s.phase(index)) else {
                return Err(self.reject("submit a decision"));
            };
            let chosen = match phase.decision(&decision.id) {
                Some(d) if d == decision => d,
                _ => {
                    error!(phase = %phase.id, decision = %decision.id, "decision not offered");
                    return Err(SimError::UnknownDecision {
                        phase: phase.id.clone(),
                        decision: decision.id.clone(),
                    });
                }
            };
            (
                HistoryEntry::record(phase, chosen),
                self.context.apply(&chosen.consequences),
                index + 1 == self.total_phases(),
            )
        };
        debug!(
            phase = %entry.phase_id,
            decision = %entry.decision_id,
            failure_point = entry.failure_point,
            "decision applied"
        );

        self.context = next_context;
        self.history.push(entry.clone());
        if last {
            if let Some(s) = &self.scenario {
                let outcome = compute_outcome(&s.initial_context, &self.history, s.track);
                info!(id = %s.id, success = outcome.success, tier = outcome.tier.label(), "run complete");
                self.outcome = Some(outcome);
            }
            self.state = SimState::Complete;
        } else {
            self.state = SimState::PhaseIntro(index + 1);
        }

        Ok(DecisionReceipt {
            phase_index: index,
            entry,
            context: self.context.clone(),
            next: self.state,
        })
    }

    /// Restart the loaded scenario from phase 0, discarding the run.
    pub fn reset(&mut self) -> Result<SimState, SimError> {
        if self.scenario.is_none() {
            return Err(self.reject("reset"));
        }
        self.begin_run();
        debug!("run reset");
        Ok(self.state)
    }

    /// Drop the scenario and go back to scenario selection.
    pub fn return_to_selection(&mut self) -> SimState {
        *self = Self::default();
        self.state
    }

    fn begin_run(&mut self) {
        self.context = self
            .scenario
            .as_ref()
            .map(|s| s.initial_context.clone())
            .unwrap_or_default();
        self.history.clear();
        self.outcome = None;
        self.state = SimState::PhaseIntro(0);
    }

    fn reject(&self, action: &'static str) -> SimError {
        error!(state = %self.state, action, "invalid state transition");
        SimError::InvalidStateTransition {
            state: self.state,
            action,
        }
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    pub fn scenario(&self) -> Option<&Scenario> {
        self.scenario.as_ref()
    }

    /// Phase being introduced or decided; `None` outside those states.
    pub fn current_phase(&self) -> Option<&Phase> {
        match self.state {
            SimState::PhaseIntro(i) | SimState::AwaitingDecision(i) => {
                self.scenario.as_ref().and_then(|s| s.phase(i))
            }
            _ => None,
        }
    }

    /// Index of the phase in play, or the phase count once complete.
    pub fn phase_index(&self) -> usize {
        match self.state {
            SimState::SelectingScenario => 0,
            SimState::PhaseIntro(i) | SimState::AwaitingDecision(i) => i,
            SimState::Complete => self.total_phases(),
        }
    }

    pub fn total_phases(&self) -> usize {
        self.scenario.as_ref().map_or(0, Scenario::phase_count)
    }

    /// Read-only snapshot of the live context.
    pub fn live_context(&self) -> &Context {
        &self.context
    }

    pub fn initial_context(&self) -> Option<&Context> {
        self.scenario.as_ref().map(|s| &s.initial_context)
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn outcome(&self) -> Option<&FinalOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.state == SimState::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sdlc_core::{Consequences, Metric, Track};
    use sdlc_outcome::Tier;

    fn decision(id: &str, consequences: Consequences) -> Decision {
        Decision {
            id: id.into(),
            title: id.to_uppercase(),
            description: String::new(),
            consequences,
        }
    }

    fn phase(id: &str, decisions: Vec<Decision>) -> Phase {
        Phase {
            id: id.into(),
            title: id.to_uppercase(),
            narrative: format!("{id} begins"),
            decisions,
        }
    }

    fn example_scenario() -> Scenario {
        Scenario {
            id: "example".into(),
            title: "Example".into(),
            description: String::new(),
            track: Track::Baseline,
            initial_context: Context::new()
                .with(Metric::Budget, 100_000.0)
                .with(Metric::Timeline, 12.0)
                .with(Metric::UserSatisfaction, 50.0)
                .with(Metric::Security, 50.0)
                .with(Metric::Performance, 50.0)
                .with(Metric::Reputation, 50.0),
            phases: vec![phase(
                "review",
                vec![decision(
                    "secure",
                    Consequences::new("Hardened the release")
                        .delta(Metric::Budget, -15_000.0)
                        .delta(Metric::Timeline, -3.0)
                        .delta(Metric::Security, 20.0)
                        .delta(Metric::UserSatisfaction, -5.0)
                        .delta(Metric::Performance, 10.0)
                        .delta(Metric::Reputation, 5.0),
                )],
            )],
        }
    }

    fn three_phase_scenario() -> Scenario {
        let mut s = example_scenario();
        s.id = "three".into();
        s.phases = vec![
            phase(
                "plan",
                vec![
                    decision(
                        "jump",
                        Consequences::new("Skipped ahead").delta(Metric::Security, 10.0).next_phase("ship"),
                    ),
                    decision("careful", Consequences::new("Careful").delta(Metric::Reputation, 5.0)),
                ],
            ),
            phase(
                "build",
                vec![decision(
                    "rush",
                    Consequences::new("FAILURE: outage").delta(Metric::Performance, -30.0),
                )],
            ),
            phase(
                "ship",
                vec![decision("launch", Consequences::new("Launched").delta(Metric::Reputation, 10.0))],
            ),
        ];
        s
    }

    fn play_first(ctrl: &mut SimulationController) {
        while let Some(phase) = ctrl.current_phase().cloned() {
            if matches!(ctrl.state(), SimState::PhaseIntro(_)) {
                ctrl.acknowledge_phase_intro().unwrap();
            }
            ctrl.submit_decision(&phase.decisions[0]).unwrap();
        }
    }

    #[test]
    fn example_run_completes_with_mixed_outcome() {
        let scenario = example_scenario();
        let mut ctrl = SimulationController::new();
        assert_eq!(ctrl.state(), SimState::SelectingScenario);
        assert_eq!(ctrl.start(scenario.clone()).unwrap(), SimState::PhaseIntro(0));
        assert_eq!(ctrl.acknowledge_phase_intro().unwrap(), SimState::AwaitingDecision(0));

        let receipt = ctrl
            .submit_decision(&scenario.phases[0].decisions[0])
            .unwrap();
        assert_eq!(receipt.next, SimState::Complete);
        assert_eq!(receipt.entry.outcome_text, "Hardened the release");
        assert_eq!(ctrl.live_context().value(Metric::Budget), 85_000.0);
        assert_eq!(ctrl.live_context().value(Metric::Security), 70.0);

        let outcome = ctrl.outcome().unwrap();
        assert_eq!(outcome.success, 57.5);
        assert_eq!(outcome.tier, Tier::Mixed);
        assert_eq!(&outcome.context, ctrl.live_context());
        assert!(ctrl.is_complete());
        assert_eq!(ctrl.phase_index(), 1);
    }

    #[test]
    fn rejects_out_of_order_calls() {
        let scenario = three_phase_scenario();
        let mut ctrl = SimulationController::new();
        let d = scenario.phases[0].decisions[0].clone();

        assert!(matches!(
            ctrl.submit_decision(&d),
            Err(SimError::InvalidStateTransition {
                state: SimState::SelectingScenario,
                ..
            })
        ));
        assert!(ctrl.acknowledge_phase_intro().is_err());
        assert!(ctrl.reset().is_err());

        ctrl.start(scenario).unwrap();
        assert_eq!(
            ctrl.submit_decision(&d),
            Err(SimError::InvalidStateTransition {
                state: SimState::PhaseIntro(0),
                action: "submit a decision",
            })
        );
        ctrl.acknowledge_phase_intro().unwrap();
        assert!(ctrl.acknowledge_phase_intro().is_err());
        assert!(ctrl.history().is_empty());
    }

    #[test]
    fn rejects_decisions_from_other_phases() {
        let scenario = three_phase_scenario();
        let mut ctrl = SimulationController::new();
        ctrl.start(scenario.clone()).unwrap();
        ctrl.acknowledge_phase_intro().unwrap();

        let foreign = scenario.phases[2].decisions[0].clone();
        assert_eq!(
            ctrl.submit_decision(&foreign),
            Err(SimError::UnknownDecision {
                phase: "plan".into(),
                decision: "launch".into(),
            })
        );

        let mut tampered = scenario.phases[0].decisions[0].clone();
        tampered.consequences = tampered.consequences.delta(Metric::Security, 90.0);
        assert!(matches!(
            ctrl.submit_decision(&tampered),
            Err(SimError::UnknownDecision { .. })
        ));
        assert_eq!(ctrl.state(), SimState::AwaitingDecision(0));
    }

    #[test]
    fn next_phase_is_not_followed() {
        let scenario = three_phase_scenario();
        let mut ctrl = SimulationController::new();
        ctrl.start(scenario.clone()).unwrap();
        ctrl.acknowledge_phase_intro().unwrap();
        let receipt = ctrl
            .submit_decision(&scenario.phases[0].decisions[0])
            .unwrap();
        assert_eq!(receipt.next, SimState::PhaseIntro(1));
        assert_eq!(ctrl.current_phase().unwrap().id, "build");
    }

    #[test]
    fn complete_after_last_phase_only() {
        let mut ctrl = SimulationController::new();
        ctrl.start(three_phase_scenario()).unwrap();
        play_first(&mut ctrl);
        assert!(ctrl.is_complete());
        assert_eq!(ctrl.history().len(), 3);
        assert!(ctrl.history()[1].failure_point);
        let outcome = ctrl.outcome().unwrap();
        assert!(outcome
            .lessons
            .iter()
            .any(|l| l.contains("avoided 1 critical failure point")));

        let d = ctrl.scenario().unwrap().phases[2].decisions[0].clone();
        assert!(ctrl.submit_decision(&d).is_err());
        assert_eq!(ctrl.history().len(), 3);
    }

    #[test]
    fn start_scenario_unknown_id() {
        let catalog = ScenarioCatalog::builtin().unwrap();
        let mut ctrl = SimulationController::new();
        assert_eq!(
            ctrl.start_scenario(&catalog, "nope"),
            Err(SimError::ScenarioNotFound("nope".into()))
        );
        assert_eq!(ctrl.state(), SimState::SelectingScenario);
    }

    #[test]
    fn catalog_errors_keep_their_kind() {
        assert_eq!(
            SimError::from(CatalogError::NotFound("x".into())),
            SimError::ScenarioNotFound("x".into())
        );
        assert_eq!(
            SimError::from(CatalogError::Invalid {
                id: "x".into(),
                source: ValidationError::NoPhases("x".into()),
            }),
            SimError::InvalidScenario(ValidationError::NoPhases("x".into()))
        );
        assert!(matches!(
            SimError::from(CatalogError::Io("denied".into())),
            SimError::Catalog(msg) if msg.contains("denied")
        ));
    }

    #[test]
    fn start_rejects_invalid_scenario() {
        let mut s = example_scenario();
        s.initial_context = s.initial_context.with(Metric::Timeline, 0.0);
        let mut ctrl = SimulationController::new();
        assert!(matches!(ctrl.start(s), Err(SimError::InvalidScenario(_))));
        assert!(ctrl.scenario().is_none());
    }

    #[test]
    fn reset_after_complete_discards_run() {
        let catalog = ScenarioCatalog::builtin().unwrap();
        let mut ctrl = SimulationController::new();
        ctrl.start_scenario(&catalog, "ecommerce-waterfall").unwrap();
        play_first(&mut ctrl);
        let first = ctrl.outcome().cloned().unwrap();

        assert_eq!(ctrl.reset().unwrap(), SimState::PhaseIntro(0));
        assert!(ctrl.history().is_empty());
        assert!(ctrl.outcome().is_none());
        assert_eq!(Some(ctrl.live_context()), ctrl.initial_context());

        // Replay choosing the last option each time.
        while let Some(phase) = ctrl.current_phase().cloned() {
            if matches!(ctrl.state(), SimState::PhaseIntro(_)) {
                ctrl.acknowledge_phase_intro().unwrap();
            }
            let last = phase.decisions.last().unwrap();
            ctrl.submit_decision(last).unwrap();
        }
        let second = ctrl.outcome().cloned().unwrap();
        assert_ne!(first, second);

        let scenario = ctrl.scenario().unwrap().clone();
        let recomputed = compute_outcome(&scenario.initial_context, ctrl.history(), scenario.track);
        assert_eq!(recomputed, second);
    }

    #[test]
    fn return_to_selection_clears_everything() {
        let mut ctrl = SimulationController::new();
        ctrl.start(example_scenario()).unwrap();
        assert_eq!(ctrl.return_to_selection(), SimState::SelectingScenario);
        assert!(ctrl.scenario().is_none());
        assert!(ctrl.live_context().is_empty());
        assert_eq!(ctrl.total_phases(), 0);
    }

    #[test]
    fn every_builtin_scenario_completes() {
        let catalog = ScenarioCatalog::builtin().unwrap();
        for s in catalog.scenarios() {
            let mut ctrl = SimulationController::new();
            ctrl.start_scenario(&catalog, &s.id).unwrap();
            play_first(&mut ctrl);
            assert_eq!(ctrl.history().len(), s.phase_count());
            let outcome = ctrl.outcome().unwrap();
            assert!((0.0..=100.0).contains(&outcome.success), "{}", s.id);
            assert_eq!(outcome.track, s.track);
        }
    }

    #[test]
    fn state_serializes_with_phase() {
        let v = serde_json::to_value(SimState::AwaitingDecision(2)).unwrap();
        assert_eq!(v["state"], "awaitingDecision");
        assert_eq!(v["phase"], 2);
    }

    proptest! {
        #[test]
        fn random_walks_keep_invariants(scenario_idx in 0usize..4,
                                        picks in proptest::collection::vec(0usize..3, 8)) {
            let catalog = ScenarioCatalog::builtin().unwrap();
            let scenario = catalog.scenarios()[scenario_idx].clone();
            let mut ctrl = SimulationController::new();
            ctrl.start(scenario.clone()).unwrap();
            let mut traversed = 0;
            while let Some(phase) = ctrl.current_phase().cloned() {
                ctrl.acknowledge_phase_intro().unwrap();
                let pick = picks[traversed % picks.len()] % phase.decisions.len();
                ctrl.submit_decision(&phase.decisions[pick]).unwrap();
                traversed += 1;
                prop_assert!(ctrl.live_context().is_within_bounds());
                prop_assert_eq!(ctrl.history().len(), traversed);
                prop_assert_eq!(ctrl.is_complete(), traversed == scenario.phase_count());
            }
            prop_assert!(ctrl.is_complete());
            let outcome = ctrl.outcome().unwrap();
            prop_assert!((0.0..=100.0).contains(&outcome.success));
        }
    }
}
