//! Results reporter: end-of-run formatting and the restart/replay actions.

use crate::controller::{SimError, SimState, SimulationController};
use sdlc_core::{HistoryEntry, Scenario, Track};
use sdlc_outcome::{FinalOutcome, Tier};
use serde::Serialize;
use std::fmt;

/// Opaque navigation targets handed to the surrounding shell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NavTarget {
    Replay,
    ScenarioSelection,
    Quiz,
    CaseStudies,
}

impl NavTarget {
    pub fn id(self) -> &'static str {
        match self {
            NavTarget::Replay => "replay",
            NavTarget::ScenarioSelection => "scenario-selection",
            NavTarget::Quiz => "quiz",
            NavTarget::CaseStudies => "case-studies",
        }
    }
}

/// Terminal actions offered by the results screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultsAction {
    /// Play the same scenario again from phase 0.
    Restart,
    /// Drop the run and pick another scenario.
    ChooseAnotherScenario,
}

impl ResultsAction {
    pub fn target(self) -> NavTarget {
        match self {
            ResultsAction::Restart => NavTarget::Replay,
            ResultsAction::ChooseAnotherScenario => NavTarget::ScenarioSelection,
        }
    }

    /// Carry the action out on the controller.
    pub fn apply(self, controller: &mut SimulationController) -> Result<SimState, SimError> {
        match self {
            ResultsAction::Restart => controller.reset(),
            ResultsAction::ChooseAnotherScenario => Ok(controller.return_to_selection()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetric {
    pub label: &'static str,
    pub initial: String,
    #[serde(rename = "final")]
    pub final_value: String,
    pub change: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyStep {
    pub phase: String,
    pub decision: String,
    pub outcome: String,
    pub failure_point: bool,
}

/// Display-ready summary of a finished run.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub scenario_id: String,
    pub scenario_title: String,
    pub track: Track,
    pub title: String,
    pub description: String,
    pub tier: Tier,
    pub success: f64,
    /// Whole percent, e.g. `58%`.
    pub success_display: String,
    /// Signed with one decimal, e.g. `-15.0%`.
    pub budget_variance: String,
    pub timeline_variance: String,
    pub metrics: Vec<ReportMetric>,
    pub journey: Vec<JourneyStep>,
    pub lessons: Vec<String>,
    pub actions: Vec<ResultsAction>,
}

/// Format a finished run. No scoring happens here.
pub fn build_report(
    scenario: &Scenario,
    outcome: &FinalOutcome,
    history: &[HistoryEntry],
) -> RunReport {
    let metrics = outcome
        .context
        .iter()
        .map(|(metric, value)| {
            let initial = scenario.initial_context.get(metric).unwrap_or(value);
            ReportMetric {
                label: metric.label(),
                initial: metric.format_value(initial),
                final_value: metric.format_value(value),
                change: metric.format_delta(value - initial),
            }
        })
        .collect();
    let journey = history
        .iter()
        .map(|e| JourneyStep {
            phase: e.phase_title.clone(),
            decision: e.decision_title.clone(),
            outcome: e.outcome_text.clone(),
            failure_point: e.failure_point,
        })
        .collect();
    RunReport {
        scenario_id: scenario.id.clone(),
        scenario_title: scenario.title.clone(),
        track: outcome.track,
        title: outcome.title.clone(),
        description: outcome.description.clone(),
        tier: outcome.tier,
        success: outcome.success,
        success_display: format_percent(outcome.success),
        budget_variance: format_variance(outcome.budget_variance),
        timeline_variance: format_variance(outcome.timeline_variance),
        metrics,
        journey,
        lessons: outcome.lessons.clone(),
        actions: vec![ResultsAction::Restart, ResultsAction::ChooseAnotherScenario],
    }
}

/// Report for the controller's finished run.
pub fn report_for(controller: &SimulationController) -> Option<RunReport> {
    let scenario = controller.scenario()?;
    let outcome = controller.outcome()?;
    Some(build_report(scenario, outcome, controller.history()))
}

/// `57.5` → `58%`.
pub fn format_percent(value: f64) -> String {
    format!("{:.0}%", value.round())
}

/// `-15.0` → `-15.0%`, `4.25` → `+4.3%`.
pub fn format_variance(value: f64) -> String {
    format!("{value:+.1}%")
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} [{}]", self.scenario_title, self.track)?;
        writeln!(f, "{} | success {}", self.title, self.success_display)?;
        writeln!(f, "{}", self.description)?;
        writeln!(
            f,
            "Budget variance: {} | Timeline variance: {}",
            self.budget_variance, self.timeline_variance
        )?;
        writeln!(f)?;
        writeln!(f, "Final metrics:")?;
        for m in &self.metrics {
            writeln!(
                f,
                "  {:<18} {:>12} -> {:>12} ({})",
                m.label, m.initial, m.final_value, m.change
            )?;
        }
        writeln!(f)?;
        writeln!(f, "Decision journey:")?;
        for (i, step) in self.journey.iter().enumerate() {
            let marker = if step.failure_point { " !" } else { "" };
            writeln!(f, "  {}. {}: {}{}", i + 1, step.phase, step.decision, marker)?;
            writeln!(f, "     {}", step.outcome)?;
        }
        writeln!(f)?;
        writeln!(f, "Lessons:")?;
        for lesson in &self.lessons {
            writeln!(f, "  - {lesson}")?;
        }
        Ok(())
    }
}
