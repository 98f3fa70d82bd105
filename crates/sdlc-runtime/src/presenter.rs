//! Decision presenter: impact previews for the choices of a phase.

use crate::controller::{DecisionReceipt, SimError, SimulationController};
use sdlc_core::{Context, Decision, Metric, Phase};
use serde::Serialize;

/// Display colouring of a delta, by its literal sign.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sign {
    Positive,
    Negative,
}

/// One metric a decision would move.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactLine {
    pub metric: Metric,
    pub label: &'static str,
    pub delta: f64,
    pub sign: Sign,
    /// Formatted delta, e.g. `-$15,000` or `+20%`.
    pub display: String,
}

/// A decision together with its preview.
#[derive(Clone, Debug, Serialize)]
pub struct DecisionOption<'a> {
    pub decision: &'a Decision,
    pub impacts: Vec<ImpactLine>,
}

/// Preview what `decision` would change in `ctx`.
///
/// Reserved keys, metrics the context does not track and zero deltas are
/// skipped. Nothing is mutated, so this works for unselected decisions too.
pub fn impact_preview(decision: &Decision, ctx: &Context) -> Vec<ImpactLine> {
    decision
        .consequences
        .effective_deltas(ctx)
        .into_iter()
        .filter(|(_, delta)| *delta != 0.0)
        .map(|(metric, delta)| ImpactLine {
            metric,
            label: metric.label(),
            delta,
            sign: if delta > 0.0 {
                Sign::Positive
            } else {
                Sign::Negative
            },
            display: metric.format_delta(delta),
        })
        .collect()
}

/// Previews for every decision of a phase, in phase order.
pub fn present<'a>(phase: &'a Phase, ctx: &Context) -> Vec<DecisionOption<'a>> {
    phase
        .decisions
        .iter()
        .map(|decision| DecisionOption {
            decision,
            impacts: impact_preview(decision, ctx),
        })
        .collect()
}

/// Previews for the controller's current phase; empty outside a phase.
pub fn present_current(controller: &SimulationController) -> Vec<DecisionOption<'_>> {
    controller
        .current_phase()
        .map(|phase| present(phase, controller.live_context()))
        .unwrap_or_default()
}

/// Hand the chosen decision, unmodified, to the controller.
pub fn confirm(
    controller: &mut SimulationController,
    decision: &Decision,
) -> Result<DecisionReceipt, SimError> {
    controller.submit_decision(decision)
}
