//! Context tracker: live project-health view for display between decisions.

use crate::controller::SimulationController;
use sdlc_core::{Context, Metric, Track};
use sdlc_outcome::{success_score, Tier, TrackConfig};
use serde::Serialize;

/// Budget or timeline may overrun the initial value by this fraction before
/// turning at-risk.
const OVERRUN_TOLERANCE: f64 = 1.10;

/// Coarse health of one metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Health {
    Good,
    Caution,
    AtRisk,
}

impl Health {
    pub fn label(self) -> &'static str {
        match self {
            Health::Good => "good",
            Health::Caution => "caution",
            Health::AtRisk => "at-risk",
        }
    }

    /// Classify a metric. Team size has no health.
    pub fn classify(metric: Metric, value: f64, initial: f64) -> Option<Health> {
        if metric == Metric::TeamSize {
            return None;
        }
        let health = if metric.lower_is_better() {
            if value <= initial {
                Health::Good
            } else if value <= initial * OVERRUN_TOLERANCE {
                Health::Caution
            } else {
                Health::AtRisk
            }
        } else if value >= 80.0 {
            Health::Good
        } else if value >= 60.0 {
            Health::Caution
        } else {
            Health::AtRisk
        };
        Some(health)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricStatus {
    pub metric: Metric,
    pub label: &'static str,
    pub value: f64,
    /// Signed change against the scenario's initial value.
    pub delta: f64,
    pub health: Option<Health>,
    pub display: String,
    pub delta_display: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerView {
    pub metrics: Vec<MetricStatus>,
    /// Success mean of the live context.
    pub project_score: f64,
    pub project_health: Tier,
    pub phase_index: usize,
    pub total_phases: usize,
    pub progress_pct: f64,
}

/// Project the live context against the initial one.
pub fn track(
    live: &Context,
    initial: &Context,
    phase_index: usize,
    total_phases: usize,
    track: Track,
) -> TrackerView {
    let metrics = live
        .iter()
        .map(|(metric, value)| {
            let delta = value - initial.get(metric).unwrap_or(value);
            MetricStatus {
                metric,
                label: metric.label(),
                value,
                delta,
                health: Health::classify(metric, value, initial.value(metric)),
                display: metric.format_value(value),
                delta_display: metric.format_delta(delta),
            }
        })
        .collect();
    let project_score = success_score(live, TrackConfig::for_track(track));
    let progress_pct = if total_phases == 0 {
        0.0
    } else {
        phase_index.min(total_phases) as f64 * 100.0 / total_phases as f64
    };
    TrackerView {
        metrics,
        project_score,
        project_health: Tier::from_score(project_score),
        phase_index,
        total_phases,
        progress_pct,
    }
}

/// Tracker view of the controller's run, if a scenario is loaded.
pub fn track_controller(controller: &SimulationController) -> Option<TrackerView> {
    let scenario = controller.scenario()?;
    Some(track(
        controller.live_context(),
        &scenario.initial_context,
        controller.phase_index(),
        controller.total_phases(),
        scenario.track,
    ))
}
