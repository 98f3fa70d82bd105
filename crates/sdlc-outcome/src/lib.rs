#![deny(warnings)]

//! Outcome calculator: scoring and narrative lessons for a finished run.
//!
//! This module provides pure, deterministic utilities for:
//! - Folding a decision history over the scenario's initial context
//! - Track-specific bonus rules and success-score averaging
//! - Tier classification, rule-based lessons and budget/timeline variance
//!
//! Both tracks share one calculator parameterized by a [`TrackConfig`].

use sdlc_core::{Context, HistoryEntry, Metric, Track};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Lower bound of the exceptional tier.
pub const EXCEPTIONAL_THRESHOLD: f64 = 85.0;
/// Lower bound of the success tier.
pub const SUCCESS_THRESHOLD: f64 = 70.0;
/// Lower bound of the mixed tier.
pub const MIXED_THRESHOLD: f64 = 50.0;

/// `aiEfficiency` must exceed this for the augmented bonus to apply.
pub const AI_BONUS_THRESHOLD: f64 = 70.0;

/// Outcome tier derived from the success score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Exceptional,
    Success,
    Mixed,
    Failure,
}

impl Tier {
    /// Classify a success score: ≥85 exceptional, ≥70 success, ≥50 mixed.
    pub fn from_score(score: f64) -> Tier {
        if score >= EXCEPTIONAL_THRESHOLD {
            Tier::Exceptional
        } else if score >= SUCCESS_THRESHOLD {
            Tier::Success
        } else if score >= MIXED_THRESHOLD {
            Tier::Mixed
        } else {
            Tier::Failure
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tier::Exceptional => "exceptional",
            Tier::Success => "success",
            Tier::Mixed => "mixed",
            Tier::Failure => "failure",
        }
    }

    fn index(self) -> usize {
        match self {
            Tier::Exceptional => 0,
            Tier::Success => 1,
            Tier::Mixed => 2,
            Tier::Failure => 3,
        }
    }
}

/// Fixed copy for one tier of one track.
#[derive(Clone, Copy, Debug)]
pub struct TierCopy {
    pub title: &'static str,
    pub description: &'static str,
    /// Lesson emitted for runs landing in this tier.
    pub lesson: &'static str,
}

/// Everything that differs between the baseline and augmented calculators.
#[derive(Clone, Copy)]
pub struct TrackConfig {
    pub track: Track,
    /// Metrics averaged into the success score.
    pub success_metrics: &'static [Metric],
    /// Applied once, after all decision deltas and before the final clamp.
    pub bonus_rule: fn(&Context) -> Context,
    /// Metric paired with a lean budget in the efficiency lesson.
    pub efficiency_metric: Metric,
    pub efficiency_threshold: f64,
    /// Extra gate for the performance lesson.
    pub performance_gate: Option<(Metric, f64)>,
    /// AI-adoption remark keyed on `aiEfficiency`.
    pub adoption_lesson: Option<fn(f64) -> &'static str>,
    pub efficiency_lesson: &'static str,
    pub performance_lesson: &'static str,
    /// Indexed exceptional, success, mixed, failure.
    pub tiers: [TierCopy; 4],
}

impl TrackConfig {
    pub fn for_track(track: Track) -> &'static TrackConfig {
        match track {
            Track::Baseline => &BASELINE,
            Track::Augmented => &AUGMENTED,
        }
    }

    pub fn tier_copy(&self, tier: Tier) -> &TierCopy {
        &self.tiers[tier.index()]
    }
}

/// Baseline track: four success metrics, no bonus.
pub static BASELINE: TrackConfig = TrackConfig {
    track: Track::Baseline,
    success_metrics: &sdlc_core::BASELINE_SUCCESS_METRICS,
    bonus_rule: no_bonus,
    efficiency_metric: Metric::Security,
    efficiency_threshold: 70.0,
    performance_gate: None,
    adoption_lesson: None,
    efficiency_lesson: "Efficient resource management: you finished well under budget without compromising security.",
    performance_lesson: "High performance standards were maintained throughout delivery.",
    tiers: [
        TierCopy {
            title: "Outstanding Project Success!",
            description: "The project exceeded expectations across the board. Disciplined process delivered a secure, fast and well-loved product.",
            lesson: "Excellent balance of quality, security and stakeholder needs across the lifecycle.",
        },
        TierCopy {
            title: "Project Success",
            description: "The project met its goals. A few trade-offs left room for improvement, but stakeholders are satisfied.",
            lesson: "Good decisions overall; a few phases deserved more care.",
        },
        TierCopy {
            title: "Mixed Results",
            description: "The project shipped, but compromises in key areas limited its impact.",
            lesson: "Several trade-offs hurt the final product. Revisit the phases where quality was sacrificed for speed.",
        },
        TierCopy {
            title: "Project Struggled",
            description: "Critical issues undermined the project. Review your decisions to see where the lifecycle broke down.",
            lesson: "Fundamental lifecycle steps were skipped or rushed, which is exactly what the SDLC exists to prevent.",
        },
    ],
};

/// Augmented track: five success metrics and the AI-efficiency bonus.
pub static AUGMENTED: TrackConfig = TrackConfig {
    track: Track::Augmented,
    success_metrics: &sdlc_core::AUGMENTED_SUCCESS_METRICS,
    bonus_rule: ai_efficiency_bonus,
    efficiency_metric: Metric::AiEfficiency,
    efficiency_threshold: 75.0,
    performance_gate: Some((Metric::AiEfficiency, 80.0)),
    adoption_lesson: Some(ai_adoption_lesson),
    efficiency_lesson: "AI-driven efficiency kept spending well under budget.",
    performance_lesson: "AI-assisted optimization delivered outstanding performance.",
    tiers: [
        TierCopy {
            title: "AI-Powered Excellence!",
            description: "Human judgment and AI tooling worked in concert. The team shipped faster and better than a traditional process allows.",
            lesson: "You struck an excellent balance between AI automation and human oversight.",
        },
        TierCopy {
            title: "Successful AI-Augmented Delivery",
            description: "AI tools gave the project a real edge. A few decisions left value on the table.",
            lesson: "AI amplified a solid process; tighter oversight would have lifted it further.",
        },
        TierCopy {
            title: "Mixed AI Results",
            description: "AI tools helped in places, but uneven adoption and unchecked output held the project back.",
            lesson: "AI is an amplifier: it magnified weak spots in the process as readily as strong ones.",
        },
        TierCopy {
            title: "AI Integration Struggled",
            description: "Over-reliance on, or misuse of, AI tooling undermined quality and trust.",
            lesson: "AI tools cannot replace fundamental engineering discipline and human review.",
        },
    ],
};

/// Identity bonus rule.
pub fn no_bonus(ctx: &Context) -> Context {
    ctx.clone()
}

/// +5 performance, +3 user satisfaction, +0.5 timeline when `aiEfficiency > 70`.
pub fn ai_efficiency_bonus(ctx: &Context) -> Context {
    let mut out = ctx.clone();
    if ctx.value(Metric::AiEfficiency) > AI_BONUS_THRESHOLD {
        out.add(Metric::Performance, 5.0);
        out.add(Metric::UserSatisfaction, 3.0);
        out.add(Metric::Timeline, 0.5);
    }
    out
}

fn ai_adoption_lesson(ai_efficiency: f64) -> &'static str {
    if ai_efficiency >= 80.0 {
        "Excellent AI adoption: tools were integrated thoughtfully and amplified the team's output."
    } else if ai_efficiency >= 60.0 {
        "Good AI integration, though some opportunities to leverage AI tooling were missed."
    } else {
        "AI tools were underutilized or poorly integrated; adoption needs a deliberate strategy."
    }
}

/// Final result of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalOutcome {
    /// Final metrics, serialized alongside the derived fields.
    #[serde(flatten)]
    pub context: Context,
    pub track: Track,
    /// Mean of the track's success metrics, in `[0, 100]`.
    pub success: f64,
    pub tier: Tier,
    pub title: String,
    pub description: String,
    pub lessons: Vec<String>,
    /// Percent change of budget vs. the initial context.
    pub budget_variance: f64,
    /// Percent change of timeline vs. the initial context.
    pub timeline_variance: f64,
}

/// Compute the outcome of a run from its initial context and decision log.
///
/// Pure: identical inputs always produce identical outputs.
///
/// Example:
/// let outcome = compute_outcome(&scenario.initial_context, &history, Track::Baseline);
/// assert!((0.0..=100.0).contains(&outcome.success));
pub fn compute_outcome(initial: &Context, history: &[HistoryEntry], track: Track) -> FinalOutcome {
    compute_outcome_with(initial, history, TrackConfig::for_track(track))
}

/// [`compute_outcome`] with an explicit track configuration.
pub fn compute_outcome_with(
    initial: &Context,
    history: &[HistoryEntry],
    config: &TrackConfig,
) -> FinalOutcome {
    let folded = fold_history(initial, history);
    let context = (config.bonus_rule)(&folded).clamped();
    let success = success_score(&context, config);
    let tier = Tier::from_score(success);
    let copy = config.tier_copy(tier);
    let lessons = lessons(config, initial, &context, history, tier);
    let budget_variance = percent_change(
        initial.value(Metric::Budget),
        context.value(Metric::Budget),
    )
    .unwrap_or(0.0);
    let timeline_variance = percent_change(
        initial.value(Metric::Timeline),
        context.value(Metric::Timeline),
    )
    .unwrap_or(0.0);
    debug!(
        track = %config.track,
        success,
        tier = tier.label(),
        decisions = history.len(),
        "outcome computed"
    );
    FinalOutcome {
        context,
        track: config.track,
        success,
        tier,
        title: copy.title.to_string(),
        description: copy.description.to_string(),
        lessons,
        budget_variance,
        timeline_variance,
    }
}

/// Replay every decision over `initial` with the same update the controller uses.
pub fn fold_history(initial: &Context, history: &[HistoryEntry]) -> Context {
    history
        .iter()
        .fold(initial.clone(), |ctx, entry| ctx.apply(&entry.consequences))
}

/// Arithmetic mean of the configured success metrics. Untracked metrics count as 0.
pub fn success_score(ctx: &Context, config: &TrackConfig) -> f64 {
    if config.success_metrics.is_empty() {
        return 0.0;
    }
    let total: f64 = config.success_metrics.iter().map(|m| ctx.value(*m)).sum();
    total / config.success_metrics.len() as f64
}

/// `(to - from) / from * 100`. Returns `None` unless `from` is positive and finite.
pub fn percent_change(from: f64, to: f64) -> Option<f64> {
    if !(from.is_finite() && from > 0.0) {
        return None;
    }
    let v = (to - from) * 100.0 / from;
    v.is_finite().then_some(v)
}

fn lessons(
    config: &TrackConfig,
    initial: &Context,
    ctx: &Context,
    history: &[HistoryEntry],
    tier: Tier,
) -> Vec<String> {
    let mut out = Vec::new();

    if let Some(adoption) = config.adoption_lesson {
        out.push(adoption(ctx.value(Metric::AiEfficiency)).to_string());
    }

    let failures = history.iter().filter(|e| e.failure_point).count();
    if failures > 0 {
        let plural = if failures == 1 { "" } else { "s" };
        out.push(format!(
            "You avoided {failures} critical failure point{plural} by learning from the consequences of risky decisions."
        ));
    }

    out.push(config.tier_copy(tier).lesson.to_string());

    let lean_budget = ctx.value(Metric::Budget) < initial.value(Metric::Budget) * 0.8;
    if lean_budget && ctx.value(config.efficiency_metric) > config.efficiency_threshold {
        out.push(config.efficiency_lesson.to_string());
    }

    let gate_open = config
        .performance_gate
        .map_or(true, |(metric, threshold)| ctx.value(metric) > threshold);
    if ctx.value(Metric::Performance) > 80.0 && gate_open {
        out.push(config.performance_lesson.to_string());
    }

    out
}
