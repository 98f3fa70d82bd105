#![deny(warnings)]

//! Core domain models and invariants for the SDLC project simulation.
//!
//! This crate defines the serializable scenario data (scenarios, phases,
//! decisions and their consequence maps), the project-health [`Context`]
//! that decisions act upon, and validation helpers that guarantee the
//! invariants the controller and the outcome calculator rely on.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Marker that flags a failure point when a consequence map does not declare one.
pub const FAILURE_MARKER: &str = "FAILURE";

/// Success metrics averaged on the baseline track.
pub const BASELINE_SUCCESS_METRICS: [Metric; 4] = [
    Metric::UserSatisfaction,
    Metric::Security,
    Metric::Performance,
    Metric::Reputation,
];

/// Success metrics averaged on the augmented track.
pub const AUGMENTED_SUCCESS_METRICS: [Metric; 5] = [
    Metric::UserSatisfaction,
    Metric::Security,
    Metric::Performance,
    Metric::Reputation,
    Metric::AiEfficiency,
];

/// Scenario family. Each track has its own metric set and scoring rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Track {
    /// Traditional process.
    Baseline,
    /// Process enhanced with AI tooling; carries `aiEfficiency`.
    Augmented,
}

impl Track {
    /// Metrics whose mean is the success score of a run.
    pub fn success_metrics(self) -> &'static [Metric] {
        match self {
            Track::Baseline => &BASELINE_SUCCESS_METRICS,
            Track::Augmented => &AUGMENTED_SUCCESS_METRICS,
        }
    }

    /// Parse a track name as written in scenario files and on the command line.
    pub fn parse(s: &str) -> Option<Track> {
        match s.trim().to_ascii_lowercase().as_str() {
            "baseline" => Some(Track::Baseline),
            "augmented" => Some(Track::Augmented),
            _ => None,
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Track::Baseline => f.pad("baseline"),
            Track::Augmented => f.pad("augmented"),
        }
    }
}

/// A project-health metric tracked in a [`Context`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    /// Money spent so far (lower is better).
    Budget,
    /// Elapsed months (lower is better).
    Timeline,
    /// Head count; fixed for the whole run.
    TeamSize,
    /// Percentage-like.
    UserSatisfaction,
    /// Percentage-like.
    Security,
    /// Percentage-like.
    Performance,
    /// Percentage-like.
    Reputation,
    /// Percentage-like; augmented track only.
    AiEfficiency,
}

impl Metric {
    /// Every metric in display order.
    pub const ALL: [Metric; 8] = [
        Metric::Budget,
        Metric::Timeline,
        Metric::TeamSize,
        Metric::UserSatisfaction,
        Metric::Security,
        Metric::Performance,
        Metric::Reputation,
        Metric::AiEfficiency,
    ];

    /// Key used in scenario files and consequence maps.
    pub fn key(self) -> &'static str {
        match self {
            Metric::Budget => "budget",
            Metric::Timeline => "timeline",
            Metric::TeamSize => "teamSize",
            Metric::UserSatisfaction => "userSatisfaction",
            Metric::Security => "security",
            Metric::Performance => "performance",
            Metric::Reputation => "reputation",
            Metric::AiEfficiency => "aiEfficiency",
        }
    }

    /// Resolve a consequence-map key. Unknown keys yield `None`.
    pub fn from_key(key: &str) -> Option<Metric> {
        Metric::ALL.into_iter().find(|m| m.key() == key)
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Metric::Budget => "Budget",
            Metric::Timeline => "Timeline",
            Metric::TeamSize => "Team Size",
            Metric::UserSatisfaction => "User Satisfaction",
            Metric::Security => "Security",
            Metric::Performance => "Performance",
            Metric::Reputation => "Reputation",
            Metric::AiEfficiency => "AI Efficiency",
        }
    }

    /// Budget and timeline improve as they shrink.
    pub fn lower_is_better(self) -> bool {
        matches!(self, Metric::Budget | Metric::Timeline)
    }

    /// Percentage-like metrics live in `[0, 100]`.
    pub fn is_percentage(self) -> bool {
        !matches!(self, Metric::Budget | Metric::Timeline | Metric::TeamSize)
    }

    /// Whether consequence deltas may change this metric.
    pub fn is_mutable(self) -> bool {
        self != Metric::TeamSize
    }

    /// Clamp a value into this metric's admissible range.
    pub fn clamp(self, value: f64) -> f64 {
        match self {
            Metric::Budget => value.max(0.0),
            Metric::Timeline => value.max(1.0),
            Metric::TeamSize => value,
            _ => value.clamp(0.0, 100.0),
        }
    }

    /// Display a value with this metric's unit, e.g. `$85,000`, `9 months`, `45%`.
    pub fn format_value(self, value: f64) -> String {
        let sign = if value < 0.0 { "-" } else { "" };
        match self {
            Metric::Budget => format!("{sign}${}", group_thousands(value)),
            Metric::Timeline => format!("{sign}{} {}", format_amount(value.abs()), months(value)),
            Metric::TeamSize => format!("{sign}{} people", format_amount(value.abs())),
            _ => format!("{sign}{}%", format_amount(value.abs())),
        }
    }

    /// Display a signed delta, e.g. `-$15,000`, `-3 months`, `+20%`.
    ///
    /// The sign follows the displayed value, so `-0.4` dollars prints as `$0`.
    pub fn format_delta(self, delta: f64) -> String {
        let shown = match self {
            Metric::Budget => delta.round(),
            _ => (delta * 10.0).round() / 10.0,
        };
        let sign = if shown > 0.0 {
            "+"
        } else if shown < 0.0 {
            "-"
        } else {
            ""
        };
        match self {
            Metric::Budget => format!("{sign}${}", group_thousands(shown)),
            Metric::Timeline => format!("{sign}{} {}", format_amount(shown.abs()), months(shown)),
            Metric::TeamSize => format!("{sign}{}", format_amount(shown.abs())),
            _ => format!("{sign}{}%", format_amount(shown.abs())),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

fn months(value: f64) -> &'static str {
    if value.abs() == 1.0 {
        "month"
    } else {
        "months"
    }
}

/// Whole numbers print without decimals, everything else with one.
pub fn format_amount(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{rounded:.0}")
    } else {
        format!("{rounded:.1}")
    }
}

fn group_thousands(value: f64) -> String {
    let digits = (value.abs().round() as u64).to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Project-health metrics of a run. The metric set is fixed by the
/// scenario's initial context; updates never add or remove metrics.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(BTreeMap<Metric, f64>);

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, used to author contexts in code.
    pub fn with(mut self, metric: Metric, value: f64) -> Self {
        self.0.insert(metric, value);
        self
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.0.get(&metric).copied()
    }

    /// Value of `metric`, or 0 when the context does not track it.
    pub fn value(&self, metric: Metric) -> f64 {
        self.get(metric).unwrap_or(0.0)
    }

    pub fn contains(&self, metric: Metric) -> bool {
        self.0.contains_key(&metric)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Tracked metrics in display order.
    pub fn metrics(&self) -> impl Iterator<Item = Metric> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        self.0.iter().map(|(m, v)| (*m, *v))
    }

    /// Add `delta` to a tracked metric. Untracked metrics are left alone and
    /// `false` is returned.
    pub fn add(&mut self, metric: Metric, delta: f64) -> bool {
        match self.0.get_mut(&metric) {
            Some(v) => {
                *v += delta;
                true
            }
            None => false,
        }
    }

    /// Clamp every metric into its admissible range.
    pub fn clamped(mut self) -> Self {
        for (metric, value) in self.0.iter_mut() {
            *value = Metric::clamp(*metric, *value);
        }
        self
    }

    /// Whether every metric already sits inside its admissible range.
    pub fn is_within_bounds(&self) -> bool {
        self.iter().all(|(m, v)| v.is_finite() && m.clamp(v) == v)
    }

    /// Functional update: the context after `consequences`, clamped.
    pub fn apply(&self, consequences: &Consequences) -> Context {
        let mut next = self.clone();
        for (metric, delta) in consequences.effective_deltas(self) {
            next.add(metric, delta);
        }
        next.clamped()
    }
}

impl FromIterator<(Metric, f64)> for Context {
    fn from_iter<I: IntoIterator<Item = (Metric, f64)>>(iter: I) -> Self {
        Context(iter.into_iter().collect())
    }
}

/// Per-decision consequence map: metric deltas plus narrative metadata.
///
/// In scenario files the deltas sit next to the reserved `outcome` and
/// `nextPhase` keys. Keys that are not metrics of the live context are
/// ignored when the map is applied.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawConsequences")]
pub struct Consequences {
    /// Narrative describing what happened.
    #[serde(default)]
    pub outcome: String,
    /// Informational only; phases always advance sequentially.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure_point: Option<bool>,
    /// Raw metric deltas keyed as written in the data.
    #[serde(flatten)]
    pub deltas: BTreeMap<String, f64>,
}

/// Wire form of [`Consequences`]: extra keys may carry any value.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConsequences {
    #[serde(default)]
    outcome: String,
    #[serde(default)]
    next_phase: Option<String>,
    #[serde(default)]
    failure_point: Option<bool>,
    #[serde(flatten)]
    extra: BTreeMap<String, RawValue>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Number(f64),
    Other(serde::de::IgnoredAny),
}

impl From<RawConsequences> for Consequences {
    fn from(raw: RawConsequences) -> Self {
        let mut deltas = BTreeMap::new();
        for (key, value) in raw.extra {
            match value {
                RawValue::Number(n) => {
                    deltas.insert(key, n);
                }
                RawValue::Other(value) => {
                    debug!(%key, ?value, "non-numeric consequence key ignored")
                }
            }
        }
        Consequences {
            outcome: raw.outcome,
            next_phase: raw.next_phase,
            failure_point: raw.failure_point,
            deltas,
        }
    }
}

impl Consequences {
    pub fn new(outcome: impl Into<String>) -> Self {
        Self {
            outcome: outcome.into(),
            ..Self::default()
        }
    }

    /// Builder-style delta on a known metric.
    pub fn delta(mut self, metric: Metric, delta: f64) -> Self {
        self.deltas.insert(metric.key().to_string(), delta);
        self
    }

    /// Builder-style delta on an arbitrary key.
    pub fn raw_delta(mut self, key: impl Into<String>, delta: f64) -> Self {
        self.deltas.insert(key.into(), delta);
        self
    }

    pub fn next_phase(mut self, phase_id: impl Into<String>) -> Self {
        self.next_phase = Some(phase_id.into());
        self
    }

    /// Declare explicitly whether this outcome is a critical failure point.
    pub fn failure_point(mut self, failure: bool) -> Self {
        self.failure_point = Some(failure);
        self
    }

    /// The declared flag, or the presence of [`FAILURE_MARKER`] in the
    /// outcome when the data leaves it undeclared.
    pub fn is_failure_point(&self) -> bool {
        self.failure_point
            .unwrap_or_else(|| self.outcome.contains(FAILURE_MARKER))
    }

    /// Deltas that actually apply to `context`, in key order.
    pub fn effective_deltas(&self, context: &Context) -> Vec<(Metric, f64)> {
        let mut out = Vec::with_capacity(self.deltas.len());
        for (key, delta) in &self.deltas {
            match Metric::from_key(key) {
                Some(metric) if metric.is_mutable() && context.contains(metric) => {
                    out.push((metric, *delta));
                }
                Some(Metric::TeamSize) => debug!(%key, "team size is fixed; delta ignored"),
                _ => debug!(%key, "consequence key not tracked by context; ignored"),
            }
        }
        out
    }

    /// A map that moves no tracked metric and tells no story is inert.
    pub fn is_inert(&self, context: &Context) -> bool {
        self.effective_deltas(context).is_empty() && self.outcome.trim().is_empty()
    }
}

/// One selectable option within a phase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub consequences: Consequences,
}

/// One sequential stage of a scenario.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub narrative: String,
    pub decisions: Vec<Decision>,
}

impl Phase {
    pub fn decision(&self, id: &str) -> Option<&Decision> {
        self.decisions.iter().find(|d| d.id == id)
    }
}

/// An immutable scenario definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub track: Track,
    /// Seed of every run; never mutated.
    pub initial_context: Context,
    pub phases: Vec<Phase>,
}

impl Scenario {
    pub fn phase(&self, index: usize) -> Option<&Phase> {
        self.phases.get(index)
    }

    pub fn phase_count(&self) -> usize {
        self.phases.len()
    }
}

/// Append-only record of one completed phase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub phase_id: String,
    pub phase_title: String,
    pub decision_id: String,
    pub decision_title: String,
    pub consequences: Consequences,
    pub outcome_text: String,
    pub failure_point: bool,
}

impl HistoryEntry {
    pub fn record(phase: &Phase, decision: &Decision) -> Self {
        Self {
            phase_id: phase.id.clone(),
            phase_title: phase.title.clone(),
            decision_id: decision.id.clone(),
            decision_title: decision.title.clone(),
            consequences: decision.consequences.clone(),
            outcome_text: decision.consequences.outcome.clone(),
            failure_point: decision.consequences.is_failure_point(),
        }
    }
}

/// Validation errors for scenario invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Scenario, phase or decision id is blank.
    #[error("blank identifier in scenario {0:?}")]
    BlankId(String),
    /// Scenario has no phases.
    #[error("scenario {0} has no phases")]
    NoPhases(String),
    /// Phase offers nothing to choose.
    #[error("phase {0} has no decisions")]
    EmptyPhase(String),
    /// Phase ids must be unique within a scenario.
    #[error("duplicate phase id: {0}")]
    DuplicatePhase(String),
    /// Decision ids must be unique within a phase.
    #[error("duplicate decision id {decision} in phase {phase}")]
    DuplicateDecision { phase: String, decision: String },
    /// Required metric missing from the initial context.
    #[error("initial context is missing {0}")]
    MissingMetric(Metric),
    /// Metric not allowed on this track.
    #[error("{metric} is not tracked on the {track} track")]
    UnexpectedMetric { metric: Metric, track: Track },
    /// Budget and timeline must start strictly positive.
    #[error("initial {0} must be > 0")]
    NonPositiveBaseline(Metric),
    /// Initial value outside its admissible range.
    #[error("initial {metric} = {value} is out of range")]
    OutOfRange { metric: Metric, value: f64 },
}

/// Validate a scenario before any run starts from it.
pub fn validate_scenario(s: &Scenario) -> Result<(), ValidationError> {
    if s.id.trim().is_empty() || s.title.trim().is_empty() {
        return Err(ValidationError::BlankId(s.id.clone()));
    }
    validate_initial_context(&s.initial_context, s.track)?;
    if s.phases.is_empty() {
        return Err(ValidationError::NoPhases(s.id.clone()));
    }

    let mut phase_ids: BTreeSet<&str> = BTreeSet::new();
    for phase in &s.phases {
        if phase.id.trim().is_empty() {
            return Err(ValidationError::BlankId(s.id.clone()));
        }
        if !phase_ids.insert(phase.id.as_str()) {
            return Err(ValidationError::DuplicatePhase(phase.id.clone()));
        }
        if phase.decisions.is_empty() {
            return Err(ValidationError::EmptyPhase(phase.id.clone()));
        }
        let mut decision_ids: BTreeSet<&str> = BTreeSet::new();
        for d in &phase.decisions {
            if d.id.trim().is_empty() {
                return Err(ValidationError::BlankId(s.id.clone()));
            }
            if !decision_ids.insert(d.id.as_str()) {
                return Err(ValidationError::DuplicateDecision {
                    phase: phase.id.clone(),
                    decision: d.id.clone(),
                });
            }
            if d.consequences.is_inert(&s.initial_context) {
                warn!(scenario = %s.id, phase = %phase.id, decision = %d.id, "consequence map is inert");
            }
        }
    }
    Ok(())
}

/// Validate the metric set and starting values of an initial context.
pub fn validate_initial_context(ctx: &Context, track: Track) -> Result<(), ValidationError> {
    for metric in [Metric::Budget, Metric::Timeline]
        .into_iter()
        .chain(track.success_metrics().iter().copied())
    {
        if !ctx.contains(metric) {
            return Err(ValidationError::MissingMetric(metric));
        }
    }
    if track == Track::Baseline && ctx.contains(Metric::AiEfficiency) {
        return Err(ValidationError::UnexpectedMetric {
            metric: Metric::AiEfficiency,
            track,
        });
    }
    for (metric, value) in ctx.iter() {
        if !value.is_finite() || metric.clamp(value) != value {
            return Err(ValidationError::OutOfRange { metric, value });
        }
    }
    for metric in [Metric::Budget, Metric::Timeline] {
        if ctx.value(metric) <= 0.0 {
            return Err(ValidationError::NonPositiveBaseline(metric));
        }
    }
    Ok(())
}
