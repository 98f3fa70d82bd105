#![deny(warnings)]

//! Run-time side of the simulation.
//!
//! The [`SimulationController`] owns the single live context and decision
//! history of a run. The presenter, tracker and reporter are read-only views
//! over the controller's snapshots.

pub mod controller;
pub mod presenter;
pub mod report;
pub mod tracker;

pub use controller::{DecisionReceipt, SimError, SimState, SimulationController};
pub use presenter::{confirm, impact_preview, present, present_current, DecisionOption, ImpactLine, Sign};
pub use report::{build_report, report_for, NavTarget, ResultsAction, RunReport};
pub use tracker::{track, track_controller, Health, MetricStatus, TrackerView};
