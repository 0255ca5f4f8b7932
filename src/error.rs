//! Error types for the plugin session protocol

use crate::geometry::StateVector;
use crate::plugin::Phase;
use thiserror::Error;

/// Result type for plugin operations
pub type PluginResult<T> = Result<T, PluginError>;

/// Coarse classification of every failure the protocol can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An operation called out of order or outside its phase.
    Sequencing,
    /// A guid, body index or handle the engine does not know.
    UnknownReference,
    /// Input that failed validation or parsing.
    MalformedInput,
    /// Use of a resource past its lifetime.
    ResourceLifetime,
}

/// Errors reported synchronously by the plugin. No variant is recoverable by
/// the engine itself; the state is left exactly as it was before the call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PluginError {
    #[error("{operation} is not allowed while the plugin is {phase}")]
    WrongPhase { operation: &'static str, phase: Phase },

    #[error("time {requested} precedes the current time {current}")]
    TimeOrdering { requested: f64, current: f64 },

    #[error("cannot forget history before {requested}, which is after the current time {current}")]
    ForgetAfterCurrentTime { requested: f64, current: f64 },

    #[error("state of vessel {0} was already set")]
    VesselStateAlreadySet(String),

    #[error("vessel {0} has no state yet")]
    VesselStateUnset(String),

    #[error("celestial {0} is the root and cannot be reparented")]
    ReparentRoot(i32),

    #[error("making {parent} the parent of {body} would create a cycle")]
    HierarchyCycle { body: i32, parent: i32 },

    #[error("celestial {0} was already inserted")]
    DuplicateBody(i32),

    #[error("a root celestial was already inserted")]
    RootAlreadyInserted,

    #[error("initialization ended without a root celestial")]
    NoRoot,

    #[error("unknown celestial {0}")]
    UnknownBody(i32),

    #[error("celestial {0} is the root and has no parent")]
    NoParent(i32),

    #[error("unknown vessel {0}")]
    UnknownVessel(String),

    #[error("{kind} handle {raw:#x} is stale or was never issued")]
    StaleHandle { kind: &'static str, raw: u64 },

    #[error("{kind} still has {count} live dependent handle(s)")]
    LiveDependents { kind: &'static str, count: usize },

    #[error("transforms belong to a different plugin")]
    ForeignTransforms,

    #[error("iterator is at its end")]
    IteratorExhausted,

    #[error("physics bubble is empty")]
    BubbleEmpty,

    #[error("vessel {0} has no prediction")]
    NoPrediction(String),

    #[error("flight plan phase {phase} is out of range, the plan has {size} segment(s)")]
    FlightPlanPhaseOutOfRange { phase: usize, size: usize },

    #[error("manoeuvre index {index} is out of range, the plan has {count} manoeuvre(s)")]
    ManoeuvreIndexOutOfRange { index: usize, count: usize },

    #[error("flight plan is full")]
    FlightPlanFull,

    #[error("flight plan is inconsistent at manoeuvre {index}: {reason}")]
    FlightPlanInconsistent { index: usize, reason: String },

    #[error("malformed {field}: {reason}")]
    MalformedInput { field: String, reason: String },

    #[error("invalid {field}: {reason}")]
    InvalidParameter { field: &'static str, reason: String },

    #[error("corrupt snapshot ({context}): {reason}")]
    CorruptSnapshot { context: &'static str, reason: String },

    #[error("snapshot encoding failed: {0}")]
    SnapshotEncoding(String),
}

impl PluginError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PluginError::WrongPhase { .. }
            | PluginError::TimeOrdering { .. }
            | PluginError::ForgetAfterCurrentTime { .. }
            | PluginError::VesselStateAlreadySet(_)
            | PluginError::VesselStateUnset(_)
            | PluginError::ReparentRoot(_)
            | PluginError::HierarchyCycle { .. }
            | PluginError::DuplicateBody(_)
            | PluginError::RootAlreadyInserted
            | PluginError::NoRoot
            | PluginError::BubbleEmpty
            | PluginError::NoPrediction(_)
            | PluginError::FlightPlanInconsistent { .. } => ErrorKind::Sequencing,

            PluginError::UnknownBody(_)
            | PluginError::NoParent(_)
            | PluginError::UnknownVessel(_)
            | PluginError::StaleHandle { .. }
            | PluginError::ForeignTransforms
            | PluginError::FlightPlanPhaseOutOfRange { .. }
            | PluginError::ManoeuvreIndexOutOfRange { .. } => ErrorKind::UnknownReference,

            PluginError::MalformedInput { .. }
            | PluginError::InvalidParameter { .. }
            | PluginError::CorruptSnapshot { .. }
            | PluginError::SnapshotEncoding(_)
            | PluginError::FlightPlanFull => ErrorKind::MalformedInput,

            PluginError::LiveDependents { .. }
            | PluginError::IteratorExhausted => ErrorKind::ResourceLifetime,
        }
    }

    pub(crate) fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        PluginError::MalformedInput { field: field.into(), reason: reason.into() }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        PluginError::InvalidParameter { field, reason: reason.into() }
    }
}

/// Rejects NaN and infinite values for a host-supplied scalar.
pub(crate) fn require_finite(field: &'static str, value: f64) -> PluginResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PluginError::invalid(field, alloc::format!("{value} is not finite")))
    }
}

/// Rejects a state vector with any NaN or infinite component.
pub(crate) fn require_finite_state(field: &'static str, state: &StateVector) -> PluginResult<()> {
    if state.is_finite() {
        Ok(())
    } else {
        Err(PluginError::invalid(field, "state has a non-finite component"))
    }
}

/// Rejects anything that is not a finite, strictly positive value.
pub(crate) fn require_positive(field: &'static str, value: f64) -> PluginResult<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(PluginError::invalid(field, alloc::format!("{value} must be finite and positive")))
    }
}
