//! Vessels keyed by host guid, rebuilt by mark and sweep every frame.

use crate::error::{PluginError, PluginResult};
use crate::flight_plan::FlightPlan;
use crate::geometry::{Instant, StateVector};
use crate::integrator::{AccelerationField, AdaptiveStepIntegrator, FixedStepIntegrator};
use crate::trajectory::DiscreteTrajectory;
use arrayvec::ArrayString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

pub const MAX_GUID_LENGTH: usize = 64;

pub type Guid = ArrayString<MAX_GUID_LENGTH>;

pub fn parse_guid(text: &str) -> PluginResult<Guid> {
    if text.is_empty() {
        return Err(PluginError::malformed("guid", "empty"));
    }
    Guid::from(text).map_err(|_| {
        PluginError::malformed("guid", alloc::format!("longer than {MAX_GUID_LENGTH} bytes"))
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vessel {
    parent: i32,
    kept: bool,
    // Starts on the first state; authoritative points lie on the history grid.
    history: DiscreteTrajectory,
    // State at the current time, recomputed from the last history point.
    prolongation: Option<(Instant, StateVector)>,
    prediction: DiscreteTrajectory,
    flight_plan: FlightPlan,
}

impl Vessel {
    fn new(parent: i32) -> Self {
        Self {
            parent,
            kept: true,
            history: DiscreteTrajectory::new(),
            prolongation: None,
            prediction: DiscreteTrajectory::new(),
            flight_plan: FlightPlan::new(),
        }
    }

    pub fn parent(&self) -> i32 {
        self.parent
    }

    pub fn is_kept(&self) -> bool {
        self.kept
    }

    pub fn has_state(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn history(&self) -> &DiscreteTrajectory {
        &self.history
    }

    pub fn prediction(&self) -> &DiscreteTrajectory {
        &self.prediction
    }

    pub fn flight_plan(&self) -> &FlightPlan {
        &self.flight_plan
    }

    pub fn flight_plan_mut(&mut self) -> &mut FlightPlan {
        &mut self.flight_plan
    }

    /// Latest known barycentric state.
    pub fn last_state(&self) -> Option<(Instant, StateVector)> {
        match (self.prolongation, self.history.last()) {
            (Some(prolongation), Some(last)) if prolongation.0 > last.0 => Some(prolongation),
            (_, last) => last,
        }
    }

    /// History followed by the prolongation.
    pub fn trajectory_points(&self) -> Vec<(Instant, StateVector)> {
        let mut points: Vec<_> = self.history.iter().collect();
        if let Some(prolongation) = self.prolongation {
            if points.last().map_or(true, |(t, _)| prolongation.0 > *t) {
                points.push(prolongation);
            }
        }
        points
    }

    fn set_state(&mut self, t: Instant, barycentric: StateVector) {
        self.history = DiscreteTrajectory::starting_at(t, barycentric);
        self.prolongation = None;
    }

    /// Integrates freely to `t`, appending every history grid point passed.
    pub fn advance<F: AccelerationField + ?Sized>(
        &mut self,
        field: &F,
        integrator: &FixedStepIntegrator,
        history_step: f64,
        t: Instant,
    ) {
        let Some(mut last) = self.history.last() else {
            return;
        };
        loop {
            let next = last.0.plus(history_step);
            if next > t {
                break;
            }
            let state = integrator.integrate(field, last, next);
            self.history.append(next, state);
            last = (next, state);
        }
        self.prolongation = Some((t, integrator.integrate(field, last, t)));
    }

    /// Places the vessel where the host's physics put it. Every such point is
    /// kept so free flight resumes from it.
    pub fn follow(&mut self, t: Instant, barycentric: StateVector) {
        self.history.forget_after(t);
        if !self.history.append(t, barycentric) {
            self.history.replace_last(barycentric);
        }
        self.prolongation = None;
    }

    pub fn forget_before(&mut self, t: Instant) {
        self.history.forget_before_keeping_bracket(t);
    }

    /// Coasts for `length` from the end of the last planned burn, or from the
    /// current state when no burn has been computed.
    pub fn update_prediction<F: AccelerationField + ?Sized>(
        &mut self,
        field: &F,
        integrator: &AdaptiveStepIntegrator,
        length: f64,
    ) -> bool {
        let Some(start) = self.flight_plan.last_burn_end().or_else(|| self.last_state()) else {
            return false;
        };
        let mut prediction = DiscreteTrajectory::starting_at(start.0, start.1);
        let outcome = integrator.integrate(field, &mut prediction, start.0.plus(length));
        self.prediction = prediction;
        !outcome.truncated
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VesselRegistry {
    vessels: BTreeMap<Guid, Vessel>,
}

impl VesselRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vessels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vessels.is_empty()
    }

    pub fn contains(&self, guid: &Guid) -> bool {
        self.vessels.contains_key(guid)
    }

    pub fn get(&self, guid: &Guid) -> PluginResult<&Vessel> {
        self.vessels.get(guid).ok_or_else(|| PluginError::UnknownVessel(guid.to_string()))
    }

    pub fn get_mut(&mut self, guid: &Guid) -> PluginResult<&mut Vessel> {
        self.vessels.get_mut(guid).ok_or_else(|| PluginError::UnknownVessel(guid.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Guid, &Vessel)> {
        self.vessels.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Guid, &mut Vessel)> {
        self.vessels.iter_mut()
    }

    /// Marks the vessel as seen this frame and refreshes its parent. Returns
    /// `true` if the vessel was not known.
    pub fn insert_or_keep(&mut self, guid: Guid, parent: i32) -> bool {
        match self.vessels.get_mut(&guid) {
            Some(vessel) => {
                vessel.kept = true;
                vessel.parent = parent;
                false
            }
            None => {
                self.vessels.insert(guid, Vessel::new(parent));
                debug!("inserted vessel {} under {}", guid, parent);
                true
            }
        }
    }

    pub fn keep(&mut self, guid: &Guid) -> PluginResult<()> {
        self.get_mut(guid)?.kept = true;
        Ok(())
    }

    /// Sets the barycentric state of a vessel that has none yet.
    pub fn set_initial_state(&mut self, guid: &Guid, t: Instant, barycentric: StateVector) -> PluginResult<()> {
        let vessel = self.get_mut(guid)?;
        if vessel.has_state() {
            return Err(PluginError::VesselStateAlreadySet(guid.to_string()));
        }
        vessel.set_state(t, barycentric);
        Ok(())
    }

    /// First kept vessel that still has no state.
    pub fn first_kept_without_state(&self) -> Option<&Guid> {
        self.vessels
            .iter()
            .find(|(_, vessel)| vessel.kept && !vessel.has_state())
            .map(|(guid, _)| guid)
    }

    /// Removes every vessel not kept since the last reset.
    pub fn prune_unkept(&mut self) -> usize {
        let before = self.vessels.len();
        self.vessels.retain(|guid, vessel| {
            if !vessel.kept {
                debug!("pruning vessel {}", guid);
            }
            vessel.kept
        });
        before - self.vessels.len()
    }

    pub fn reset_kept(&mut self) {
        for vessel in self.vessels.values_mut() {
            vessel.kept = false;
        }
    }
}
