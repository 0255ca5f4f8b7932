//! A vessel's ordered list of manoeuvres and its realized trajectory.

use crate::error::{PluginError, PluginResult};
use crate::geometry::{Instant, StateVector, Vec3};
use crate::integrator::{AccelerationField, AdaptiveStepIntegrator};
use crate::manoeuvre::Manoeuvre;
use crate::trajectory::DiscreteTrajectory;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const MAX_MANOEUVRES: usize = 16;

/// Gravity plus the thrust of one burn.
struct BurnField<'a, F: ?Sized> {
    gravity: &'a F,
    manoeuvre: &'a Manoeuvre,
}

impl<F: AccelerationField + ?Sized> AccelerationField for BurnField<'_, F> {
    fn acceleration(&self, t: Instant, q: &Vec3) -> Vec3 {
        self.gravity.acceleration(t, q) + self.manoeuvre.acceleration(t)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightPlan {
    manoeuvres: heapless::Vec<Manoeuvre, MAX_MANOEUVRES>,
    // coast, burn, coast, ..., coast; empty until the next update
    segments: Vec<DiscreteTrajectory>,
}

impl FlightPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.manoeuvres.len()
    }

    pub fn manoeuvres(&self) -> &[Manoeuvre] {
        &self.manoeuvres
    }

    pub fn get(&self, index: usize) -> PluginResult<&Manoeuvre> {
        self.manoeuvres
            .get(index)
            .ok_or(PluginError::ManoeuvreIndexOutOfRange { index, count: self.count() })
    }

    pub fn set(&mut self, index: usize, manoeuvre: Manoeuvre) -> PluginResult<()> {
        let count = self.count();
        let slot = self
            .manoeuvres
            .get_mut(index)
            .ok_or(PluginError::ManoeuvreIndexOutOfRange { index, count })?;
        *slot = manoeuvre;
        self.segments.clear();
        Ok(())
    }

    /// Inserts at `index`, shifting later manoeuvres up. `index == count`
    /// appends.
    pub fn insert(&mut self, index: usize, manoeuvre: Manoeuvre) -> PluginResult<()> {
        let count = self.count();
        if index > count {
            return Err(PluginError::ManoeuvreIndexOutOfRange { index, count });
        }
        self.manoeuvres.push(manoeuvre).map_err(|_| PluginError::FlightPlanFull)?;
        self.manoeuvres[index..].rotate_right(1);
        self.segments.clear();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.manoeuvres.clear();
        self.segments.clear();
    }

    /// Number of computed segments, zero until [`FlightPlan::update`].
    pub fn size(&self) -> usize {
        self.segments.len()
    }

    pub fn segment(&self, phase: usize) -> PluginResult<&DiscreteTrajectory> {
        self.segments
            .get(phase)
            .ok_or(PluginError::FlightPlanPhaseOutOfRange { phase, size: self.size() })
    }

    /// End of the last burn, where the unplanned coast begins.
    pub fn last_burn_end(&self) -> Option<(Instant, StateVector)> {
        if self.manoeuvres.is_empty() {
            return None;
        }
        let burn = 2 * self.manoeuvres.len() - 1;
        self.segments.get(burn).and_then(DiscreteTrajectory::last)
    }

    pub fn validate(&self, current_time: Instant, last_time: Instant) -> PluginResult<()> {
        let mut earliest = current_time;
        for (index, manoeuvre) in self.manoeuvres.iter().enumerate() {
            if manoeuvre.initial_time() < earliest {
                let reason = if index == 0 {
                    alloc::format!("starts at {} before the current time {}", manoeuvre.initial_time(), current_time)
                } else {
                    alloc::format!("starts at {} before the previous burn ends at {}", manoeuvre.initial_time(), earliest)
                };
                return Err(PluginError::FlightPlanInconsistent { index, reason });
            }
            earliest = manoeuvre.final_time();
        }
        if last_time < earliest {
            return Err(PluginError::FlightPlanInconsistent {
                index: self.count(),
                reason: alloc::format!("last time {last_time} precedes {earliest}"),
            });
        }
        Ok(())
    }

    /// Recomputes every segment from `start` to `last_time`. Integration stops
    /// at the first segment truncated by the step budget.
    pub fn update<F: AccelerationField + ?Sized>(
        &mut self,
        gravity: &F,
        integrator: &AdaptiveStepIntegrator,
        start: (Instant, StateVector),
        last_time: Instant,
    ) -> PluginResult<()> {
        self.validate(start.0, last_time)?;
        self.segments.clear();

        let mut from = start;
        for manoeuvre in self.manoeuvres.iter() {
            let Some(end) = push_segment(&mut self.segments, gravity, integrator, from, manoeuvre.initial_time()) else {
                return Ok(());
            };
            let burn = BurnField { gravity, manoeuvre };
            let Some(end) = push_segment(&mut self.segments, &burn, integrator, end, manoeuvre.final_time()) else {
                return Ok(());
            };
            from = end;
        }
        push_segment(&mut self.segments, gravity, integrator, from, last_time);
        debug!("flight plan updated with {} segment(s)", self.segments.len());
        Ok(())
    }
}

fn push_segment<F: AccelerationField + ?Sized>(
    segments: &mut Vec<DiscreteTrajectory>,
    field: &F,
    integrator: &AdaptiveStepIntegrator,
    from: (Instant, StateVector),
    to: Instant,
) -> Option<(Instant, StateVector)> {
    let mut segment = DiscreteTrajectory::starting_at(from.0, from.1);
    let outcome = integrator.integrate(field, &mut segment, to);
    let end = segment.last();
    segments.push(segment);
    if outcome.truncated {
        warn!("flight plan segment {} truncated at {}", segments.len() - 1, outcome.reached);
        return None;
    }
    end
}
