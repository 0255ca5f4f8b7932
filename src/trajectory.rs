//! Time-indexed sequences of barycentric states.

use crate::geometry::{hermite, Instant, StateVector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Bound;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscreteTrajectory {
    timeline: BTreeMap<Instant, StateVector>,
}

impl DiscreteTrajectory {
    pub fn new() -> Self {
        Self { timeline: BTreeMap::new() }
    }

    pub fn starting_at(time: Instant, state: StateVector) -> Self {
        let mut trajectory = Self::new();
        trajectory.timeline.insert(time, state);
        trajectory
    }

    /// Appends a point. Times must be strictly increasing; a point at or
    /// before the last time is ignored and `false` is returned.
    pub fn append(&mut self, time: Instant, state: StateVector) -> bool {
        if let Some((last, _)) = self.last() {
            if time <= last {
                return false;
            }
        }
        self.timeline.insert(time, state);
        true
    }

    /// Overwrites the state of the last point, keeping its time.
    pub fn replace_last(&mut self, state: StateVector) {
        if let Some(last) = self.timeline.values_mut().next_back() {
            *last = state;
        }
    }

    pub fn len(&self) -> usize {
        self.timeline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }

    pub fn first(&self) -> Option<(Instant, StateVector)> {
        self.timeline.iter().next().map(|(t, s)| (*t, *s))
    }

    pub fn last(&self) -> Option<(Instant, StateVector)> {
        self.timeline.iter().next_back().map(|(t, s)| (*t, *s))
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (Instant, StateVector)> + '_ {
        self.timeline.iter().map(|(t, s)| (*t, *s))
    }

    /// Points at or after `time`.
    pub fn iter_from(&self, time: Instant) -> impl Iterator<Item = (Instant, StateVector)> + '_ {
        self.timeline.range(time..).map(|(t, s)| (*t, *s))
    }

    /// State at `time`, interpolated between the surrounding points. `None`
    /// outside `[first, last]`.
    pub fn evaluate(&self, time: Instant) -> Option<StateVector> {
        if let Some(state) = self.timeline.get(&time) {
            return Some(*state);
        }
        let (t0, s0) = self.timeline.range(..time).next_back()?;
        let (t1, s1) = self.timeline.range((Bound::Excluded(time), Bound::Unbounded)).next()?;
        Some(hermite(*t0, s0, *t1, s1, time))
    }

    /// Drops every point strictly before `time`.
    pub fn forget_before(&mut self, time: Instant) {
        self.timeline = self.timeline.split_off(&time);
    }

    /// Drops every point strictly before `time` except the latest of them, so
    /// that the trajectory can still be evaluated at `time`.
    pub fn forget_before_keeping_bracket(&mut self, time: Instant) {
        let keep_from = self.timeline.range(..=time).next_back().map(|(t, _)| *t);
        if let Some(keep_from) = keep_from {
            self.forget_before(keep_from);
        }
    }

    /// Drops every point strictly after `time`.
    pub fn forget_after(&mut self, time: Instant) {
        let mut tail = self.timeline.split_off(&time);
        if let Some(state) = tail.remove(&time) {
            self.timeline.insert(time, state);
        }
    }
}
