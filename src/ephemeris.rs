//! Trajectories of the massive bodies.
//!
//! Bodies are integrated jointly on a fixed time grid with velocity-Verlet
//! under point-mass gravity plus the J2 term of oblate bodies. The grid is
//! prolonged on demand; states between grid points are Hermite interpolated.

use crate::error::{require_finite, require_positive, PluginError, PluginResult};
use crate::geometry::{unit_from_spherical, Instant, StateVector, Vec3};
use crate::integrator::AccelerationField;
use crate::trajectory::DiscreteTrajectory;
use serde::{Deserialize, Serialize};

/// Spin-axis oblateness of a body. Only the force model reads it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Oblateness {
    pub axis: Vec3, // unit, barycentric
    pub j2: f64,
    pub reference_radius: f64,
}

impl Oblateness {
    /// Builds the oblateness from the spin axis direction, in radians.
    /// The reference radius must be positive; every value must be finite.
    pub fn new(axis_right_ascension: f64, axis_declination: f64, j2: f64, reference_radius: f64) -> PluginResult<Self> {
        require_finite("axis_right_ascension", axis_right_ascension)?;
        require_finite("axis_declination", axis_declination)?;
        require_finite("j2", j2)?;
        require_positive("reference_radius", reference_radius)?;
        Ok(Self { axis: unit_from_spherical(axis_right_ascension, axis_declination), j2, reference_radius })
    }

    /// Checks a value built field by field: unit axis, finite J2, positive
    /// reference radius.
    pub fn validate(&self) -> PluginResult<()> {
        if !self.axis.iter().all(|x| x.is_finite()) || (self.axis.norm() - 1.0).abs() > 1e-9 {
            return Err(PluginError::invalid("axis", "spin axis must be a finite unit vector"));
        }
        require_finite("j2", self.j2)?;
        require_positive("reference_radius", self.reference_radius)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MassiveBody {
    pub index: i32,
    pub gravitational_parameter: f64,
    pub oblateness: Option<Oblateness>,
}

impl MassiveBody {
    /// Acceleration this body at `centre` imparts on a point at `q`.
    pub fn acceleration_on(&self, centre: &Vec3, q: &Vec3) -> Vec3 {
        let r = q - centre;
        let r2 = r.norm_squared();
        if r2 == 0.0 {
            return Vec3::zeros();
        }
        let r_norm = r2.sqrt();
        let mu = self.gravitational_parameter;
        let mut a = -mu / (r2 * r_norm) * r;

        if let Some(oblateness) = &self.oblateness {
            // a = -3/2 J2 mu R^2 / r^5 [(1 - 5 z^2/r^2) r + 2 z k]
            let z = r.dot(&oblateness.axis);
            let radius2 = oblateness.reference_radius * oblateness.reference_radius;
            let factor = -1.5 * oblateness.j2 * mu * radius2 / (r2 * r2 * r_norm);
            a += factor * ((1.0 - 5.0 * z * z / r2) * r + 2.0 * z * oblateness.axis);
        }
        a
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ephemeris {
    bodies: Vec<MassiveBody>,
    trajectories: Vec<DiscreteTrajectory>,
    step: f64,
}

impl Ephemeris {
    /// Starts the ephemeris at `t0`. `initial` pairs each body with its
    /// barycentric state.
    pub fn new(initial: Vec<(MassiveBody, StateVector)>, t0: Instant, step: f64) -> Self {
        let mut bodies = Vec::with_capacity(initial.len());
        let mut trajectories = Vec::with_capacity(initial.len());
        for (body, state) in initial {
            bodies.push(body);
            trajectories.push(DiscreteTrajectory::starting_at(t0, state));
        }
        Self { bodies, trajectories, step }
    }

    pub fn bodies(&self) -> &[MassiveBody] {
        &self.bodies
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    fn slot(&self, index: i32) -> PluginResult<usize> {
        self.bodies
            .iter()
            .position(|body| body.index == index)
            .ok_or(PluginError::UnknownBody(index))
    }

    pub fn trajectory(&self, index: i32) -> PluginResult<&DiscreteTrajectory> {
        Ok(&self.trajectories[self.slot(index)?])
    }

    /// Last grid time reached by every body.
    pub fn t_max(&self) -> Option<Instant> {
        self.trajectories.iter().filter_map(|trajectory| trajectory.last()).map(|(t, _)| t).min()
    }

    pub fn t_min(&self) -> Option<Instant> {
        self.trajectories.iter().filter_map(|trajectory| trajectory.first()).map(|(t, _)| t).max()
    }

    /// Extends every trajectory on the grid until it covers `t`.
    pub fn prolong(&mut self, t: Instant) {
        let Some(mut last) = self.t_max() else {
            return;
        };
        while last < t {
            self.grid_step(last);
            last = last.plus(self.step);
        }
    }

    fn mutual_accelerations(&self, positions: &[Vec3]) -> Vec<Vec3> {
        positions
            .iter()
            .enumerate()
            .map(|(i, q)| {
                self.bodies
                    .iter()
                    .zip(positions)
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .fold(Vec3::zeros(), |acc, (_, (body, centre))| acc + body.acceleration_on(centre, q))
            })
            .collect()
    }

    fn grid_step(&mut self, t: Instant) {
        let h = self.step;
        let half_h = 0.5 * h;
        let states: Vec<StateVector> = self
            .trajectories
            .iter()
            .map(|trajectory| trajectory.last().map(|(_, s)| s).unwrap_or_else(StateVector::zero))
            .collect();

        let q_old: Vec<Vec3> = states.iter().map(|s| s.q).collect();
        let a_old = self.mutual_accelerations(&q_old);
        let p_half: Vec<Vec3> = states.iter().zip(&a_old).map(|(s, a)| s.p + half_h * a).collect();
        let q_new: Vec<Vec3> = states.iter().zip(&p_half).map(|(s, p)| s.q + h * p).collect();
        let a_new = self.mutual_accelerations(&q_new);

        let next = t.plus(h);
        for (i, trajectory) in self.trajectories.iter_mut().enumerate() {
            trajectory.append(next, StateVector::new(q_new[i], p_half[i] + half_h * a_new[i]));
        }
    }

    /// Barycentric state of body `index` at `t`, which must already be
    /// covered by [`Ephemeris::prolong`].
    pub fn state_of(&self, index: i32, t: Instant) -> PluginResult<StateVector> {
        self.trajectory(index)?.evaluate(t).ok_or_else(|| {
            PluginError::invalid("time", alloc::format!("{t} is outside the ephemeris of celestial {index}"))
        })
    }

    /// Keeps the latest grid point at or before `t` so states at `t` remain
    /// evaluable.
    pub fn forget_before(&mut self, t: Instant) {
        for trajectory in &mut self.trajectories {
            trajectory.forget_before_keeping_bracket(t);
        }
    }

    fn position_for_field(&self, slot: usize, t: Instant) -> Vec3 {
        let trajectory = &self.trajectories[slot];
        if let Some(state) = trajectory.evaluate(t) {
            return state.q;
        }
        // Outside the covered span, clamp to the nearest end.
        match (trajectory.first(), trajectory.last()) {
            (Some((first, s)), _) if t < first => s.q,
            (_, Some((_, s))) => s.q,
            _ => Vec3::zeros(),
        }
    }
}

impl AccelerationField for Ephemeris {
    fn acceleration(&self, t: Instant, q: &Vec3) -> Vec3 {
        self.bodies
            .iter()
            .enumerate()
            .fold(Vec3::zeros(), |acc, (slot, body)| acc + body.acceleration_on(&self.position_for_field(slot, t), q))
    }
}
