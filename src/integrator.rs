//! Reference integrators for massless points (vessels, bubble centres).
//!
//! The protocol treats integration as an opaque capability of the engine.
//! Two schemes are provided, both built on the velocity-Verlet kick-drift-kick
//! step:
//! - [`FixedStepIntegrator`] subdivides an interval into equal steps no longer
//!   than its configured step, used for histories.
//! - [`AdaptiveStepIntegrator`] controls the step by step doubling against a
//!   position and a speed tolerance, used for predictions and flight plans.

use crate::geometry::{Instant, StateVector, Vec3};
use crate::trajectory::DiscreteTrajectory;
use tracing::warn;

/// Total acceleration felt by a massless point.
pub trait AccelerationField {
    fn acceleration(&self, t: Instant, q: &Vec3) -> Vec3;
}

/// One velocity-Verlet step of length `h`.
pub fn verlet_step<F: AccelerationField + ?Sized>(field: &F, t: Instant, state: &StateVector, h: f64) -> StateVector {
    let half_h = 0.5 * h;

    // Kick: p_n+1/2 = p_n + (h/2) a_n
    let a_old = field.acceleration(t, &state.q);
    let p_half = state.p + half_h * a_old;

    // Drift: q_n+1 = q_n + h p_n+1/2
    let q_new = state.q + h * p_half;

    // Kick: p_n+1 = p_n+1/2 + (h/2) a_n+1
    let a_new = field.acceleration(t.plus(h), &q_new);
    StateVector::new(q_new, p_half + half_h * a_new)
}

#[derive(Debug, Clone, Copy)]
pub struct FixedStepIntegrator {
    pub max_step: f64,
}

impl FixedStepIntegrator {
    pub fn new(max_step: f64) -> Self {
        Self { max_step }
    }

    /// Integrates from `start` to `to` in equal steps and returns the final
    /// state. A zero-length interval returns the start state unchanged.
    pub fn integrate<F: AccelerationField + ?Sized>(
        &self,
        field: &F,
        start: (Instant, StateVector),
        to: Instant,
    ) -> StateVector {
        let (from, mut state) = start;
        let span = to.since(from);
        if span <= 0.0 {
            return state;
        }
        let steps = (span / self.max_step).ceil().max(1.0) as usize;
        let h = span / steps as f64;
        for i in 0..steps {
            let t = from.plus(i as f64 * h);
            state = verlet_step(field, t, &state, h);
        }
        state
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AdaptiveStepIntegrator {
    pub length_tolerance: f64,
    pub speed_tolerance: f64,
    pub initial_step: f64,
    pub max_steps: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveOutcome {
    pub reached: Instant,
    pub truncated: bool,
}

const SAFETY_FACTOR: f64 = 0.9;
const MIN_STEP_RATIO: f64 = 0.2;
const MAX_STEP_RATIO: f64 = 5.0;

impl AdaptiveStepIntegrator {
    /// Appends accepted points to `trajectory`, whose last point is the start
    /// of the integration. Stops at `to` or when the step budget runs out.
    pub fn integrate<F: AccelerationField + ?Sized>(
        &self,
        field: &F,
        trajectory: &mut DiscreteTrajectory,
        to: Instant,
    ) -> AdaptiveOutcome {
        let Some((mut t, mut state)) = trajectory.last() else {
            return AdaptiveOutcome { reached: to, truncated: true };
        };
        let mut h = self.initial_step;
        let mut attempts = 0u32;

        while t < to {
            if attempts >= self.max_steps {
                warn!("adaptive integration truncated at {} short of {}", t, to);
                return AdaptiveOutcome { reached: t, truncated: true };
            }
            attempts += 1;

            let remaining = to.since(t);
            let last_step = h >= remaining;
            let step = if last_step { remaining } else { h };

            let full = verlet_step(field, t, &state, step);
            let half = verlet_step(field, t, &state, 0.5 * step);
            let refined = verlet_step(field, t.plus(0.5 * step), &half, 0.5 * step);

            let length_error = (full.q - refined.q).norm() / self.length_tolerance;
            let speed_error = (full.p - refined.p).norm() / self.speed_tolerance;
            let error_ratio = length_error.max(speed_error);

            // Verlet has a local error of order three.
            let factor = if error_ratio > 0.0 {
                (SAFETY_FACTOR * error_ratio.powf(-1.0 / 3.0)).clamp(MIN_STEP_RATIO, MAX_STEP_RATIO)
            } else {
                MAX_STEP_RATIO
            };

            if error_ratio <= 1.0 {
                let next = if last_step { to } else { t.plus(step) };
                if trajectory.append(next, refined) {
                    t = next;
                    state = refined;
                } else {
                    // The step underflowed the time resolution.
                    warn!("adaptive step vanished at {}", t);
                    return AdaptiveOutcome { reached: t, truncated: true };
                }
            }
            h = step * factor;
        }

        AdaptiveOutcome { reached: t, truncated: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Central {
        mu: f64,
    }

    impl AccelerationField for Central {
        fn acceleration(&self, _t: Instant, q: &Vec3) -> Vec3 {
            let r = q.norm();
            -self.mu * q / (r * r * r)
        }
    }

    fn circular() -> StateVector {
        StateVector::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0))
    }

    #[test]
    fn test_fixed_step_conserves_radius_of_circular_orbit() {
        let field = Central { mu: 1.0 };
        let integrator = FixedStepIntegrator::new(1e-3);
        let end = integrator.integrate(&field, (Instant::new(0.0), circular()), Instant::new(core::f64::consts::PI));
        assert!((end.q.norm() - 1.0).abs() < 1e-5);
        assert!((end.q.x + 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_fixed_step_zero_interval() {
        let field = Central { mu: 1.0 };
        let integrator = FixedStepIntegrator::new(0.1);
        let end = integrator.integrate(&field, (Instant::new(5.0), circular()), Instant::new(5.0));
        assert_eq!(end, circular());
    }

    #[test]
    fn test_adaptive_reaches_end_within_tolerance() {
        let field = Central { mu: 1.0 };
        let integrator = AdaptiveStepIntegrator {
            length_tolerance: 1e-8,
            speed_tolerance: 1e-8,
            initial_step: 0.1,
            max_steps: 100_000,
        };
        let mut trajectory = DiscreteTrajectory::starting_at(Instant::new(0.0), circular());
        let outcome = integrator.integrate(&field, &mut trajectory, Instant::new(2.0 * core::f64::consts::PI));
        assert!(!outcome.truncated);
        let (t, end) = trajectory.last().unwrap();
        assert_eq!(t, Instant::new(2.0 * core::f64::consts::PI));
        assert!((end.q - circular().q).norm() < 1e-3);
    }

    #[test]
    fn test_adaptive_budget_truncates() {
        let field = Central { mu: 1.0 };
        let integrator = AdaptiveStepIntegrator {
            length_tolerance: 1e-12,
            speed_tolerance: 1e-12,
            initial_step: 0.1,
            max_steps: 3,
        };
        let mut trajectory = DiscreteTrajectory::starting_at(Instant::new(0.0), circular());
        let outcome = integrator.integrate(&field, &mut trajectory, Instant::new(100.0));
        assert!(outcome.truncated);
        assert!(outcome.reached < Instant::new(100.0));
    }
}
