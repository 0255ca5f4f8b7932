//! Reference frames for display and the segment cursor handed to the host.
//!
//! A trajectory is rendered by expressing each of its points in the chosen
//! frame at the point's own time, re-anchoring the frame at the current time
//! and mapping the result into host world coordinates.

use crate::ephemeris::Ephemeris;
use crate::error::{PluginError, PluginResult};
use crate::geometry::{Instant, LineSegment, Planetarium, StateVector, Vec3};
use nalgebra::{Matrix3, Rotation3, UnitQuaternion};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrameKind {
    BodyCentredNonRotating { reference: i32 },
    BarycentricRotating { primary: i32, secondary: i32 },
}

impl FrameKind {
    pub fn bodies(&self) -> (i32, Option<i32>) {
        match *self {
            FrameKind::BodyCentredNonRotating { reference } => (reference, None),
            FrameKind::BarycentricRotating { primary, secondary } => (primary, Some(secondary)),
        }
    }
}

/// Origin, axes and angular velocity of a frame at one instant, all
/// barycentric.
struct FrameAt {
    origin: StateVector,
    basis: Matrix3<f64>, // columns are the frame axes
    angular_velocity: Vec3,
}

impl FrameAt {
    fn to_frame(&self, state: &StateVector) -> StateVector {
        let r = state.q - self.origin.q;
        let v = state.p - self.origin.p - self.angular_velocity.cross(&r);
        StateVector::new(self.basis.transpose() * r, self.basis.transpose() * v)
    }

    fn from_frame(&self, state: &StateVector) -> StateVector {
        let r = self.basis * state.q;
        let v = self.basis * state.p + self.angular_velocity.cross(&r);
        StateVector::new(self.origin.q + r, self.origin.p + v)
    }
}

pub struct RenderingFrame<'a> {
    kind: FrameKind,
    ephemeris: &'a Ephemeris,
    sun: i32, // anchors world coordinates
}

impl<'a> RenderingFrame<'a> {
    pub fn new(kind: FrameKind, ephemeris: &'a Ephemeris, sun: i32) -> PluginResult<Self> {
        let (first, second) = kind.bodies();
        ephemeris.trajectory(first)?;
        if let Some(second) = second {
            ephemeris.trajectory(second)?;
            if second == first {
                return Err(PluginError::invalid("secondary", "must differ from the primary"));
            }
        }
        Ok(Self { kind, ephemeris, sun })
    }

    fn at(&self, t: Instant) -> PluginResult<FrameAt> {
        match self.kind {
            FrameKind::BodyCentredNonRotating { reference } => Ok(FrameAt {
                origin: self.ephemeris.state_of(reference, t)?,
                basis: Matrix3::identity(),
                angular_velocity: Vec3::zeros(),
            }),
            FrameKind::BarycentricRotating { primary, secondary } => {
                let mu1 = self.mu(primary)?;
                let mu2 = self.mu(secondary)?;
                let s1 = self.ephemeris.state_of(primary, t)?;
                let s2 = self.ephemeris.state_of(secondary, t)?;
                let origin = StateVector::new(
                    (mu1 * s1.q + mu2 * s2.q) / (mu1 + mu2),
                    (mu1 * s1.p + mu2 * s2.p) / (mu1 + mu2),
                );
                let relative = s2.relative_to(&s1);
                let r2 = relative.q.norm_squared();
                let normal = relative.q.cross(&relative.p);
                let x = relative.q.try_normalize(0.0).unwrap_or_else(Vec3::x);
                let z = normal.try_normalize(0.0).unwrap_or_else(Vec3::z);
                let y = z.cross(&x);
                let angular_velocity = if r2 > 0.0 { normal / r2 } else { Vec3::zeros() };
                Ok(FrameAt { origin, basis: Matrix3::from_columns(&[x, y, z]), angular_velocity })
            }
        }
    }

    fn mu(&self, index: i32) -> PluginResult<f64> {
        self.ephemeris
            .bodies()
            .iter()
            .find(|body| body.index == index)
            .map(|body| body.gravitational_parameter)
            .ok_or(PluginError::UnknownBody(index))
    }

    /// Maps barycentric points into world positions as seen in this frame
    /// at `now`.
    pub fn render_points(
        &self,
        points: impl IntoIterator<Item = (Instant, StateVector)>,
        now: Instant,
        planetarium: &Planetarium,
        sun_world: &Vec3,
    ) -> PluginResult<Vec<Vec3>> {
        let frame_now = self.at(now)?;
        let sun_now = self.ephemeris.state_of(self.sun, now)?.q;
        points
            .into_iter()
            .map(|(t, state)| {
                let in_frame = self.at(t)?.to_frame(&state);
                let anchored = frame_now.from_frame(&in_frame);
                Ok(planetarium.to_world_position(&anchored.q, &sun_now, sun_world))
            })
            .collect()
    }

    /// World direction of the velocity of `state` relative to this frame.
    pub fn tangent(&self, t: Instant, state: &StateVector, planetarium: &Planetarium) -> PluginResult<Vec3> {
        let frame = self.at(t)?;
        let velocity = frame.basis * frame.to_frame(state).p;
        Ok(planetarium.to_world_vector(&velocity).try_normalize(0.0).unwrap_or_else(Vec3::zeros))
    }

    /// Rotation from the frame's axes to world axes.
    pub fn orientation(&self, t: Instant, planetarium: &Planetarium) -> PluginResult<UnitQuaternion<f64>> {
        let basis = self.at(t)?.basis;
        let world = planetarium.matrix() * basis;
        Ok(UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(world)))
    }
}

/// A finite sequence of segments consumed once, front to back.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    segments: Vec<LineSegment>,
    cursor: usize,
}

impl Line {
    /// Joins consecutive points; `n` points give `n - 1` segments.
    pub fn from_points(points: &[Vec3]) -> Self {
        let segments = points
            .windows(2)
            .map(|pair| LineSegment { begin: pair[0], end: pair[1] })
            .collect();
        Self { segments, cursor: 0 }
    }

    pub fn number_of_segments(&self) -> usize {
        self.segments.len()
    }

    pub fn at_end(&self) -> bool {
        self.cursor >= self.segments.len()
    }

    pub fn fetch_and_increment(&mut self) -> PluginResult<LineSegment> {
        let segment = *self.segments.get(self.cursor).ok_or(PluginError::IteratorExhausted)?;
        self.cursor += 1;
        Ok(segment)
    }
}
