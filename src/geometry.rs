//! Vector, time and frame primitives shared by every component.
//!
//! All positions and velocities held by the engine are barycentric (the
//! inertial frame whose origin is the root body at session creation) unless a
//! type says otherwise. Host world coordinates only appear at the boundary, via
//! [`Planetarium`].

use core::cmp::Ordering;
use nalgebra::{Matrix3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

pub type Vec3 = Vector3<f64>;

/// Standard gravity, used to convert specific impulse by weight into exhaust speed.
pub const STANDARD_GRAVITY: f64 = 9.806_65;

/// A point in simulated time, in seconds.
///
/// Ordered with `f64::total_cmp` so it can key ordered maps. The API rejects
/// NaN before an `Instant` is ever built from host input, and `-0.0` is
/// stored as `0.0` so the order agrees with `f64` comparison.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Instant(f64);

impl Instant {
    pub fn new(seconds: f64) -> Self {
        Self(seconds + 0.0)
    }

    pub const fn seconds(self) -> f64 {
        self.0
    }

    pub fn plus(self, duration: f64) -> Self {
        Self::new(self.0 + duration)
    }

    pub fn since(self, earlier: Instant) -> f64 {
        self.0 - earlier.0
    }
}

impl PartialEq for Instant {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Instant {}

impl PartialOrd for Instant {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Instant {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<f64> for Instant {
    fn from(seconds: f64) -> Self {
        Self::new(seconds)
    }
}

impl From<Instant> for f64 {
    fn from(instant: Instant) -> Self {
        instant.0
    }
}

impl core::fmt::Display for Instant {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} s", self.0)
    }
}

/// Position/velocity pair. Always relative to some frame named by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateVector {
    pub q: Vec3,
    pub p: Vec3,
}

impl StateVector {
    pub fn new(q: Vec3, p: Vec3) -> Self {
        Self { q, p }
    }

    pub fn zero() -> Self {
        Self { q: Vec3::zeros(), p: Vec3::zeros() }
    }

    pub fn relative_to(&self, origin: &StateVector) -> StateVector {
        StateVector { q: self.q - origin.q, p: self.p - origin.p }
    }

    pub fn offset_by(&self, offset: &StateVector) -> StateVector {
        StateVector { q: self.q + offset.q, p: self.p + offset.p }
    }

    pub fn is_finite(&self) -> bool {
        self.q.iter().chain(self.p.iter()).all(|x| x.is_finite())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub begin: Vec3,
    pub end: Vec3,
}

/// Unit vector for a right ascension/declination pair, in radians.
pub fn unit_from_spherical(right_ascension: f64, declination: f64) -> Vec3 {
    let (sin_ra, cos_ra) = right_ascension.sin_cos();
    let (sin_dec, cos_dec) = declination.sin_cos();
    Vec3::new(cos_dec * cos_ra, cos_dec * sin_ra, sin_dec)
}

/// Cubic Hermite interpolation between two timed states.
pub fn hermite(t0: Instant, s0: &StateVector, t1: Instant, s1: &StateVector, t: Instant) -> StateVector {
    let h = t1.since(t0);
    if h <= 0.0 {
        return *s0;
    }
    let s = t.since(t0) / h;
    let s2 = s * s;
    let s3 = s2 * s;

    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;
    let q = h00 * s0.q + h10 * h * s0.p + h01 * s1.q + h11 * h * s1.p;

    // Derivatives of the basis polynomials, divided by h for d/dt.
    let d00 = (6.0 * s2 - 6.0 * s) / h;
    let d10 = 3.0 * s2 - 4.0 * s + 1.0;
    let d01 = (-6.0 * s2 + 6.0 * s) / h;
    let d11 = 3.0 * s2 - 2.0 * s;
    let p = d00 * s0.q + d10 * s0.p + d01 * s1.q + d11 * s1.p;

    StateVector { q, p }
}

/// The host's planetarium orientation, used only to convert between
/// barycentric and world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Planetarium {
    pub rotation_degrees: f64,
}

impl Planetarium {
    pub fn new(rotation_degrees: f64) -> Self {
        Self { rotation_degrees }
    }

    /// Rotation taking barycentric axes to world axes.
    pub fn rotation(&self) -> Rotation3<f64> {
        Rotation3::from_axis_angle(&Vec3::z_axis(), self.rotation_degrees.to_radians())
    }

    pub fn matrix(&self) -> Matrix3<f64> {
        *self.rotation().matrix()
    }

    pub fn to_world_position(&self, barycentric: &Vec3, sun_barycentric: &Vec3, sun_world: &Vec3) -> Vec3 {
        *sun_world + self.rotation() * (barycentric - sun_barycentric)
    }

    pub fn to_world_vector(&self, barycentric: &Vec3) -> Vec3 {
        self.rotation() * *barycentric
    }

    pub fn to_barycentric_vector(&self, world: &Vec3) -> Vec3 {
        self.rotation().inverse() * *world
    }
}
