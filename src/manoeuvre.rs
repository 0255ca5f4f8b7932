//! Constant-thrust burns.
//!
//! A `Manoeuvre` stores only the host-chosen parameters. Everything the rocket
//! equation yields (mass flow, final mass, Δv, final time, time of half Δv) is
//! computed on demand and cannot be set.

use crate::error::{require_finite, require_positive, PluginError, PluginResult};
use crate::geometry::{unit_from_spherical, Instant, Vec3, STANDARD_GRAVITY};
use serde::{Deserialize, Serialize};

/// Host-facing parameters of a burn, angles in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ManoeuvreParameters {
    pub thrust: f64,
    pub initial_mass: f64,
    pub specific_impulse_by_weight: f64,
    pub right_ascension: f64,
    pub declination: f64,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub initial_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Manoeuvre {
    thrust: f64,
    initial_mass: f64,
    specific_impulse_by_weight: f64,
    right_ascension: f64,
    declination: f64,
    duration: f64,
    initial_time: Instant,
}

impl Manoeuvre {
    pub fn new(thrust: f64, initial_mass: f64, specific_impulse_by_weight: f64, direction: (f64, f64)) -> PluginResult<Self> {
        let (right_ascension, declination) = direction;
        Ok(Self {
            thrust: require_positive("thrust", thrust)?,
            initial_mass: require_positive("initial_mass", initial_mass)?,
            specific_impulse_by_weight: require_positive("specific_impulse_by_weight", specific_impulse_by_weight)?,
            right_ascension: require_finite("right_ascension", right_ascension)?,
            declination: require_finite("declination", declination)?,
            duration: 0.0,
            initial_time: Instant::new(0.0),
        })
    }

    pub fn from_parameters(parameters: &ManoeuvreParameters) -> PluginResult<Self> {
        let mut manoeuvre = Self::new(
            parameters.thrust,
            parameters.initial_mass,
            parameters.specific_impulse_by_weight,
            (parameters.right_ascension, parameters.declination),
        )?;
        manoeuvre.set_duration(parameters.duration)?;
        manoeuvre.set_initial_time(parameters.initial_time)?;
        Ok(manoeuvre)
    }

    pub fn parameters(&self) -> ManoeuvreParameters {
        ManoeuvreParameters {
            thrust: self.thrust,
            initial_mass: self.initial_mass,
            specific_impulse_by_weight: self.specific_impulse_by_weight,
            right_ascension: self.right_ascension,
            declination: self.declination,
            duration: self.duration,
            initial_time: self.initial_time.seconds(),
        }
    }

    /// The burn must end before the propellant would exceed the initial mass.
    pub fn set_duration(&mut self, duration: f64) -> PluginResult<()> {
        require_finite("duration", duration)?;
        if duration < 0.0 {
            return Err(PluginError::invalid("duration", "must not be negative"));
        }
        if duration >= self.initial_mass / self.mass_flow() {
            return Err(PluginError::invalid("duration", "burns the whole initial mass"));
        }
        self.duration = duration;
        Ok(())
    }

    /// Sets the duration that yields `delta_v`:
    /// `t = (m0 / ṁ) (1 - exp(-Δv / ve))`.
    pub fn set_delta_v(&mut self, delta_v: f64) -> PluginResult<()> {
        require_finite("delta_v", delta_v)?;
        if delta_v < 0.0 {
            return Err(PluginError::invalid("delta_v", "must not be negative"));
        }
        self.duration = self.initial_mass / self.mass_flow() * -(-delta_v / self.exhaust_speed()).exp_m1();
        Ok(())
    }

    pub fn set_initial_time(&mut self, initial_time: f64) -> PluginResult<()> {
        self.initial_time = Instant::new(require_finite("initial_time", initial_time)?);
        Ok(())
    }

    pub fn thrust(&self) -> f64 {
        self.thrust
    }

    pub fn initial_mass(&self) -> f64 {
        self.initial_mass
    }

    pub fn specific_impulse_by_weight(&self) -> f64 {
        self.specific_impulse_by_weight
    }

    pub fn right_ascension(&self) -> f64 {
        self.right_ascension
    }

    pub fn declination(&self) -> f64 {
        self.declination
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn initial_time(&self) -> Instant {
        self.initial_time
    }

    pub fn exhaust_speed(&self) -> f64 {
        self.specific_impulse_by_weight * STANDARD_GRAVITY
    }

    pub fn mass_flow(&self) -> f64 {
        self.thrust / self.exhaust_speed()
    }

    pub fn final_mass(&self) -> f64 {
        self.initial_mass - self.mass_flow() * self.duration
    }

    pub fn final_time(&self) -> Instant {
        self.initial_time.plus(self.duration)
    }

    pub fn delta_v(&self) -> f64 {
        self.exhaust_speed() * (self.initial_mass / self.final_mass()).ln()
    }

    /// Time at which half of the Δv has been imparted.
    pub fn time_of_half_delta_v(&self) -> Instant {
        let half_mass = (self.initial_mass * self.final_mass()).sqrt();
        self.initial_time.plus((self.initial_mass - half_mass) / self.mass_flow())
    }

    /// Unit thrust direction, fixed in the barycentric frame.
    pub fn direction(&self) -> Vec3 {
        unit_from_spherical(self.right_ascension, self.declination)
    }

    pub fn delta_v_vector(&self) -> Vec3 {
        self.delta_v() * self.direction()
    }

    pub fn is_burning(&self, t: Instant) -> bool {
        t >= self.initial_time && t < self.final_time()
    }

    /// Thrust acceleration at `t`, zero outside the burn.
    pub fn acceleration(&self, t: Instant) -> Vec3 {
        if !self.is_burning(t) {
            return Vec3::zeros();
        }
        let mass = self.initial_mass - self.mass_flow() * t.since(self.initial_time);
        self.thrust / mass * self.direction()
    }
}
