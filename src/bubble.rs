//! The physics bubble: vessels whose parts the host simulates itself.
//!
//! Parts staged during a frame form the bubble of the next advance. The
//! bubble's centre of mass is integrated under gravity like any vessel; member
//! vessels ride along at fixed offsets, and the host is handed the corrections
//! that bring its parts back onto the integrated centre.

use crate::ephemeris::Ephemeris;
use crate::error::{require_finite, require_positive, PluginError, PluginResult};
use crate::geometry::{Instant, Planetarium, StateVector, Vec3};
use crate::integrator::{AccelerationField, FixedStepIntegrator};
use crate::vessel::{Guid, VesselRegistry};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One rigid part in host world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub position: Vec3,
    pub velocity: Vec3,
    pub mass: f64,
    /// Written by the engine after each advance, for the host to apply.
    #[serde(default)]
    pub gravitational_acceleration: Vec3,
}

impl Part {
    pub fn new(position: Vec3, velocity: Vec3, mass: f64) -> Self {
        Self { position, velocity, mass, gravitational_acceleration: Vec3::zeros() }
    }

    fn validate(&self) -> PluginResult<()> {
        require_positive("part mass", self.mass)?;
        for component in self.position.iter().chain(self.velocity.iter()) {
            require_finite("part state", *component)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Member {
    guid: Guid,
    parts: Vec<Part>,
    // Barycentric offset of the vessel from the bubble's centre of mass.
    offset: StateVector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CurrentBubble {
    members: Vec<Member>,
    centre_of_mass: StateVector, // barycentric, at the current time
    parts_centre_of_mass: StateVector, // world, as last reported by the host
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicsBubble {
    next: Vec<(Guid, Vec<Part>)>,
    current: Option<CurrentBubble>,
}

fn centre_of_mass<'a>(parts: impl Iterator<Item = &'a Part>) -> (f64, StateVector) {
    let (mass, q, p) = parts.fold((0.0, Vec3::zeros(), Vec3::zeros()), |(m, q, p), part| {
        (m + part.mass, q + part.mass * part.position, p + part.mass * part.velocity)
    });
    if mass > 0.0 {
        (mass, StateVector::new(q / mass, p / mass))
    } else {
        (0.0, StateVector::zero())
    }
}

impl PhysicsBubble {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    pub fn contains(&self, guid: &Guid) -> bool {
        self.current
            .as_ref()
            .map_or(false, |bubble| bubble.members.iter().any(|member| &member.guid == guid))
    }

    pub fn staged(&self) -> impl Iterator<Item = &Guid> {
        self.next.iter().map(|(guid, _)| guid)
    }

    /// Stages `parts` for the next advance, replacing any earlier staging of
    /// the same vessel, and marks the vessel kept.
    pub fn add_vessel_to_next(&mut self, vessels: &mut VesselRegistry, guid: Guid, parts: Vec<Part>) -> PluginResult<()> {
        if parts.is_empty() {
            return Err(PluginError::malformed("parts", "a vessel needs at least one part"));
        }
        for part in &parts {
            part.validate()?;
        }
        vessels.keep(&guid)?;
        match self.next.iter_mut().find(|(staged, _)| *staged == guid) {
            Some((_, staged_parts)) => *staged_parts = parts,
            None => self.next.push((guid, parts)),
        }
        Ok(())
    }

    /// Promotes the staged parts to the current bubble, integrates its centre
    /// from `from` to `to` and moves the member vessels along.
    #[allow(clippy::too_many_arguments)]
    pub fn advance(
        &mut self,
        vessels: &mut VesselRegistry,
        ephemeris: &Ephemeris,
        integrator: &FixedStepIntegrator,
        planetarium: &Planetarium,
        from: Instant,
        to: Instant,
        next_planetarium: &Planetarium,
    ) -> PluginResult<()> {
        if self.next.is_empty() {
            if self.current.take().is_some() {
                debug!("physics bubble emptied");
            }
            return Ok(());
        }

        // Engine states of the members at `from`, weighted by their parts.
        let mut total_mass = 0.0;
        let mut weighted = StateVector::zero();
        for (guid, parts) in &self.next {
            let (_, state) = vessels
                .get(guid)?
                .last_state()
                .ok_or_else(|| PluginError::VesselStateUnset(guid.to_string()))?;
            let (mass, _) = centre_of_mass(parts.iter());
            total_mass += mass;
            weighted.q += mass * state.q;
            weighted.p += mass * state.p;
        }
        let start = StateVector::new(weighted.q / total_mass, weighted.p / total_mass);
        let staged = std::mem::take(&mut self.next);

        let (_, parts_centre_of_mass) = centre_of_mass(staged.iter().flat_map(|(_, parts)| parts.iter()));
        let members: Vec<Member> = staged
            .into_iter()
            .map(|(guid, parts)| {
                let (_, vessel_world) = centre_of_mass(parts.iter());
                let world_offset = vessel_world.relative_to(&parts_centre_of_mass);
                let offset = StateVector::new(
                    planetarium.to_barycentric_vector(&world_offset.q),
                    planetarium.to_barycentric_vector(&world_offset.p),
                );
                Member { guid, parts, offset }
            })
            .collect();

        let centre = integrator.integrate(ephemeris, (from, start), to);
        for member in &members {
            vessels.get_mut(&member.guid)?.follow(to, centre.offset_by(&member.offset));
        }

        let gravity = next_planetarium.to_world_vector(&ephemeris.acceleration(to, &centre.q));
        let mut bubble = CurrentBubble { members, centre_of_mass: centre, parts_centre_of_mass };
        for part in bubble.members.iter_mut().flat_map(|member| member.parts.iter_mut()) {
            part.gravitational_acceleration = gravity;
        }
        debug!("physics bubble advanced with {} vessel(s)", bubble.members.len());
        self.current = Some(bubble);
        Ok(())
    }

    fn current(&self) -> PluginResult<&CurrentBubble> {
        self.current.as_ref().ok_or(PluginError::BubbleEmpty)
    }

    /// Parts of `guid` in the current bubble, with their gravitational
    /// accelerations.
    pub fn parts(&self, guid: &Guid) -> PluginResult<&[Part]> {
        self.current()?
            .members
            .iter()
            .find(|member| &member.guid == guid)
            .map(|member| member.parts.as_slice())
            .ok_or_else(|| PluginError::UnknownVessel(guid.to_string()))
    }

    /// World position shift taking the host's parts onto the integrated
    /// centre of mass.
    pub fn displacement_correction(
        &self,
        planetarium: &Planetarium,
        sun_barycentric: &Vec3,
        sun_world: &Vec3,
    ) -> PluginResult<Vec3> {
        let bubble = self.current()?;
        let centre_world = planetarium.to_world_position(&bubble.centre_of_mass.q, sun_barycentric, sun_world);
        Ok(centre_world - bubble.parts_centre_of_mass.q)
    }

    /// World velocity shift, with velocities relative to the reference body.
    pub fn velocity_correction(&self, planetarium: &Planetarium, reference: &StateVector) -> PluginResult<Vec3> {
        let bubble = self.current()?;
        let relative = bubble.centre_of_mass.p - reference.p;
        Ok(planetarium.to_world_vector(&relative) - bubble.parts_centre_of_mass.p)
    }
}
