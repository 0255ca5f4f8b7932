//! The tree of gravitating bodies.
//!
//! During initialization bodies are inserted with their absolute
//! (barycentric) initial states. Once initialization ends the states seed the
//! [`Ephemeris`] and the tree can only be reshaped by reparenting, which never
//! moves a body.

use crate::ephemeris::{Ephemeris, MassiveBody, Oblateness};
use crate::error::{require_finite_state, require_positive, PluginError, PluginResult};
use crate::geometry::{Instant, StateVector, Vec3};
use crate::precision::{parse_quantity, Quantity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Celestial {
    pub body: MassiveBody,
    pub parent: Option<i32>,
    initial_state: StateVector, // barycentric, at session start
}

/// A body described by string-encoded constants and a barycentric state.
/// Oblateness is given by all four of its fields or by none.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectCelestial {
    pub index: i32,
    #[serde(default)]
    pub parent: Option<i32>,
    pub gravitational_parameter: String,
    #[serde(default)]
    pub axis_right_ascension: Option<String>,
    #[serde(default)]
    pub axis_declination: Option<String>,
    #[serde(default)]
    pub j2: Option<String>,
    #[serde(default)]
    pub reference_radius: Option<String>,
    pub position: [String; 3],
    pub velocity: [String; 3],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedCelestial {
    pub gravitational_parameter: f64,
    pub oblateness: Option<Oblateness>,
    pub state: StateVector,
}

impl DirectCelestial {
    pub fn parse(&self) -> PluginResult<ParsedCelestial> {
        let gravitational_parameter =
            parse_quantity("gravitational_parameter", &self.gravitational_parameter, Quantity::GravitationalParameter)?;

        let oblateness = match (&self.axis_right_ascension, &self.axis_declination, &self.j2, &self.reference_radius) {
            (None, None, None, None) => None,
            (Some(right_ascension), Some(declination), Some(j2), Some(reference_radius)) => Some(Oblateness::new(
                parse_quantity("axis_right_ascension", right_ascension, Quantity::Angle)?,
                parse_quantity("axis_declination", declination, Quantity::Angle)?,
                parse_quantity("j2", j2, Quantity::Dimensionless)?,
                parse_quantity("reference_radius", reference_radius, Quantity::Length)?,
            )?),
            _ => return Err(PluginError::malformed("oblateness", "axis, j2 and reference radius go together")),
        };

        const POSITION_FIELDS: [&str; 3] = ["x", "y", "z"];
        const VELOCITY_FIELDS: [&str; 3] = ["vx", "vy", "vz"];
        let mut q = Vec3::zeros();
        let mut p = Vec3::zeros();
        for i in 0..3 {
            q[i] = parse_quantity(POSITION_FIELDS[i], &self.position[i], Quantity::Length)?;
            p[i] = parse_quantity(VELOCITY_FIELDS[i], &self.velocity[i], Quantity::Speed)?;
        }

        Ok(ParsedCelestial { gravitational_parameter, oblateness, state: StateVector::new(q, p) })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CelestialHierarchy {
    celestials: BTreeMap<i32, Celestial>,
    root: Option<i32>,
}

impl CelestialHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<i32> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.celestials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.celestials.is_empty()
    }

    pub fn contains(&self, index: i32) -> bool {
        self.celestials.contains_key(&index)
    }

    pub fn get(&self, index: i32) -> PluginResult<&Celestial> {
        self.celestials.get(&index).ok_or(PluginError::UnknownBody(index))
    }

    pub fn parent(&self, index: i32) -> PluginResult<Option<i32>> {
        Ok(self.get(index)?.parent)
    }

    fn check_insertable(&self, index: i32, parent: Option<i32>) -> PluginResult<()> {
        if self.contains(index) {
            return Err(PluginError::DuplicateBody(index));
        }
        match parent {
            Some(parent) if !self.contains(parent) => Err(PluginError::UnknownBody(parent)),
            None if self.root.is_some() => Err(PluginError::RootAlreadyInserted),
            _ => Ok(()),
        }
    }

    /// Inserts the root body at rest at the barycentric origin.
    pub fn insert_sun(&mut self, index: i32, gravitational_parameter: f64) -> PluginResult<()> {
        self.insert(index, None, gravitational_parameter, None, StateVector::zero())
    }

    /// Inserts a body whose state is given relative to its parent.
    pub fn insert_celestial(
        &mut self,
        index: i32,
        parent: i32,
        gravitational_parameter: f64,
        oblateness: Option<Oblateness>,
        from_parent: StateVector,
    ) -> PluginResult<()> {
        self.check_insertable(index, Some(parent))?;
        require_finite_state("from_parent", &from_parent)?;
        let parent_state = self.get(parent)?.initial_state;
        self.insert(index, Some(parent), gravitational_parameter, oblateness, parent_state.offset_by(&from_parent))
    }

    /// Inserts a body with an absolute state. A body with no parent becomes
    /// the root.
    pub fn insert(
        &mut self,
        index: i32,
        parent: Option<i32>,
        gravitational_parameter: f64,
        oblateness: Option<Oblateness>,
        barycentric: StateVector,
    ) -> PluginResult<()> {
        self.check_insertable(index, parent)?;
        require_positive("gravitational_parameter", gravitational_parameter)?;
        if let Some(oblateness) = &oblateness {
            oblateness.validate()?;
        }
        require_finite_state("state", &barycentric)?;

        let body = MassiveBody { index, gravitational_parameter, oblateness };
        self.celestials.insert(index, Celestial { body, parent, initial_state: barycentric });
        if parent.is_none() {
            self.root = Some(index);
        }
        debug!("inserted celestial {} under {:?}", index, parent);
        Ok(())
    }

    /// `true` if `candidate` is `ancestor` or lies below it.
    pub fn is_descendant(&self, candidate: i32, ancestor: i32) -> bool {
        let mut current = Some(candidate);
        while let Some(index) = current {
            if index == ancestor {
                return true;
            }
            current = self.celestials.get(&index).and_then(|celestial| celestial.parent);
        }
        false
    }

    pub fn reparent(&mut self, index: i32, new_parent: i32) -> PluginResult<()> {
        let celestial = self.get(index)?;
        if celestial.parent.is_none() {
            return Err(PluginError::ReparentRoot(index));
        }
        if !self.contains(new_parent) {
            return Err(PluginError::UnknownBody(new_parent));
        }
        if self.is_descendant(new_parent, index) {
            return Err(PluginError::HierarchyCycle { body: index, parent: new_parent });
        }
        if let Some(celestial) = self.celestials.get_mut(&index) {
            celestial.parent = Some(new_parent);
        }
        Ok(())
    }

    /// Seeds an ephemeris with every body's initial state.
    pub fn build_ephemeris(&self, t0: Instant, step: f64) -> PluginResult<Ephemeris> {
        if self.root.is_none() {
            return Err(PluginError::NoRoot);
        }
        let initial = self
            .celestials
            .values()
            .map(|celestial| (celestial.body.clone(), celestial.initial_state))
            .collect();
        Ok(Ephemeris::new(initial, t0, step))
    }
}
