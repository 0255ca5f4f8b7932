use crate::bubble::{Part, PhysicsBubble};
use crate::celestial::{CelestialHierarchy, DirectCelestial};
use crate::config::PluginConfig;
use crate::ephemeris::{Ephemeris, Oblateness};
use crate::error::{require_finite, require_finite_state, require_positive, PluginError, PluginResult};
use crate::geometry::{Instant, Planetarium, StateVector, Vec3};
use crate::integrator::{AdaptiveStepIntegrator, FixedStepIntegrator};
use crate::manoeuvre::Manoeuvre;
use crate::rendering::{FrameKind, Line, RenderingFrame};
use crate::vessel::{parse_guid, Guid, Vessel, VesselRegistry};
use nalgebra::UnitQuaternion;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Initializing,
    Running,
    Destroyed,
}

impl core::fmt::Display for Phase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Phase::Initializing => write!(f, "initializing"),
            Phase::Running => write!(f, "running"),
            Phase::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// One host session: the celestial hierarchy, the vessels, the physics bubble
/// and the time cursor they share.
#[derive(Debug, Serialize, Deserialize)]
pub struct Plugin {
    phase: Phase,
    config: PluginConfig,
    current_time: Instant,
    planetarium: Planetarium,
    hierarchy: CelestialHierarchy,
    ephemeris: Option<Ephemeris>, // built when initialization ends
    vessels: VesselRegistry,
    bubble: PhysicsBubble,
}

static_assertions::assert_impl_all!(Plugin: Send);

impl Plugin {
    pub fn new(initial_time: f64, planetarium_rotation: f64) -> PluginResult<Self> {
        Self::with_config(initial_time, planetarium_rotation, PluginConfig::default())
    }

    pub fn with_config(initial_time: f64, planetarium_rotation: f64, config: PluginConfig) -> PluginResult<Self> {
        require_finite("initial_time", initial_time)?;
        require_finite("planetarium_rotation", planetarium_rotation)?;
        config.validate()?;
        info!("plugin created at t = {} s", initial_time);
        Ok(Self {
            phase: Phase::Initializing,
            config,
            current_time: Instant::new(initial_time),
            planetarium: Planetarium::new(planetarium_rotation),
            hierarchy: CelestialHierarchy::new(),
            ephemeris: None,
            vessels: VesselRegistry::new(),
            bubble: PhysicsBubble::new(),
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn current_time(&self) -> f64 {
        self.current_time.seconds()
    }

    pub fn planetarium(&self) -> &Planetarium {
        &self.planetarium
    }

    pub fn hierarchy(&self) -> &CelestialHierarchy {
        &self.hierarchy
    }

    pub fn vessels(&self) -> &VesselRegistry {
        &self.vessels
    }

    fn require_phase(&self, operation: &'static str, phase: Phase) -> PluginResult<()> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(PluginError::WrongPhase { operation, phase: self.phase })
        }
    }

    fn ephemeris(&self, operation: &'static str) -> PluginResult<&Ephemeris> {
        self.require_phase(operation, Phase::Running)?;
        self.ephemeris.as_ref().ok_or(PluginError::WrongPhase { operation, phase: self.phase })
    }

    fn sun(&self) -> PluginResult<i32> {
        self.hierarchy.root().ok_or(PluginError::NoRoot)
    }

    fn adaptive_integrator(&self) -> AdaptiveStepIntegrator {
        AdaptiveStepIntegrator {
            length_tolerance: self.config.prediction_length_tolerance,
            speed_tolerance: self.config.prediction_speed_tolerance,
            initial_step: self.config.vessel_step,
            max_steps: self.config.max_adaptive_steps,
        }
    }

    // Hierarchy

    pub fn insert_sun(&mut self, index: i32, gravitational_parameter: f64) -> PluginResult<()> {
        self.require_phase("insert_sun", Phase::Initializing)?;
        self.hierarchy.insert_sun(index, gravitational_parameter)
    }

    pub fn insert_celestial(
        &mut self,
        index: i32,
        parent: i32,
        gravitational_parameter: f64,
        oblateness: Option<Oblateness>,
        from_parent: StateVector,
    ) -> PluginResult<()> {
        self.require_phase("insert_celestial", Phase::Initializing)?;
        self.hierarchy.insert_celestial(index, parent, gravitational_parameter, oblateness, from_parent)
    }

    /// Inserts a body whose constants and barycentric state arrive as
    /// strings.
    pub fn directly_insert_celestial(&mut self, celestial: &DirectCelestial) -> PluginResult<()> {
        self.require_phase("directly_insert_celestial", Phase::Initializing)?;
        let parsed = celestial.parse()?;
        self.hierarchy.insert(
            celestial.index,
            celestial.parent,
            parsed.gravitational_parameter,
            parsed.oblateness,
            parsed.state,
        )
    }

    pub fn end_initialization(&mut self) -> PluginResult<()> {
        self.require_phase("end_initialization", Phase::Initializing)?;
        let ephemeris = self.hierarchy.build_ephemeris(self.current_time, self.config.ephemeris_step)?;
        self.ephemeris = Some(ephemeris);
        self.phase = Phase::Running;
        info!("initialization ended with {} celestial(s)", self.hierarchy.len());
        Ok(())
    }

    pub fn update_celestial_hierarchy(&mut self, index: i32, parent: i32) -> PluginResult<()> {
        self.require_phase("update_celestial_hierarchy", Phase::Running)?;
        self.hierarchy.reparent(index, parent)
    }

    pub fn celestial_from_parent(&self, index: i32) -> PluginResult<StateVector> {
        let ephemeris = self.ephemeris("celestial_from_parent")?;
        let parent = self.hierarchy.parent(index)?.ok_or(PluginError::NoParent(index))?;
        let state = ephemeris.state_of(index, self.current_time)?;
        Ok(state.relative_to(&ephemeris.state_of(parent, self.current_time)?))
    }

    // Vessels

    pub fn insert_or_keep_vessel(&mut self, guid: &str, parent: i32) -> PluginResult<bool> {
        self.require_phase("insert_or_keep_vessel", Phase::Running)?;
        let guid = parse_guid(guid)?;
        self.hierarchy.get(parent)?;
        Ok(self.vessels.insert_or_keep(guid, parent))
    }

    pub fn set_vessel_state_offset(&mut self, guid: &str, from_parent: StateVector) -> PluginResult<()> {
        let ephemeris = self.ephemeris("set_vessel_state_offset")?;
        let guid = parse_guid(guid)?;
        require_finite_state("from_parent", &from_parent)?;
        let vessel = self.vessels.get(&guid)?;
        if vessel.has_state() {
            return Err(PluginError::VesselStateAlreadySet(guid.to_string()));
        }
        let parent = ephemeris.state_of(vessel.parent(), self.current_time)?;
        self.vessels.set_initial_state(&guid, self.current_time, parent.offset_by(&from_parent))
    }

    pub fn has_vessel(&self, guid: &str) -> bool {
        parse_guid(guid).map_or(false, |guid| self.vessels.contains(&guid))
    }

    fn vessel(&self, guid: &str) -> PluginResult<(Guid, &Vessel)> {
        let guid = parse_guid(guid)?;
        let vessel = self.vessels.get(&guid)?;
        Ok((guid, vessel))
    }

    fn current_vessel_state(&self, guid: &str) -> PluginResult<StateVector> {
        let (guid, vessel) = self.vessel(guid)?;
        vessel
            .last_state()
            .map(|(_, state)| state)
            .ok_or_else(|| PluginError::VesselStateUnset(guid.to_string()))
    }

    pub fn vessel_from_parent(&self, guid: &str) -> PluginResult<StateVector> {
        let ephemeris = self.ephemeris("vessel_from_parent")?;
        let state = self.current_vessel_state(guid)?;
        let parent = self.vessel(guid)?.1.parent();
        Ok(state.relative_to(&ephemeris.state_of(parent, self.current_time)?))
    }

    // Time

    /// Moves every trajectory to `t`. Nothing changes unless every check
    /// passes.
    pub fn advance_time(&mut self, t: f64, planetarium_rotation: f64) -> PluginResult<()> {
        self.require_phase("advance_time", Phase::Running)?;
        let t = Instant::new(require_finite("time", t)?);
        require_finite("planetarium_rotation", planetarium_rotation)?;
        if t < self.current_time {
            return Err(PluginError::TimeOrdering { requested: t.seconds(), current: self.current_time() });
        }
        if let Some(guid) = self.vessels.first_kept_without_state() {
            return Err(PluginError::VesselStateUnset(guid.to_string()));
        }
        let Some(ephemeris) = self.ephemeris.as_mut() else {
            return Err(PluginError::WrongPhase { operation: "advance_time", phase: self.phase });
        };

        let next_planetarium = Planetarium::new(planetarium_rotation);
        let pruned = self.vessels.prune_unkept();
        ephemeris.prolong(t);

        let integrator = FixedStepIntegrator::new(self.config.vessel_step);
        self.bubble.advance(
            &mut self.vessels,
            ephemeris,
            &integrator,
            &self.planetarium,
            self.current_time,
            t,
            &next_planetarium,
        )?;
        for (guid, vessel) in self.vessels.iter_mut() {
            if !self.bubble.contains(guid) {
                vessel.advance(&*ephemeris, &integrator, self.config.history_step, t);
            }
        }

        self.vessels.reset_kept();
        self.current_time = t;
        self.planetarium = next_planetarium;
        debug!("advanced to {}, pruned {} vessel(s)", t, pruned);
        Ok(())
    }

    pub fn forget_history_before(&mut self, t: f64) -> PluginResult<()> {
        self.require_phase("forget_history_before", Phase::Running)?;
        let t = Instant::new(require_finite("time", t)?);
        if t > self.current_time {
            return Err(PluginError::ForgetAfterCurrentTime { requested: t.seconds(), current: self.current_time() });
        }
        let Some(ephemeris) = self.ephemeris.as_mut() else {
            return Err(PluginError::WrongPhase { operation: "forget_history_before", phase: self.phase });
        };

        let mut earliest = t;
        for (_, vessel) in self.vessels.iter_mut() {
            vessel.forget_before(t);
            if let Some((first, _)) = vessel.history().first() {
                earliest = earliest.min(first);
            }
        }
        // Bodies keep enough to place every retained vessel point.
        ephemeris.forget_before(earliest);
        debug!("forgot history before {}", t);
        Ok(())
    }

    // Physics bubble

    pub fn add_vessel_to_next_physics_bubble(&mut self, guid: &str, parts: Vec<Part>) -> PluginResult<()> {
        self.require_phase("add_vessel_to_next_physics_bubble", Phase::Running)?;
        let guid = parse_guid(guid)?;
        self.bubble.add_vessel_to_next(&mut self.vessels, guid, parts)
    }

    pub fn physics_bubble_is_empty(&self) -> bool {
        self.bubble.is_empty()
    }

    pub fn physics_bubble_parts(&self, guid: &str) -> PluginResult<&[Part]> {
        self.require_phase("physics_bubble_parts", Phase::Running)?;
        self.bubble.parts(&parse_guid(guid)?)
    }

    pub fn bubble_displacement_correction(&self, sun_world: &Vec3) -> PluginResult<Vec3> {
        let ephemeris = self.ephemeris("bubble_displacement_correction")?;
        let sun = ephemeris.state_of(self.sun()?, self.current_time)?;
        self.bubble.displacement_correction(&self.planetarium, &sun.q, sun_world)
    }

    pub fn bubble_velocity_correction(&self, reference_body: i32) -> PluginResult<Vec3> {
        let ephemeris = self.ephemeris("bubble_velocity_correction")?;
        let reference = ephemeris.state_of(reference_body, self.current_time)?;
        self.bubble.velocity_correction(&self.planetarium, &reference)
    }

    // Predictions

    pub fn set_prediction_length(&mut self, length: f64) -> PluginResult<()> {
        self.config.prediction_length = require_positive("prediction_length", length)?;
        Ok(())
    }

    pub fn set_prediction_length_tolerance(&mut self, tolerance: f64) -> PluginResult<()> {
        self.config.prediction_length_tolerance = require_positive("prediction_length_tolerance", tolerance)?;
        Ok(())
    }

    pub fn set_prediction_speed_tolerance(&mut self, tolerance: f64) -> PluginResult<()> {
        self.config.prediction_speed_tolerance = require_positive("prediction_speed_tolerance", tolerance)?;
        Ok(())
    }

    pub fn update_prediction(&mut self, guid: &str) -> PluginResult<()> {
        self.require_phase("update_prediction", Phase::Running)?;
        let guid = parse_guid(guid)?;
        let integrator = self.adaptive_integrator();
        let length = self.config.prediction_length;
        let vessel = self.vessels.get_mut(&guid)?;
        let start = vessel
            .flight_plan()
            .last_burn_end()
            .or_else(|| vessel.last_state())
            .ok_or_else(|| PluginError::VesselStateUnset(guid.to_string()))?;
        let Some(ephemeris) = self.ephemeris.as_mut() else {
            return Err(PluginError::WrongPhase { operation: "update_prediction", phase: self.phase });
        };
        ephemeris.prolong(start.0.plus(length));
        if !vessel.update_prediction(&*ephemeris, &integrator, length) {
            debug!("prediction of {} stopped short", guid);
        }
        Ok(())
    }

    pub fn has_prediction(&self, guid: &str) -> PluginResult<bool> {
        Ok(self.vessel(guid)?.1.prediction().len() > 1)
    }

    // Flight plans

    pub fn flight_plan_count(&self, guid: &str) -> PluginResult<usize> {
        Ok(self.vessel(guid)?.1.flight_plan().count())
    }

    pub fn flight_plan_get(&self, guid: &str, index: usize) -> PluginResult<Manoeuvre> {
        self.vessel(guid)?.1.flight_plan().get(index).copied()
    }

    pub fn flight_plan_set(&mut self, guid: &str, index: usize, manoeuvre: Manoeuvre) -> PluginResult<()> {
        self.require_phase("flight_plan_set", Phase::Running)?;
        self.vessels.get_mut(&parse_guid(guid)?)?.flight_plan_mut().set(index, manoeuvre)
    }

    pub fn flight_plan_insert(&mut self, guid: &str, index: usize, manoeuvre: Manoeuvre) -> PluginResult<()> {
        self.require_phase("flight_plan_insert", Phase::Running)?;
        self.vessels.get_mut(&parse_guid(guid)?)?.flight_plan_mut().insert(index, manoeuvre)
    }

    pub fn flight_plan_clear(&mut self, guid: &str) -> PluginResult<()> {
        self.require_phase("flight_plan_clear", Phase::Running)?;
        self.vessels.get_mut(&parse_guid(guid)?)?.flight_plan_mut().clear();
        Ok(())
    }

    pub fn update_flight_plan(&mut self, guid: &str, last_time: f64) -> PluginResult<()> {
        self.require_phase("update_flight_plan", Phase::Running)?;
        let last_time = Instant::new(require_finite("last_time", last_time)?);
        let guid = parse_guid(guid)?;
        let integrator = self.adaptive_integrator();
        let vessel = self.vessels.get_mut(&guid)?;
        let start = vessel.last_state().ok_or_else(|| PluginError::VesselStateUnset(guid.to_string()))?;
        vessel.flight_plan().validate(start.0, last_time)?;
        let Some(ephemeris) = self.ephemeris.as_mut() else {
            return Err(PluginError::WrongPhase { operation: "update_flight_plan", phase: self.phase });
        };
        ephemeris.prolong(last_time);
        vessel.flight_plan_mut().update(&*ephemeris, &integrator, start, last_time)
    }

    pub fn flight_plan_size(&self, guid: &str) -> PluginResult<usize> {
        Ok(self.vessel(guid)?.1.flight_plan().size())
    }

    /// Δv of `manoeuvre` in world coordinates.
    pub fn manoeuvre_delta_v(&self, manoeuvre: &Manoeuvre) -> Vec3 {
        self.planetarium.to_world_vector(&manoeuvre.delta_v_vector())
    }

    // Rendering

    pub fn validate_frame(&self, frame: FrameKind) -> PluginResult<()> {
        let ephemeris = self.ephemeris("new_transforms")?;
        RenderingFrame::new(frame, ephemeris, self.sun()?).map(|_| ())
    }

    fn render(
        &self,
        operation: &'static str,
        frame: FrameKind,
        points: Vec<(Instant, StateVector)>,
        sun_world: &Vec3,
    ) -> PluginResult<Line> {
        let ephemeris = self.ephemeris(operation)?;
        let frame = RenderingFrame::new(frame, ephemeris, self.sun()?)?;
        let world = frame.render_points(points, self.current_time, &self.planetarium, sun_world)?;
        Ok(Line::from_points(&world))
    }

    pub fn rendered_vessel_trajectory(&self, guid: &str, frame: FrameKind, sun_world: &Vec3) -> PluginResult<Line> {
        let points = self.vessel(guid)?.1.trajectory_points();
        self.render("rendered_vessel_trajectory", frame, points, sun_world)
    }

    pub fn rendered_celestial_trajectory(&self, index: i32, frame: FrameKind, sun_world: &Vec3) -> PluginResult<Line> {
        let ephemeris = self.ephemeris("rendered_celestial_trajectory")?;
        let now = self.current_time;
        let mut points: Vec<_> = ephemeris.trajectory(index)?.iter().take_while(|(t, _)| *t <= now).collect();
        if points.last().map_or(true, |(t, _)| *t < now) {
            points.push((now, ephemeris.state_of(index, now)?));
        }
        self.render("rendered_celestial_trajectory", frame, points, sun_world)
    }

    pub fn rendered_prediction(&self, guid: &str, frame: FrameKind, sun_world: &Vec3) -> PluginResult<Line> {
        let (guid, vessel) = self.vessel(guid)?;
        if vessel.prediction().len() < 2 {
            return Err(PluginError::NoPrediction(guid.to_string()));
        }
        let points = vessel.prediction().iter().collect();
        self.render("rendered_prediction", frame, points, sun_world)
    }

    pub fn rendered_flight_plan(
        &self,
        guid: &str,
        phase: usize,
        frame: FrameKind,
        sun_world: &Vec3,
    ) -> PluginResult<Line> {
        let points = self.vessel(guid)?.1.flight_plan().segment(phase)?.iter().collect();
        self.render("rendered_flight_plan", frame, points, sun_world)
    }

    /// World direction of the vessel's velocity relative to `frame`.
    pub fn vessel_tangent(&self, guid: &str, frame: FrameKind) -> PluginResult<Vec3> {
        let ephemeris = self.ephemeris("vessel_tangent")?;
        let state = self.current_vessel_state(guid)?;
        RenderingFrame::new(frame, ephemeris, self.sun()?)?.tangent(self.current_time, &state, &self.planetarium)
    }

    pub fn navball_orientation(&self, frame: FrameKind) -> PluginResult<UnitQuaternion<f64>> {
        let ephemeris = self.ephemeris("navball_orientation")?;
        RenderingFrame::new(frame, ephemeris, self.sun()?)?.orientation(self.current_time, &self.planetarium)
    }

    // Lifecycle

    /// Releases everything the session owns. Any later call fails.
    pub fn destroy(&mut self) {
        self.hierarchy = CelestialHierarchy::new();
        self.ephemeris = None;
        self.vessels = VesselRegistry::new();
        self.bubble = PhysicsBubble::new();
        self.phase = Phase::Destroyed;
        info!("plugin destroyed");
    }
}
