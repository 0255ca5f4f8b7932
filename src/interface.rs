//! The handle-based surface the host drives.
//!
//! Every resource crossing the boundary (plugins, transforms, rendered lines,
//! manoeuvres, snapshot cursors) lives in a [`HandleTable`] and is referred to
//! by a typed [`Handle`]. Lifetimes are enforced here: a transform cannot be
//! released while lines built from it are live, and a plugin cannot be
//! destroyed while transforms or lines derived from it are live.

use crate::bubble::Part;
use crate::celestial::DirectCelestial;
use crate::config::PluginConfig;
use crate::ephemeris::Oblateness;
use crate::error::{PluginError, PluginResult};
use crate::geometry::{LineSegment, StateVector, Vec3};
use crate::handles::{Handle, HandleTable};
use crate::manoeuvre::{Manoeuvre, ManoeuvreParameters};
use crate::plugin::Plugin;
use crate::rendering::{FrameKind, Line};
use crate::snapshot::{PluginDeserializer, PluginSerializer, DEFAULT_CHUNK_SIZE};
use nalgebra::UnitQuaternion;
use tracing::info;

/// A frame choice bound to the plugin it was created for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transforms {
    pub plugin: Handle<Plugin>,
    pub frame: FrameKind,
}

#[derive(Debug)]
pub struct RenderedLine {
    pub transforms: Handle<Transforms>,
    pub line: Line,
}

pub struct PluginInterface {
    plugins: HandleTable<Plugin>,
    transforms: HandleTable<Transforms>,
    lines: HandleTable<RenderedLine>,
    manoeuvres: HandleTable<Manoeuvre>,
    serializers: HandleTable<PluginSerializer>,
    deserializers: HandleTable<PluginDeserializer>,
}

impl Default for PluginInterface {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginInterface {
    pub fn new() -> Self {
        Self {
            plugins: HandleTable::new("plugin"),
            transforms: HandleTable::new("transforms"),
            lines: HandleTable::new("line"),
            manoeuvres: HandleTable::new("manoeuvre"),
            serializers: HandleTable::new("serializer"),
            deserializers: HandleTable::new("deserializer"),
        }
    }

    pub fn plugin(&self, plugin: Handle<Plugin>) -> PluginResult<&Plugin> {
        self.plugins.get(plugin)
    }

    pub fn plugin_mut(&mut self, plugin: Handle<Plugin>) -> PluginResult<&mut Plugin> {
        self.plugins.get_mut(plugin)
    }

    pub fn live_plugins(&self) -> usize {
        self.plugins.len()
    }

    // Lifecycle

    pub fn new_plugin(&mut self, initial_time: f64, planetarium_rotation: f64) -> PluginResult<Handle<Plugin>> {
        Ok(self.plugins.insert(Plugin::new(initial_time, planetarium_rotation)?))
    }

    pub fn new_plugin_with_config(
        &mut self,
        initial_time: f64,
        planetarium_rotation: f64,
        config: PluginConfig,
    ) -> PluginResult<Handle<Plugin>> {
        Ok(self.plugins.insert(Plugin::with_config(initial_time, planetarium_rotation, config)?))
    }

    pub fn delete_plugin(&mut self, plugin: Handle<Plugin>) -> PluginResult<()> {
        self.plugins.get(plugin)?;
        let transforms = self.transforms.iter().filter(|(_, t)| t.plugin == plugin).count();
        if transforms > 0 {
            return Err(PluginError::LiveDependents { kind: "plugin", count: transforms });
        }
        let mut released = self.plugins.remove(plugin)?;
        released.destroy();
        Ok(())
    }

    // Hierarchy

    pub fn insert_sun(&mut self, plugin: Handle<Plugin>, index: i32, gravitational_parameter: f64) -> PluginResult<()> {
        self.plugins.get_mut(plugin)?.insert_sun(index, gravitational_parameter)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn insert_celestial(
        &mut self,
        plugin: Handle<Plugin>,
        index: i32,
        parent: i32,
        gravitational_parameter: f64,
        oblateness: Option<Oblateness>,
        from_parent: StateVector,
    ) -> PluginResult<()> {
        self.plugins.get_mut(plugin)?.insert_celestial(index, parent, gravitational_parameter, oblateness, from_parent)
    }

    pub fn directly_insert_celestial(&mut self, plugin: Handle<Plugin>, celestial: &DirectCelestial) -> PluginResult<()> {
        self.plugins.get_mut(plugin)?.directly_insert_celestial(celestial)
    }

    pub fn end_initialization(&mut self, plugin: Handle<Plugin>) -> PluginResult<()> {
        self.plugins.get_mut(plugin)?.end_initialization()
    }

    pub fn update_celestial_hierarchy(&mut self, plugin: Handle<Plugin>, index: i32, parent: i32) -> PluginResult<()> {
        self.plugins.get_mut(plugin)?.update_celestial_hierarchy(index, parent)
    }

    // Transforms

    fn new_transforms(&mut self, plugin: Handle<Plugin>, frame: FrameKind) -> PluginResult<Handle<Transforms>> {
        self.plugins.get(plugin)?.validate_frame(frame)?;
        Ok(self.transforms.insert(Transforms { plugin, frame }))
    }

    pub fn new_body_centred_non_rotating_transforms(
        &mut self,
        plugin: Handle<Plugin>,
        reference: i32,
    ) -> PluginResult<Handle<Transforms>> {
        self.new_transforms(plugin, FrameKind::BodyCentredNonRotating { reference })
    }

    pub fn new_barycentric_rotating_transforms(
        &mut self,
        plugin: Handle<Plugin>,
        primary: i32,
        secondary: i32,
    ) -> PluginResult<Handle<Transforms>> {
        self.new_transforms(plugin, FrameKind::BarycentricRotating { primary, secondary })
    }

    pub fn delete_transforms(&mut self, transforms: Handle<Transforms>) -> PluginResult<()> {
        self.transforms.get(transforms)?;
        let lines = self.lines.iter().filter(|(_, line)| line.transforms == transforms).count();
        if lines > 0 {
            return Err(PluginError::LiveDependents { kind: "transforms", count: lines });
        }
        self.transforms.remove(transforms).map(|_| ())
    }

    fn frame_of(&self, plugin: Handle<Plugin>, transforms: Handle<Transforms>) -> PluginResult<FrameKind> {
        let bound = self.transforms.get(transforms)?;
        if bound.plugin != plugin {
            return Err(PluginError::ForeignTransforms);
        }
        Ok(bound.frame)
    }

    // Rendering

    fn issue_line(&mut self, transforms: Handle<Transforms>, line: Line) -> Handle<RenderedLine> {
        self.lines.insert(RenderedLine { transforms, line })
    }

    pub fn rendered_vessel_trajectory(
        &mut self,
        plugin: Handle<Plugin>,
        guid: &str,
        transforms: Handle<Transforms>,
        sun_world: &Vec3,
    ) -> PluginResult<Handle<RenderedLine>> {
        let frame = self.frame_of(plugin, transforms)?;
        let line = self.plugins.get(plugin)?.rendered_vessel_trajectory(guid, frame, sun_world)?;
        Ok(self.issue_line(transforms, line))
    }

    pub fn rendered_celestial_trajectory(
        &mut self,
        plugin: Handle<Plugin>,
        index: i32,
        transforms: Handle<Transforms>,
        sun_world: &Vec3,
    ) -> PluginResult<Handle<RenderedLine>> {
        let frame = self.frame_of(plugin, transforms)?;
        let line = self.plugins.get(plugin)?.rendered_celestial_trajectory(index, frame, sun_world)?;
        Ok(self.issue_line(transforms, line))
    }

    pub fn rendered_prediction(
        &mut self,
        plugin: Handle<Plugin>,
        guid: &str,
        transforms: Handle<Transforms>,
        sun_world: &Vec3,
    ) -> PluginResult<Handle<RenderedLine>> {
        let frame = self.frame_of(plugin, transforms)?;
        let line = self.plugins.get(plugin)?.rendered_prediction(guid, frame, sun_world)?;
        Ok(self.issue_line(transforms, line))
    }

    pub fn rendered_flight_plan(
        &mut self,
        plugin: Handle<Plugin>,
        guid: &str,
        phase: usize,
        transforms: Handle<Transforms>,
        sun_world: &Vec3,
    ) -> PluginResult<Handle<RenderedLine>> {
        let frame = self.frame_of(plugin, transforms)?;
        let line = self.plugins.get(plugin)?.rendered_flight_plan(guid, phase, frame, sun_world)?;
        Ok(self.issue_line(transforms, line))
    }

    pub fn vessel_tangent(&self, plugin: Handle<Plugin>, guid: &str, transforms: Handle<Transforms>) -> PluginResult<Vec3> {
        let frame = self.frame_of(plugin, transforms)?;
        self.plugins.get(plugin)?.vessel_tangent(guid, frame)
    }

    pub fn navball_orientation(
        &self,
        plugin: Handle<Plugin>,
        transforms: Handle<Transforms>,
    ) -> PluginResult<UnitQuaternion<f64>> {
        let frame = self.frame_of(plugin, transforms)?;
        self.plugins.get(plugin)?.navball_orientation(frame)
    }

    pub fn number_of_segments(&self, line: Handle<RenderedLine>) -> PluginResult<usize> {
        Ok(self.lines.get(line)?.line.number_of_segments())
    }

    pub fn fetch_and_increment(&mut self, line: Handle<RenderedLine>) -> PluginResult<LineSegment> {
        self.lines.get_mut(line)?.line.fetch_and_increment()
    }

    pub fn at_end(&self, line: Handle<RenderedLine>) -> PluginResult<bool> {
        Ok(self.lines.get(line)?.line.at_end())
    }

    pub fn delete_line(&mut self, line: Handle<RenderedLine>) -> PluginResult<()> {
        self.lines.remove(line).map(|_| ())
    }

    // Bubble

    pub fn add_vessel_to_next_physics_bubble(
        &mut self,
        plugin: Handle<Plugin>,
        guid: &str,
        parts: Vec<Part>,
    ) -> PluginResult<()> {
        self.plugins.get_mut(plugin)?.add_vessel_to_next_physics_bubble(guid, parts)
    }

    pub fn physics_bubble_is_empty(&self, plugin: Handle<Plugin>) -> PluginResult<bool> {
        Ok(self.plugins.get(plugin)?.physics_bubble_is_empty())
    }

    pub fn bubble_displacement_correction(&self, plugin: Handle<Plugin>, sun_world: &Vec3) -> PluginResult<Vec3> {
        self.plugins.get(plugin)?.bubble_displacement_correction(sun_world)
    }

    pub fn bubble_velocity_correction(&self, plugin: Handle<Plugin>, reference_body: i32) -> PluginResult<Vec3> {
        self.plugins.get(plugin)?.bubble_velocity_correction(reference_body)
    }

    // Manoeuvres

    pub fn new_manoeuvre(&mut self, parameters: &ManoeuvreParameters) -> PluginResult<Handle<Manoeuvre>> {
        Ok(self.manoeuvres.insert(Manoeuvre::from_parameters(parameters)?))
    }

    pub fn manoeuvre(&self, manoeuvre: Handle<Manoeuvre>) -> PluginResult<&Manoeuvre> {
        self.manoeuvres.get(manoeuvre)
    }

    pub fn manoeuvre_mut(&mut self, manoeuvre: Handle<Manoeuvre>) -> PluginResult<&mut Manoeuvre> {
        self.manoeuvres.get_mut(manoeuvre)
    }

    pub fn delete_manoeuvre(&mut self, manoeuvre: Handle<Manoeuvre>) -> PluginResult<()> {
        self.manoeuvres.remove(manoeuvre).map(|_| ())
    }

    /// World Δv of a manoeuvre, using the plugin's planetarium orientation.
    pub fn manoeuvre_delta_v(&self, plugin: Handle<Plugin>, manoeuvre: Handle<Manoeuvre>) -> PluginResult<Vec3> {
        let manoeuvre = self.manoeuvres.get(manoeuvre)?;
        Ok(self.plugins.get(plugin)?.manoeuvre_delta_v(manoeuvre))
    }

    pub fn flight_plan_count(&self, plugin: Handle<Plugin>, guid: &str) -> PluginResult<usize> {
        self.plugins.get(plugin)?.flight_plan_count(guid)
    }

    /// Copies the manoeuvre at `index` into a new manoeuvre handle.
    pub fn flight_plan_get(&mut self, plugin: Handle<Plugin>, guid: &str, index: usize) -> PluginResult<Handle<Manoeuvre>> {
        let manoeuvre = self.plugins.get(plugin)?.flight_plan_get(guid, index)?;
        Ok(self.manoeuvres.insert(manoeuvre))
    }

    pub fn flight_plan_set(
        &mut self,
        plugin: Handle<Plugin>,
        guid: &str,
        index: usize,
        manoeuvre: Handle<Manoeuvre>,
    ) -> PluginResult<()> {
        let manoeuvre = *self.manoeuvres.get(manoeuvre)?;
        self.plugins.get_mut(plugin)?.flight_plan_set(guid, index, manoeuvre)
    }

    pub fn flight_plan_insert(
        &mut self,
        plugin: Handle<Plugin>,
        guid: &str,
        index: usize,
        manoeuvre: Handle<Manoeuvre>,
    ) -> PluginResult<()> {
        let manoeuvre = *self.manoeuvres.get(manoeuvre)?;
        self.plugins.get_mut(plugin)?.flight_plan_insert(guid, index, manoeuvre)
    }

    pub fn flight_plan_clear(&mut self, plugin: Handle<Plugin>, guid: &str) -> PluginResult<()> {
        self.plugins.get_mut(plugin)?.flight_plan_clear(guid)
    }

    // Snapshots

    pub fn serialize_plugin(&mut self, plugin: Handle<Plugin>) -> PluginResult<Handle<PluginSerializer>> {
        let serializer = PluginSerializer::new(self.plugins.get(plugin)?, DEFAULT_CHUNK_SIZE)?;
        Ok(self.serializers.insert(serializer))
    }

    /// Next chunk of the stream, `None` once it is exhausted.
    pub fn serializer_next_chunk(&mut self, serializer: Handle<PluginSerializer>) -> PluginResult<Option<Vec<u8>>> {
        Ok(self.serializers.get_mut(serializer)?.next_chunk().map(<[u8]>::to_vec))
    }

    pub fn delete_serializer(&mut self, serializer: Handle<PluginSerializer>) -> PluginResult<()> {
        self.serializers.remove(serializer).map(|_| ())
    }

    pub fn new_deserializer(&mut self) -> Handle<PluginDeserializer> {
        self.deserializers.insert(PluginDeserializer::new())
    }

    pub fn deserializer_feed(&mut self, deserializer: Handle<PluginDeserializer>, chunk: &[u8]) -> PluginResult<()> {
        self.deserializers.get_mut(deserializer)?.feed(chunk);
        Ok(())
    }

    /// Consumes the deserializer, whether or not the stream decodes.
    pub fn deserializer_finish(&mut self, deserializer: Handle<PluginDeserializer>) -> PluginResult<Handle<Plugin>> {
        let plugin = self.deserializers.remove(deserializer)?.finish()?;
        info!("restored plugin at t = {} s", plugin.current_time());
        Ok(self.plugins.insert(plugin))
    }
}
