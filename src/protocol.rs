use crate::bubble::Part;
use crate::celestial::DirectCelestial;
use crate::config::PluginConfig;
use crate::ephemeris::Oblateness;
use crate::error::{ErrorKind, PluginError};
use crate::geometry::{LineSegment, StateVector, Vec3};
use crate::handles::Handle;
use crate::interface::PluginInterface;
use crate::manoeuvre::{Manoeuvre, ManoeuvreParameters};
use arrayvec::ArrayString;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const MAX_COMMAND_SIZE: usize = 32 * 1024;
pub const MAX_RESPONSE_SIZE: usize = 32 * 1024;
pub const DEFAULT_PORT: u16 = 8080;

pub type CommandBuffer = ArrayString<MAX_COMMAND_SIZE>;
pub type ResponseBuffer = ArrayString<MAX_RESPONSE_SIZE>;

pub type WireVector = [f64; 3];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WireState {
    pub q: WireVector,
    pub p: WireVector,
}

impl From<WireState> for StateVector {
    fn from(state: WireState) -> Self {
        StateVector::new(Vec3::from(state.q), Vec3::from(state.p))
    }
}

impl From<StateVector> for WireState {
    fn from(state: StateVector) -> Self {
        WireState { q: state.q.into(), p: state.p.into() }
    }
}

/// Oblateness with the axis as right ascension and declination, in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WireOblateness {
    pub axis_right_ascension: f64,
    pub axis_declination: f64,
    pub j2: f64,
    pub reference_radius: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WirePart {
    pub position: WireVector,
    pub velocity: WireVector,
    pub mass: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub id: u32,
    pub timestamp: u64,
    pub command_type: CommandType,
}

/// One variant per interface call. Handles travel as raw `u64`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CommandType {
    Ping,

    NewPlugin { initial_time: f64, planetarium_rotation: f64, config: Option<PluginConfig> },
    DeletePlugin { plugin: u64 },
    CurrentTime { plugin: u64 },

    InsertSun { plugin: u64, index: i32, gravitational_parameter: f64 },
    InsertCelestial {
        plugin: u64,
        index: i32,
        parent: i32,
        gravitational_parameter: f64,
        oblateness: Option<WireOblateness>,
        from_parent: WireState,
    },
    DirectlyInsertCelestial { plugin: u64, celestial: DirectCelestial },
    EndInitialization { plugin: u64 },
    UpdateCelestialHierarchy { plugin: u64, index: i32, parent: i32 },
    CelestialFromParent { plugin: u64, index: i32 },

    InsertOrKeepVessel { plugin: u64, guid: String, parent: i32 },
    SetVesselStateOffset { plugin: u64, guid: String, from_parent: WireState },
    HasVessel { plugin: u64, guid: String },
    VesselFromParent { plugin: u64, guid: String },
    AdvanceTime { plugin: u64, time: f64, planetarium_rotation: f64 },
    ForgetAllHistoriesBefore { plugin: u64, time: f64 },

    NewBodyCentredNonRotatingTransforms { plugin: u64, reference: i32 },
    NewBarycentricRotatingTransforms { plugin: u64, primary: i32, secondary: i32 },
    DeleteTransforms { transforms: u64 },
    RenderedVesselTrajectory { plugin: u64, guid: String, transforms: u64, sun_world: WireVector },
    RenderedCelestialTrajectory { plugin: u64, index: i32, transforms: u64, sun_world: WireVector },
    RenderedPrediction { plugin: u64, guid: String, transforms: u64, sun_world: WireVector },
    RenderedFlightPlan { plugin: u64, guid: String, phase: usize, transforms: u64, sun_world: WireVector },
    VesselTangent { plugin: u64, guid: String, transforms: u64 },
    NavballOrientation { plugin: u64, transforms: u64 },
    NumberOfSegments { line: u64 },
    FetchAndIncrement { line: u64 },
    AtEnd { line: u64 },
    DeleteLine { line: u64 },

    AddVesselToNextPhysicsBubble { plugin: u64, guid: String, parts: Vec<WirePart> },
    PhysicsBubbleIsEmpty { plugin: u64 },
    BubbleDisplacementCorrection { plugin: u64, sun_world: WireVector },
    BubbleVelocityCorrection { plugin: u64, reference_body: i32 },

    SetPredictionLength { plugin: u64, value: f64 },
    SetPredictionLengthTolerance { plugin: u64, value: f64 },
    SetPredictionSpeedTolerance { plugin: u64, value: f64 },
    UpdatePrediction { plugin: u64, guid: String },
    HasPrediction { plugin: u64, guid: String },

    NewManoeuvre { parameters: ManoeuvreParameters },
    DeleteManoeuvre { manoeuvre: u64 },
    ManoeuvreInfo { manoeuvre: u64 },
    ManoeuvreSetDuration { manoeuvre: u64, duration: f64 },
    ManoeuvreSetDeltaV { manoeuvre: u64, delta_v: f64 },
    ManoeuvreSetInitialTime { manoeuvre: u64, initial_time: f64 },
    ManoeuvreDeltaV { plugin: u64, manoeuvre: u64 },
    FlightPlanCount { plugin: u64, guid: String },
    FlightPlanGet { plugin: u64, guid: String, index: usize },
    FlightPlanSet { plugin: u64, guid: String, index: usize, manoeuvre: u64 },
    FlightPlanInsert { plugin: u64, guid: String, index: usize, manoeuvre: u64 },
    FlightPlanClear { plugin: u64, guid: String },
    UpdateFlightPlan { plugin: u64, guid: String, last_time: f64 },
    FlightPlanSize { plugin: u64, guid: String },

    SerializePlugin { plugin: u64 },
    SerializerNextChunk { serializer: u64 },
    DeleteSerializer { serializer: u64 },
    NewDeserializer,
    DeserializerFeed {
        deserializer: u64,
        #[serde(with = "serde_bytes")]
        chunk: Vec<u8>,
    },
    DeserializerFinish { deserializer: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ManoeuvreInfo {
    pub parameters: ManoeuvreParameters,
    pub final_time: f64,
    pub final_mass: f64,
    pub time_of_half_delta_v: f64,
    pub delta_v: f64,
    pub mass_flow: f64,
    pub exhaust_speed: f64,
    pub direction: WireVector,
}

impl From<&Manoeuvre> for ManoeuvreInfo {
    fn from(manoeuvre: &Manoeuvre) -> Self {
        ManoeuvreInfo {
            parameters: manoeuvre.parameters(),
            final_time: manoeuvre.final_time().seconds(),
            final_mass: manoeuvre.final_mass(),
            time_of_half_delta_v: manoeuvre.time_of_half_delta_v().seconds(),
            delta_v: manoeuvre.delta_v(),
            mass_flow: manoeuvre.mass_flow(),
            exhaust_speed: manoeuvre.exhaust_speed(),
            direction: manoeuvre.direction().into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponsePayload {
    Handle { raw: u64 },
    Bool { value: bool },
    Count { value: usize },
    Time { seconds: f64 },
    State(WireState),
    Vector { value: WireVector },
    Segment { begin: WireVector, end: WireVector },
    Quaternion { w: f64, x: f64, y: f64, z: f64 },
    Manoeuvre(ManoeuvreInfo),
    Chunk {
        #[serde(with = "serde_bytes")]
        bytes: Vec<u8>,
    },
    StreamEnd,
}

impl From<LineSegment> for ResponsePayload {
    fn from(segment: LineSegment) -> Self {
        ResponsePayload::Segment { begin: segment.begin.into(), end: segment.end.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub id: u32,
    pub timestamp: u64,
    pub status: ResponseStatus,
    pub message: Option<String>,
    pub payload: Option<ResponsePayload>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    Success,
    Sequencing,
    UnknownReference,
    MalformedInput,
    ResourceLifetime,
    InvalidCommand,
}

impl From<ErrorKind> for ResponseStatus {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Sequencing => ResponseStatus::Sequencing,
            ErrorKind::UnknownReference => ResponseStatus::UnknownReference,
            ErrorKind::MalformedInput => ResponseStatus::MalformedInput,
            ErrorKind::ResourceLifetime => ResponseStatus::ResourceLifetime,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    InvalidJson,
    MessageTooLarge,
    SerializationError,
    InvalidCommand,
}

impl core::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ProtocolError::InvalidJson => write!(f, "Invalid JSON format"),
            ProtocolError::MessageTooLarge => write!(f, "Message exceeds buffer size"),
            ProtocolError::SerializationError => write!(f, "Serialization failed"),
            ProtocolError::InvalidCommand => write!(f, "Invalid command"),
        }
    }
}

type Outcome = Result<Option<ResponsePayload>, PluginError>;

fn handle(raw: u64) -> Outcome {
    Ok(Some(ResponsePayload::Handle { raw }))
}

fn boolean(value: bool) -> Outcome {
    Ok(Some(ResponsePayload::Bool { value }))
}

fn count(value: usize) -> Outcome {
    Ok(Some(ResponsePayload::Count { value }))
}

fn vector(value: Vec3) -> Outcome {
    Ok(Some(ResponsePayload::Vector { value: value.into() }))
}

fn state(value: StateVector) -> Outcome {
    Ok(Some(ResponsePayload::State(value.into())))
}

/// Parses, dispatches and answers line-delimited JSON commands against one
/// [`PluginInterface`].
pub struct ProtocolHandler {
    interface: PluginInterface,
    command_counter: u32,

    // Preallocated buffers
    command_buffer: Box<CommandBuffer>,
    response_buffer: Box<ResponseBuffer>,
}

impl Default for ProtocolHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolHandler {
    pub fn new() -> Self {
        Self {
            interface: PluginInterface::new(),
            command_counter: 0,
            command_buffer: Box::new(ArrayString::new()),
            response_buffer: Box::new(ArrayString::new()),
        }
    }

    pub fn interface(&self) -> &PluginInterface {
        &self.interface
    }

    pub fn interface_mut(&mut self) -> &mut PluginInterface {
        &mut self.interface
    }

    pub fn parse_command(&mut self, json_str: &str) -> Result<Command, ProtocolError> {
        self.command_buffer.clear();
        if json_str.len() > MAX_COMMAND_SIZE {
            return Err(ProtocolError::MessageTooLarge);
        }
        self.command_buffer.push_str(json_str);

        serde_json::from_str::<Command>(&self.command_buffer).map_err(|_| ProtocolError::InvalidJson)
    }

    pub fn serialize_response(&mut self, response: &CommandResponse) -> Result<&str, ProtocolError> {
        self.response_buffer.clear();

        let json_str = serde_json::to_string(response).map_err(|_| ProtocolError::SerializationError)?;

        if json_str.len() > MAX_RESPONSE_SIZE {
            return Err(ProtocolError::MessageTooLarge);
        }
        self.response_buffer.push_str(&json_str);

        Ok(&self.response_buffer)
    }

    pub fn validate_command(&self, command: &Command) -> Result<(), ProtocolError> {
        if command.id == 0 {
            return Err(ProtocolError::InvalidCommand);
        }
        Ok(())
    }

    pub fn create_response(
        &self,
        command_id: u32,
        status: ResponseStatus,
        message: Option<&str>,
        payload: Option<ResponsePayload>,
    ) -> CommandResponse {
        CommandResponse {
            id: command_id,
            timestamp: Self::get_timestamp(),
            status,
            message: message.map(str::to_string),
            payload,
        }
    }

    pub fn next_command_id(&mut self) -> u32 {
        self.command_counter = self.command_counter.wrapping_add(1);
        self.command_counter
    }

    fn get_timestamp() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0)
    }

    /// Handles one request line and returns the serialized response line.
    pub fn handle_line(&mut self, line: &str) -> String {
        let response = match self.parse_command(line) {
            Ok(command) => match self.validate_command(&command) {
                Ok(()) => self.execute(command),
                Err(e) => self.create_response(command.id, ResponseStatus::InvalidCommand, Some(&e.to_string()), None),
            },
            Err(e) => self.create_response(0, ResponseStatus::InvalidCommand, Some(&e.to_string()), None),
        };
        let serialized = self.serialize_response(&response).map(str::to_string);
        match serialized {
            Ok(json) => json,
            Err(e) => {
                let fallback = self.create_response(response.id, ResponseStatus::InvalidCommand, Some(&e.to_string()), None);
                serde_json::to_string(&fallback).unwrap_or_default()
            }
        }
    }

    pub fn execute(&mut self, command: Command) -> CommandResponse {
        debug!("executing command {}: {:?}", command.id, command.command_type);
        match self.dispatch(command.command_type) {
            Ok(payload) => self.create_response(command.id, ResponseStatus::Success, None, payload),
            Err(e) => self.create_response(command.id, e.kind().into(), Some(&e.to_string()), None),
        }
    }

    fn dispatch(&mut self, command_type: CommandType) -> Outcome {
        let interface = &mut self.interface;
        match command_type {
            CommandType::Ping => Ok(None),

            CommandType::NewPlugin { initial_time, planetarium_rotation, config } => {
                let plugin = match config {
                    Some(config) => interface.new_plugin_with_config(initial_time, planetarium_rotation, config)?,
                    None => interface.new_plugin(initial_time, planetarium_rotation)?,
                };
                handle(plugin.raw())
            }
            CommandType::DeletePlugin { plugin } => {
                interface.delete_plugin(Handle::from_raw(plugin))?;
                Ok(None)
            }
            CommandType::CurrentTime { plugin } => {
                let seconds = interface.plugin(Handle::from_raw(plugin))?.current_time();
                Ok(Some(ResponsePayload::Time { seconds }))
            }

            CommandType::InsertSun { plugin, index, gravitational_parameter } => {
                interface.insert_sun(Handle::from_raw(plugin), index, gravitational_parameter)?;
                Ok(None)
            }
            CommandType::InsertCelestial { plugin, index, parent, gravitational_parameter, oblateness, from_parent } => {
                let oblateness = oblateness
                    .map(|o| Oblateness::new(o.axis_right_ascension, o.axis_declination, o.j2, o.reference_radius))
                    .transpose()?;
                interface.insert_celestial(
                    Handle::from_raw(plugin),
                    index,
                    parent,
                    gravitational_parameter,
                    oblateness,
                    from_parent.into(),
                )?;
                Ok(None)
            }
            CommandType::DirectlyInsertCelestial { plugin, celestial } => {
                interface.directly_insert_celestial(Handle::from_raw(plugin), &celestial)?;
                Ok(None)
            }
            CommandType::EndInitialization { plugin } => {
                interface.end_initialization(Handle::from_raw(plugin))?;
                Ok(None)
            }
            CommandType::UpdateCelestialHierarchy { plugin, index, parent } => {
                interface.update_celestial_hierarchy(Handle::from_raw(plugin), index, parent)?;
                Ok(None)
            }
            CommandType::CelestialFromParent { plugin, index } => {
                state(interface.plugin(Handle::from_raw(plugin))?.celestial_from_parent(index)?)
            }

            CommandType::InsertOrKeepVessel { plugin, guid, parent } => {
                boolean(interface.plugin_mut(Handle::from_raw(plugin))?.insert_or_keep_vessel(&guid, parent)?)
            }
            CommandType::SetVesselStateOffset { plugin, guid, from_parent } => {
                interface.plugin_mut(Handle::from_raw(plugin))?.set_vessel_state_offset(&guid, from_parent.into())?;
                Ok(None)
            }
            CommandType::HasVessel { plugin, guid } => boolean(interface.plugin(Handle::from_raw(plugin))?.has_vessel(&guid)),
            CommandType::VesselFromParent { plugin, guid } => {
                state(interface.plugin(Handle::from_raw(plugin))?.vessel_from_parent(&guid)?)
            }
            CommandType::AdvanceTime { plugin, time, planetarium_rotation } => {
                interface.plugin_mut(Handle::from_raw(plugin))?.advance_time(time, planetarium_rotation)?;
                Ok(None)
            }
            CommandType::ForgetAllHistoriesBefore { plugin, time } => {
                interface.plugin_mut(Handle::from_raw(plugin))?.forget_history_before(time)?;
                Ok(None)
            }

            CommandType::NewBodyCentredNonRotatingTransforms { plugin, reference } => {
                handle(interface.new_body_centred_non_rotating_transforms(Handle::from_raw(plugin), reference)?.raw())
            }
            CommandType::NewBarycentricRotatingTransforms { plugin, primary, secondary } => {
                handle(interface.new_barycentric_rotating_transforms(Handle::from_raw(plugin), primary, secondary)?.raw())
            }
            CommandType::DeleteTransforms { transforms } => {
                interface.delete_transforms(Handle::from_raw(transforms))?;
                Ok(None)
            }
            CommandType::RenderedVesselTrajectory { plugin, guid, transforms, sun_world } => handle(
                interface
                    .rendered_vessel_trajectory(Handle::from_raw(plugin), &guid, Handle::from_raw(transforms), &sun_world.into())?
                    .raw(),
            ),
            CommandType::RenderedCelestialTrajectory { plugin, index, transforms, sun_world } => handle(
                interface
                    .rendered_celestial_trajectory(Handle::from_raw(plugin), index, Handle::from_raw(transforms), &sun_world.into())?
                    .raw(),
            ),
            CommandType::RenderedPrediction { plugin, guid, transforms, sun_world } => handle(
                interface
                    .rendered_prediction(Handle::from_raw(plugin), &guid, Handle::from_raw(transforms), &sun_world.into())?
                    .raw(),
            ),
            CommandType::RenderedFlightPlan { plugin, guid, phase, transforms, sun_world } => handle(
                interface
                    .rendered_flight_plan(
                        Handle::from_raw(plugin),
                        &guid,
                        phase,
                        Handle::from_raw(transforms),
                        &sun_world.into(),
                    )?
                    .raw(),
            ),
            CommandType::VesselTangent { plugin, guid, transforms } => {
                vector(interface.vessel_tangent(Handle::from_raw(plugin), &guid, Handle::from_raw(transforms))?)
            }
            CommandType::NavballOrientation { plugin, transforms } => {
                let q = interface.navball_orientation(Handle::from_raw(plugin), Handle::from_raw(transforms))?;
                Ok(Some(ResponsePayload::Quaternion { w: q.w, x: q.i, y: q.j, z: q.k }))
            }
            CommandType::NumberOfSegments { line } => count(interface.number_of_segments(Handle::from_raw(line))?),
            CommandType::FetchAndIncrement { line } => {
                Ok(Some(interface.fetch_and_increment(Handle::from_raw(line))?.into()))
            }
            CommandType::AtEnd { line } => boolean(interface.at_end(Handle::from_raw(line))?),
            CommandType::DeleteLine { line } => {
                interface.delete_line(Handle::from_raw(line))?;
                Ok(None)
            }

            CommandType::AddVesselToNextPhysicsBubble { plugin, guid, parts } => {
                let parts = parts
                    .into_iter()
                    .map(|part| Part::new(part.position.into(), part.velocity.into(), part.mass))
                    .collect();
                interface.add_vessel_to_next_physics_bubble(Handle::from_raw(plugin), &guid, parts)?;
                Ok(None)
            }
            CommandType::PhysicsBubbleIsEmpty { plugin } => {
                boolean(interface.physics_bubble_is_empty(Handle::from_raw(plugin))?)
            }
            CommandType::BubbleDisplacementCorrection { plugin, sun_world } => {
                vector(interface.bubble_displacement_correction(Handle::from_raw(plugin), &sun_world.into())?)
            }
            CommandType::BubbleVelocityCorrection { plugin, reference_body } => {
                vector(interface.bubble_velocity_correction(Handle::from_raw(plugin), reference_body)?)
            }

            CommandType::SetPredictionLength { plugin, value } => {
                interface.plugin_mut(Handle::from_raw(plugin))?.set_prediction_length(value)?;
                Ok(None)
            }
            CommandType::SetPredictionLengthTolerance { plugin, value } => {
                interface.plugin_mut(Handle::from_raw(plugin))?.set_prediction_length_tolerance(value)?;
                Ok(None)
            }
            CommandType::SetPredictionSpeedTolerance { plugin, value } => {
                interface.plugin_mut(Handle::from_raw(plugin))?.set_prediction_speed_tolerance(value)?;
                Ok(None)
            }
            CommandType::UpdatePrediction { plugin, guid } => {
                interface.plugin_mut(Handle::from_raw(plugin))?.update_prediction(&guid)?;
                Ok(None)
            }
            CommandType::HasPrediction { plugin, guid } => {
                boolean(interface.plugin(Handle::from_raw(plugin))?.has_prediction(&guid)?)
            }

            CommandType::NewManoeuvre { parameters } => handle(interface.new_manoeuvre(&parameters)?.raw()),
            CommandType::DeleteManoeuvre { manoeuvre } => {
                interface.delete_manoeuvre(Handle::from_raw(manoeuvre))?;
                Ok(None)
            }
            CommandType::ManoeuvreInfo { manoeuvre } => {
                let manoeuvre = interface.manoeuvre(Handle::from_raw(manoeuvre))?;
                Ok(Some(ResponsePayload::Manoeuvre(manoeuvre.into())))
            }
            CommandType::ManoeuvreSetDuration { manoeuvre, duration } => {
                interface.manoeuvre_mut(Handle::from_raw(manoeuvre))?.set_duration(duration)?;
                Ok(None)
            }
            CommandType::ManoeuvreSetDeltaV { manoeuvre, delta_v } => {
                interface.manoeuvre_mut(Handle::from_raw(manoeuvre))?.set_delta_v(delta_v)?;
                Ok(None)
            }
            CommandType::ManoeuvreSetInitialTime { manoeuvre, initial_time } => {
                interface.manoeuvre_mut(Handle::from_raw(manoeuvre))?.set_initial_time(initial_time)?;
                Ok(None)
            }
            CommandType::ManoeuvreDeltaV { plugin, manoeuvre } => {
                vector(interface.manoeuvre_delta_v(Handle::from_raw(plugin), Handle::from_raw(manoeuvre))?)
            }
            CommandType::FlightPlanCount { plugin, guid } => {
                count(interface.flight_plan_count(Handle::from_raw(plugin), &guid)?)
            }
            CommandType::FlightPlanGet { plugin, guid, index } => {
                handle(interface.flight_plan_get(Handle::from_raw(plugin), &guid, index)?.raw())
            }
            CommandType::FlightPlanSet { plugin, guid, index, manoeuvre } => {
                interface.flight_plan_set(Handle::from_raw(plugin), &guid, index, Handle::from_raw(manoeuvre))?;
                Ok(None)
            }
            CommandType::FlightPlanInsert { plugin, guid, index, manoeuvre } => {
                interface.flight_plan_insert(Handle::from_raw(plugin), &guid, index, Handle::from_raw(manoeuvre))?;
                Ok(None)
            }
            CommandType::FlightPlanClear { plugin, guid } => {
                interface.flight_plan_clear(Handle::from_raw(plugin), &guid)?;
                Ok(None)
            }
            CommandType::UpdateFlightPlan { plugin, guid, last_time } => {
                interface.plugin_mut(Handle::from_raw(plugin))?.update_flight_plan(&guid, last_time)?;
                Ok(None)
            }
            CommandType::FlightPlanSize { plugin, guid } => {
                count(interface.plugin(Handle::from_raw(plugin))?.flight_plan_size(&guid)?)
            }

            CommandType::SerializePlugin { plugin } => handle(interface.serialize_plugin(Handle::from_raw(plugin))?.raw()),
            CommandType::SerializerNextChunk { serializer } => {
                match interface.serializer_next_chunk(Handle::from_raw(serializer))? {
                    Some(bytes) => Ok(Some(ResponsePayload::Chunk { bytes })),
                    None => Ok(Some(ResponsePayload::StreamEnd)),
                }
            }
            CommandType::DeleteSerializer { serializer } => {
                interface.delete_serializer(Handle::from_raw(serializer))?;
                Ok(None)
            }
            CommandType::NewDeserializer => handle(interface.new_deserializer().raw()),
            CommandType::DeserializerFeed { deserializer, chunk } => {
                interface.deserializer_feed(Handle::from_raw(deserializer), &chunk)?;
                Ok(None)
            }
            CommandType::DeserializerFinish { deserializer } => {
                handle(interface.deserializer_finish(Handle::from_raw(deserializer))?.raw())
            }
        }
    }
}
