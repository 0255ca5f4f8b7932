//! # Orrery
//!
//! Session protocol and state machine for an n-body orbital engine driven frame
//! by frame by a flight-simulator host.
//!
//! ## Features
//!
//! - **Two-phase sessions**: celestial hierarchy built while initializing, then
//!   frozen into an ephemeris when initialization ends
//! - **Vessel tracking**: per-frame mark-and-sweep registry with histories on a
//!   fixed grid and a prolongation to the current time
//! - **Physics bubble**: host-integrated parts reconciled through displacement
//!   and velocity corrections
//! - **Flight plans**: constant-thrust manoeuvres with derived burn quantities
//!   and burn/coast segments
//! - **Rendering**: trajectories expressed in body-centred or barycentric
//!   rotating frames, consumed as segment iterators
//! - **Snapshots**: chunked, checksummed byte streams of a whole session
//! - **Handles**: generational handles for every resource the host owns
//!
//! ## Quick Start
//!
//! ```rust
//! use orrery::geometry::{StateVector, Vec3};
//! use orrery::rendering::FrameKind;
//! use orrery::Plugin;
//!
//! let mut plugin = Plugin::new(0.0, 0.0).unwrap();
//! plugin.insert_sun(0, 1.0).unwrap();
//! plugin.end_initialization().unwrap();
//!
//! plugin.insert_or_keep_vessel("V1", 0).unwrap();
//! let offset = StateVector::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
//! plugin.set_vessel_state_offset("V1", offset).unwrap();
//! plugin.advance_time(10.0, 0.0).unwrap();
//!
//! let frame = FrameKind::BodyCentredNonRotating { reference: 0 };
//! let mut line = plugin.rendered_vessel_trajectory("V1", frame, &Vec3::zeros()).unwrap();
//! while !line.at_end() {
//!     let segment = line.fetch_and_increment().unwrap();
//!     println!("{:?} -> {:?}", segment.begin, segment.end);
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`plugin`] - The session state machine
//! - [`interface`] - Handle-based surface driven by the host
//! - [`protocol`] - JSON command/response protocol over the interface
//! - [`celestial`], [`ephemeris`] - Bodies and their trajectories
//! - [`vessel`], [`bubble`], [`flight_plan`], [`manoeuvre`] - Vessels
//! - [`rendering`] - Frames and segment iterators
//! - [`snapshot`] - Session serialization

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

extern crate alloc;

pub mod bubble;
pub mod celestial;
pub mod config;
pub mod ephemeris;
pub mod error;
pub mod flight_plan;
pub mod geometry;
pub mod handles;
pub mod integrator;
pub mod interface;
pub mod manoeuvre;
pub mod plugin;
pub mod precision;
pub mod protocol;
pub mod rendering;
pub mod snapshot;
pub mod trajectory;
pub mod vessel;

// Re-export main public types for convenience
pub use config::PluginConfig;
pub use error::{ErrorKind, PluginError, PluginResult};
pub use interface::PluginInterface;
pub use plugin::{Phase, Plugin};
pub use protocol::{Command, CommandResponse, ProtocolHandler};
