//! signal-map-rs: headless map engine for dense, time-sliced point data.
//!
//! The crate clusters geotagged records against the current camera, renders
//! either discrete markers or a density surface, and drives a non-linear
//! year timeline with fixed-rate playback. Rendering backends plug in through
//! [`render::Renderer`]; time is supplied by the host as a monotonic clock.

pub mod api;
pub mod core;
pub mod error;
pub mod extensions;
pub mod interaction;
pub mod render;
pub mod telemetry;

pub use api::{MapEngine, MapEngineConfig};
pub use error::{MapError, MapResult};
