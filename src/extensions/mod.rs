//! Optional surfaces around the engine: plugin hooks and data export.
//!
//! Keep extensions decoupled from the core clustering and timeline paths.

pub mod export;
pub mod plugins;

pub use export::{POINT_SET_EXPORT_JSON_SCHEMA_V1, PointSetExport, PointSetExportJsonContractV1};
pub use plugins::{MapEvent, MapPlugin, PluginContext};
