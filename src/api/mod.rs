//! Engine facade and the controllers it coordinates.
//!
//! `MapEngine` is split across files by concern; each file adds one
//! `impl<R: Renderer> MapEngine<R>` block.

pub mod aggregates;
mod data_controller;
pub mod data_source;
mod engine;
mod engine_clock;
mod engine_config;
mod engine_init;
mod engine_snapshot;
mod interaction_controller;
mod layer_controller;
pub mod playback;
mod plugin_dispatch;
mod plugin_registry;
pub mod point_set;
mod timeline_controller;
pub mod viewport_controller;

pub use aggregates::{
    CategoryCount, StatsResponse, TOP_CATEGORY_LIMIT, YearCount, YearCountsResponse, YearRange,
    bucket_year, point_year,
};
pub use data_source::{
    ALL_CATEGORIES, PointSetRequest, PointSetResponse, PointSetSource, StaticPointSource,
};
pub use engine::{DataStatus, MapEngine};
pub use engine_clock::ClockAdvance;
pub use engine_config::MapEngineConfig;
pub use engine_snapshot::{EngineSnapshot, LayerSummary};
pub use playback::{PlaybackConfig, PlaybackScheduler, PlaybackSpeed, PlaybackTick, TimelineState};
pub use point_set::ActivePointSet;
pub use viewport_controller::{
    ClickOutcome, LayerState, RebuildReason, RenderMode, ViewportRenderController,
};

pub use crate::extensions::{MapEvent, MapPlugin, PluginContext};
