use serde::{Deserialize, Serialize};

use crate::api::playback::PlaybackConfig;
use crate::api::viewport_controller::RenderMode;
use crate::core::cluster_index::ClusterIndexConfig;
use crate::core::timeline::{DEFAULT_ANCHOR_YEARS, DEFAULT_YEAR, MAX_YEAR, MIN_YEAR, TimelineMapper};
use crate::core::types::{LonLat, Viewport};
use crate::error::{MapError, MapResult};
use crate::render::{DensityConfig, RenderProfile};

/// Public engine bootstrap configuration.
///
/// This type is serializable so host applications can persist/load map setup
/// without inventing their own ad-hoc format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapEngineConfig {
    pub viewport: Viewport,
    #[serde(default = "default_center")]
    pub center: LonLat,
    #[serde(default = "default_zoom")]
    pub zoom: f64,
    #[serde(default = "default_min_zoom")]
    pub min_zoom: f64,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: f64,
    #[serde(default = "default_year")]
    pub year: i32,
    #[serde(default)]
    pub render_mode: RenderMode,
    #[serde(default)]
    pub render_profile: RenderProfile,
    #[serde(default)]
    pub cluster: ClusterIndexConfig,
    #[serde(default)]
    pub density: DensityConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    /// Quiet period before a viewport change counts as settled.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Duration of the cluster-expansion camera flight.
    #[serde(default = "default_flight_duration_ms")]
    pub flight_duration_ms: u64,
    #[serde(default = "default_anchor_years")]
    pub timeline_anchors: Vec<i32>,
}

impl MapEngineConfig {
    /// Creates a config with the default world view for a surface size.
    #[must_use]
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            center: default_center(),
            zoom: default_zoom(),
            min_zoom: default_min_zoom(),
            max_zoom: default_max_zoom(),
            year: default_year(),
            render_mode: RenderMode::default(),
            render_profile: RenderProfile::default(),
            cluster: ClusterIndexConfig::default(),
            density: DensityConfig::default(),
            playback: PlaybackConfig::default(),
            settle_delay_ms: default_settle_delay_ms(),
            flight_duration_ms: default_flight_duration_ms(),
            timeline_anchors: default_anchor_years(),
        }
    }

    #[must_use]
    pub fn with_camera(mut self, center: LonLat, zoom: f64) -> Self {
        self.center = center;
        self.zoom = zoom;
        self
    }

    #[must_use]
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = year;
        self
    }

    #[must_use]
    pub fn with_render_mode(mut self, mode: RenderMode) -> Self {
        self.render_mode = mode;
        self
    }

    #[must_use]
    pub fn with_render_profile(mut self, profile: RenderProfile) -> Self {
        self.render_profile = profile;
        self
    }

    #[must_use]
    pub fn with_settle_delay_ms(mut self, delay_ms: u64) -> Self {
        self.settle_delay_ms = delay_ms;
        self
    }

    pub fn validate(&self) -> MapResult<()> {
        self.viewport.validate()?;
        if !self.center.is_valid() {
            return Err(MapError::InvalidConfig(
                "initial map center must be a valid coordinate".to_owned(),
            ));
        }
        if !self.min_zoom.is_finite()
            || !self.max_zoom.is_finite()
            || self.min_zoom < 0.0
            || self.min_zoom > self.max_zoom
            || self.max_zoom > f64::from(u8::MAX)
        {
            return Err(MapError::InvalidConfig(format!(
                "zoom bounds must satisfy 0 <= min ({}) <= max ({})",
                self.min_zoom, self.max_zoom
            )));
        }
        if !self.zoom.is_finite() || !(self.min_zoom..=self.max_zoom).contains(&self.zoom) {
            return Err(MapError::InvalidConfig(format!(
                "initial zoom {} is outside [{}, {}]",
                self.zoom, self.min_zoom, self.max_zoom
            )));
        }
        if !(MIN_YEAR..=MAX_YEAR).contains(&self.year) {
            return Err(MapError::InvalidConfig(format!(
                "initial year {} is outside [{MIN_YEAR}, {MAX_YEAR}]",
                self.year
            )));
        }
        self.cluster.validate()?;
        self.density.validate()?;
        self.playback.validate()?;
        TimelineMapper::new(self.timeline_anchors.clone())?;
        Ok(())
    }

    pub fn to_json_pretty(&self) -> MapResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| MapError::InvalidData(format!("failed to serialize engine config: {e}")))
    }

    pub fn from_json_str(input: &str) -> MapResult<Self> {
        serde_json::from_str(input)
            .map_err(|e| MapError::InvalidConfig(format!("failed to parse engine config json: {e}")))
    }
}

fn default_center() -> LonLat {
    LonLat::new(0.0, 30.0)
}

fn default_zoom() -> f64 {
    3.0
}

fn default_min_zoom() -> f64 {
    2.0
}

fn default_max_zoom() -> f64 {
    18.0
}

fn default_year() -> i32 {
    DEFAULT_YEAR
}

fn default_settle_delay_ms() -> u64 {
    30
}

fn default_flight_duration_ms() -> u64 {
    500
}

fn default_anchor_years() -> Vec<i32> {
    DEFAULT_ANCHOR_YEARS.to_vec()
}
