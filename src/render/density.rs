use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::core::projection::MapViewport;
use crate::core::timer::TimestampMs;
use crate::core::types::GeoPoint;
use crate::error::{MapError, MapResult};
use crate::render::palette::heat_color;

/// Named density appearance bundle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderProfile {
    /// General concentration view.
    #[default]
    Density,
    /// Wide kernel for macro hotspots.
    Clusters,
    /// Narrow kernel that keeps individual locations readable.
    Precision,
}

/// Kernel constants carried by a [`RenderProfile`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileParams {
    pub kernel_radius_px: f64,
    pub blur_px: f64,
    pub max_effective_zoom: f64,
    pub min_opacity: f64,
}

impl ProfileParams {
    /// Full kernel reach: core radius plus the blur band.
    #[must_use]
    pub fn reach_px(self) -> f64 {
        self.kernel_radius_px + self.blur_px
    }
}

impl RenderProfile {
    pub const ALL: [Self; 3] = [Self::Density, Self::Clusters, Self::Precision];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Density => "density",
            Self::Clusters => "clusters",
            Self::Precision => "precision",
        }
    }

    #[must_use]
    pub const fn params(self) -> ProfileParams {
        match self {
            Self::Density => ProfileParams {
                kernel_radius_px: 20.0,
                blur_px: 20.0,
                max_effective_zoom: 10.0,
                min_opacity: 0.25,
            },
            Self::Clusters => ProfileParams {
                kernel_radius_px: 35.0,
                blur_px: 30.0,
                max_effective_zoom: 8.0,
                min_opacity: 0.2,
            },
            Self::Precision => ProfileParams {
                kernel_radius_px: 10.0,
                blur_px: 8.0,
                max_effective_zoom: 14.0,
                min_opacity: 0.35,
            },
        }
    }
}

impl fmt::Display for RenderProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for RenderProfile {
    type Err = MapError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|profile| profile.key() == key)
            .ok_or_else(|| MapError::UnknownRenderProfile(key.to_owned()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DensityConfig {
    /// Weight every point contributes to its cell.
    #[serde(default = "default_point_weight")]
    pub point_weight: f64,
    /// Cap on accumulated cell weight.
    #[serde(default = "default_max_intensity")]
    pub max_intensity: f64,
    /// Duration of the density fade in/out transitions.
    #[serde(default = "default_fade_ms")]
    pub fade_ms: u64,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            point_weight: default_point_weight(),
            max_intensity: default_max_intensity(),
            fade_ms: default_fade_ms(),
        }
    }
}

impl DensityConfig {
    pub fn validate(self) -> MapResult<Self> {
        if !self.point_weight.is_finite() || self.point_weight <= 0.0 {
            return Err(MapError::InvalidConfig(
                "density point weight must be finite and > 0".to_owned(),
            ));
        }
        if !self.max_intensity.is_finite() || self.max_intensity <= 0.0 {
            return Err(MapError::InvalidConfig(
                "density max intensity must be finite and > 0".to_owned(),
            ));
        }
        Ok(self)
    }
}

fn default_point_weight() -> f64 {
    0.6
}

fn default_max_intensity() -> f64 {
    1.0
}

fn default_fade_ms() -> u64 {
    300
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FadeDirection {
    In,
    Out,
}

/// Linear opacity ramp anchored on the host clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerFade {
    pub direction: FadeDirection,
    pub started_at_ms: TimestampMs,
    pub duration_ms: u64,
}

impl LayerFade {
    #[must_use]
    pub const fn new(direction: FadeDirection, started_at_ms: TimestampMs, duration_ms: u64) -> Self {
        Self {
            direction,
            started_at_ms,
            duration_ms,
        }
    }

    /// Opacity multiplier at `now_ms`.
    #[must_use]
    pub fn opacity_at(self, now_ms: TimestampMs) -> f64 {
        let t = if self.duration_ms == 0 {
            1.0
        } else {
            let elapsed = now_ms.saturating_sub(self.started_at_ms);
            (elapsed as f64 / self.duration_ms as f64).min(1.0)
        };
        match self.direction {
            FadeDirection::In => t,
            FadeDirection::Out => 1.0 - t,
        }
    }

    #[must_use]
    pub fn is_finished(self, now_ms: TimestampMs) -> bool {
        now_ms.saturating_sub(self.started_at_ms) >= self.duration_ms
    }
}

/// Colorized density raster covering the viewport surface.
///
/// The pixel buffer is shared so layer snapshots in render frames stay cheap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DensityLayer {
    pub profile: RenderProfile,
    pub width: u32,
    pub height: u32,
    /// Premultiplied-free RGBA8 rows, top to bottom.
    #[serde(skip)]
    pub rgba: Arc<[u8]>,
    pub point_count: usize,
    pub cell_count: usize,
    pub opacity: f64,
    pub fade: Option<LayerFade>,
}

impl DensityLayer {
    /// Alpha (0..=255) of the pixel at `(x, y)`, `None` outside the raster.
    #[must_use]
    pub fn alpha_at(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4 + 3;
        self.rgba.get(offset).copied()
    }

    #[must_use]
    pub fn max_alpha(&self) -> u8 {
        self.rgba.iter().skip(3).step_by(4).copied().max().unwrap_or(0)
    }

    /// Starts a fade, resetting opacity to the ramp's starting value.
    pub fn begin_fade(&mut self, fade: LayerFade) {
        self.opacity = fade.opacity_at(fade.started_at_ms);
        self.fade = Some(fade);
    }

    /// Advances the fade ramp; returns `true` once it has completed.
    pub fn update_fade(&mut self, now_ms: TimestampMs) -> bool {
        let Some(fade) = self.fade else {
            return true;
        };
        self.opacity = fade.opacity_at(now_ms);
        if fade.is_finished(now_ms) {
            self.fade = None;
            return true;
        }
        false
    }

    pub fn validate(&self) -> MapResult<()> {
        let expected = self.width as usize * self.height as usize * 4;
        if self.rgba.len() != expected {
            return Err(MapError::InvalidData(format!(
                "density raster holds {} bytes, expected {expected}",
                self.rgba.len()
            )));
        }
        if !self.opacity.is_finite() || !(0.0..=1.0).contains(&self.opacity) {
            return Err(MapError::InvalidData(
                "density layer opacity must be in [0, 1]".to_owned(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    x: f64,
    y: f64,
    weight: f64,
}

#[derive(Debug, Clone, Default)]
pub struct DensityFieldRenderer {
    config: DensityConfig,
}

impl DensityFieldRenderer {
    #[must_use]
    pub fn new(config: DensityConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> DensityConfig {
        self.config
    }

    /// Renders the density surface for `points` under `viewport`.
    ///
    /// Returns `None` when no valid point lands near the surface, so no
    /// transparent layer is ever composited.
    /// The new layer starts a fade-in at `now_ms`.
    #[must_use]
    pub fn render(
        &self,
        points: &[GeoPoint],
        profile: RenderProfile,
        viewport: &MapViewport,
        now_ms: TimestampMs,
    ) -> Option<DensityLayer> {
        if points.is_empty() {
            trace!("density render skipped for empty point set");
            return None;
        }

        let params = profile.params();
        let width = viewport.size.width;
        let height = viewport.size.height;
        let cells = self.bin_points(points, params, viewport);
        if cells.is_empty() {
            trace!("density render skipped; no valid point near the viewport");
            return None;
        }

        let mut alpha = vec![0f32; width as usize * height as usize];
        let kernel = Kernel::new(params);
        for cell in cells.values() {
            let weight = cell.weight.min(self.config.max_intensity) / self.config.max_intensity;
            let point_alpha = weight.clamp(params.min_opacity, 1.0) as f32;
            kernel.stamp(&mut alpha, width, height, cell.x.round(), cell.y.round(), point_alpha);
        }

        let rgba = colorize(&alpha, width);
        debug!(
            profile = %profile,
            point_count = points.len(),
            cell_count = cells.len(),
            zoom = viewport.zoom,
            "density layer rendered"
        );

        let mut layer = DensityLayer {
            profile,
            width,
            height,
            rgba: rgba.into(),
            point_count: points.len(),
            cell_count: cells.len(),
            opacity: 1.0,
            fade: None,
        };
        layer.begin_fade(LayerFade::new(FadeDirection::In, now_ms, self.config.fade_ms));
        Some(layer)
    }

    fn bin_points(
        &self,
        points: &[GeoPoint],
        params: ProfileParams,
        viewport: &MapViewport,
    ) -> IndexMap<(i64, i64), Cell> {
        let reach = params.reach_px();
        let cell_size = reach / 2.0;
        let zoom_gap = (params.max_effective_zoom - viewport.zoom).clamp(0.0, 12.0);
        let point_weight = self.config.point_weight / 2f64.powf(zoom_gap);
        let max_x = f64::from(viewport.size.width) + reach;
        let max_y = f64::from(viewport.size.height) + reach;

        let mut cells: IndexMap<(i64, i64), Cell> = IndexMap::new();
        for point in points.iter().filter(|point| point.has_valid_geometry()) {
            let (x, y) = viewport.project(point.position());
            if x < -reach || y < -reach || x > max_x || y > max_y {
                continue;
            }
            let key = (
                (x / cell_size).floor() as i64,
                (y / cell_size).floor() as i64,
            );
            cells
                .entry(key)
                .and_modify(|cell| {
                    let total = cell.weight + point_weight;
                    cell.x = (cell.x * cell.weight + x * point_weight) / total;
                    cell.y = (cell.y * cell.weight + y * point_weight) / total;
                    cell.weight = total;
                })
                .or_insert(Cell {
                    x,
                    y,
                    weight: point_weight,
                });
        }
        cells
    }
}

/// Precomputed radial falloff: opaque core out to the kernel radius, then a
/// Gaussian band across the blur width.
struct Kernel {
    half: i64,
    side: usize,
    weights: Vec<f32>,
}

impl Kernel {
    fn new(params: ProfileParams) -> Self {
        let reach = params.reach_px();
        let half = reach.ceil() as i64;
        let side = (half * 2 + 1) as usize;
        let sigma = (params.blur_px / 3.0).max(f64::EPSILON);
        let mut weights = Vec::with_capacity(side * side);
        for dy in -half..=half {
            for dx in -half..=half {
                let distance = ((dx * dx + dy * dy) as f64).sqrt();
                let value = if distance <= params.kernel_radius_px {
                    1.0
                } else if distance <= reach {
                    let band = distance - params.kernel_radius_px;
                    (-(band * band) / (2.0 * sigma * sigma)).exp()
                } else {
                    0.0
                };
                weights.push(value as f32);
            }
        }
        Self {
            half,
            side,
            weights,
        }
    }

    /// Composites the kernel source-over into the alpha raster.
    fn stamp(&self, alpha: &mut [f32], width: u32, height: u32, cx: f64, cy: f64, strength: f32) {
        let cx = cx as i64;
        let cy = cy as i64;
        let width = i64::from(width);
        let height = i64::from(height);
        let y_start = (cy - self.half).max(0);
        let y_end = (cy + self.half).min(height - 1);
        let x_start = (cx - self.half).max(0);
        let x_end = (cx + self.half).min(width - 1);
        for y in y_start..=y_end {
            let kernel_row = ((y - cy + self.half) as usize) * self.side;
            let raster_row = (y * width) as usize;
            for x in x_start..=x_end {
                let source = self.weights[kernel_row + (x - cx + self.half) as usize] * strength;
                if source <= 0.0 {
                    continue;
                }
                let destination = &mut alpha[raster_row + x as usize];
                *destination = source + *destination * (1.0 - source);
            }
        }
    }
}

fn colorize_row(alpha_row: &[f32], rgba_row: &mut [u8]) {
    for (alpha, pixel) in alpha_row.iter().zip(rgba_row.chunks_exact_mut(4)) {
        if *alpha <= 0.0 {
            continue;
        }
        let color = heat_color(*alpha);
        pixel[0] = channel_byte(color.red);
        pixel[1] = channel_byte(color.green);
        pixel[2] = channel_byte(color.blue);
        pixel[3] = channel_byte(f64::from(*alpha));
    }
}

fn channel_byte(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(not(feature = "parallel-density"))]
fn colorize(alpha: &[f32], width: u32) -> Vec<u8> {
    let mut rgba = vec![0u8; alpha.len() * 4];
    let width = width as usize;
    if width == 0 {
        return rgba;
    }
    for (alpha_row, rgba_row) in alpha.chunks(width).zip(rgba.chunks_mut(width * 4)) {
        colorize_row(alpha_row, rgba_row);
    }
    rgba
}

#[cfg(feature = "parallel-density")]
fn colorize(alpha: &[f32], width: u32) -> Vec<u8> {
    use rayon::prelude::*;

    let mut rgba = vec![0u8; alpha.len() * 4];
    let width = width as usize;
    if width == 0 {
        return rgba;
    }
    rgba.par_chunks_mut(width * 4)
        .zip(alpha.par_chunks(width))
        .for_each(|(rgba_row, alpha_row)| colorize_row(alpha_row, rgba_row));
    rgba
}
