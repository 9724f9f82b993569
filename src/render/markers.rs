use serde::{Deserialize, Serialize};

use crate::core::cluster_index::{ClusterFeature, ClusterId};
use crate::core::projection::MapViewport;
use crate::core::types::LonLat;
use crate::error::MapResult;
use crate::render::palette::category_color;
use crate::render::{CirclePrimitive, Color, TextPrimitive};

pub const LEAF_RADIUS_PX: f64 = 6.0;
pub const LEAF_FILL_OPACITY: f64 = 0.9;
pub const LEAF_STROKE_WIDTH_PX: f64 = 1.5;
pub const LEAF_STROKE_OPACITY: f64 = 0.4;

/// Member count from which clusters get the emphasized styling.
pub const LARGE_CLUSTER_THRESHOLD: u32 = 200;

const CLUSTER_ACCENT: Color = Color::from_rgb_hex(0x00_FF_9C);
const LARGE_CLUSTER_ACCENT: Color = Color::from_rgb_hex(0x00_E5_FF);
const CLUSTER_LABEL_FONT_PX: f64 = 12.0;

pub const CLUSTER_HINT: &str = "Click to zoom in";
pub const LEAF_HINT: &str = "Click to view details";

/// Badge size bucket by member count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BadgeTier {
    Small,
    Medium,
    Large,
    Huge,
}

impl BadgeTier {
    #[must_use]
    pub fn for_count(count: u32) -> Self {
        match count {
            0..50 => Self::Small,
            50..200 => Self::Medium,
            200..500 => Self::Large,
            _ => Self::Huge,
        }
    }

    /// Badge edge length in pixels.
    #[must_use]
    pub const fn size_px(self) -> f64 {
        match self {
            Self::Small => 36.0,
            Self::Medium => 44.0,
            Self::Large => 52.0,
            Self::Huge => 60.0,
        }
    }
}

/// Badge text: exact below a thousand, otherwise rounded thousands (`"2k"`).
#[must_use]
pub fn abbreviate_count(count: u32) -> String {
    if count >= 1000 {
        format!("{}k", (f64::from(count) / 1000.0).round() as u64)
    } else {
        count.to_string()
    }
}

/// Formats a count with comma thousands separators.
#[must_use]
pub fn format_thousands(count: u64) -> String {
    let digits = count.to_string();
    let mut formatted = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            formatted.push(',');
        }
        formatted.push(digit);
    }
    formatted
}

/// Drops comma-separated parts already mentioned by an earlier part
/// (case-insensitive substring match) and rejoins the rest.
#[must_use]
pub fn clean_location_label(label: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for part in label.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let lower = part.to_lowercase();
        if !kept
            .iter()
            .any(|earlier| earlier.to_lowercase().contains(&lower))
        {
            kept.push(part);
        }
    }
    kept.join(", ")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterMarker {
    pub id: ClusterId,
    pub position: LonLat,
    pub point_count: u32,
    pub member_ids: Vec<i64>,
    pub expansion_zoom: u8,
    pub tier: BadgeTier,
    pub large: bool,
    pub badge: CirclePrimitive,
    pub label: TextPrimitive,
    pub tooltip: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafMarker {
    pub record_id: i64,
    pub position: LonLat,
    pub category: Option<String>,
    pub circle: CirclePrimitive,
    pub tooltip_title: String,
    pub tooltip_location: String,
}

/// One discrete marker; the set of kinds is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarkerPrimitive {
    Cluster(ClusterMarker),
    Leaf(LeafMarker),
}

impl MarkerPrimitive {
    #[must_use]
    pub fn position(&self) -> LonLat {
        match self {
            Self::Cluster(cluster) => cluster.position,
            Self::Leaf(leaf) => leaf.position,
        }
    }

    #[must_use]
    pub fn hit(&self, x: f64, y: f64) -> bool {
        match self {
            Self::Cluster(cluster) => cluster.badge.contains(x, y),
            Self::Leaf(leaf) => leaf.circle.contains(x, y),
        }
    }

    pub fn validate(&self) -> MapResult<()> {
        match self {
            Self::Cluster(cluster) => {
                cluster.badge.validate()?;
                cluster.label.validate()
            }
            Self::Leaf(leaf) => leaf.circle.validate(),
        }
    }
}

/// Materialized discrete layer for one settled viewport, built in one pass.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarkerLayer {
    pub zoom: u8,
    pub markers: Vec<MarkerPrimitive>,
}

impl MarkerLayer {
    /// Builds markers for `features`, projected through `viewport`.
    ///
    /// `location_of` resolves a leaf's record id to its raw location label.
    pub fn build<'a, F>(features: Vec<ClusterFeature>, viewport: &MapViewport, location_of: F) -> Self
    where
        F: Fn(i64) -> Option<&'a str>,
    {
        let markers = features
            .into_iter()
            .map(|feature| match feature {
                ClusterFeature::Cluster {
                    id,
                    lat,
                    lon,
                    point_count,
                    member_ids,
                    expansion_zoom,
                } => MarkerPrimitive::Cluster(cluster_marker(
                    viewport,
                    id,
                    LonLat::new(lon, lat),
                    point_count,
                    member_ids,
                    expansion_zoom,
                )),
                ClusterFeature::Leaf {
                    lat,
                    lon,
                    source_id,
                    category,
                } => {
                    let location = location_of(source_id)
                        .map(clean_location_label)
                        .unwrap_or_default();
                    MarkerPrimitive::Leaf(leaf_marker(
                        viewport,
                        source_id,
                        LonLat::new(lon, lat),
                        category,
                        location,
                    ))
                }
            })
            .collect();

        Self {
            zoom: viewport.query().zoom,
            markers,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    #[must_use]
    pub fn cluster_count(&self) -> usize {
        self.markers
            .iter()
            .filter(|marker| matches!(marker, MarkerPrimitive::Cluster(_)))
            .count()
    }

    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.len() - self.cluster_count()
    }

    /// Topmost marker under the pixel; later markers are drawn above earlier ones.
    #[must_use]
    pub fn hit_test(&self, x: f64, y: f64) -> Option<&MarkerPrimitive> {
        self.markers.iter().rev().find(|marker| marker.hit(x, y))
    }

    pub fn validate(&self) -> MapResult<()> {
        self.markers.iter().try_for_each(MarkerPrimitive::validate)
    }
}

fn cluster_marker(
    viewport: &MapViewport,
    id: ClusterId,
    position: LonLat,
    point_count: u32,
    member_ids: Vec<i64>,
    expansion_zoom: u8,
) -> ClusterMarker {
    let (x, y) = viewport.project(position);
    let tier = BadgeTier::for_count(point_count);
    let large = point_count >= LARGE_CLUSTER_THRESHOLD;
    let accent = if large {
        LARGE_CLUSTER_ACCENT
    } else {
        CLUSTER_ACCENT
    };
    let badge = CirclePrimitive::new(
        x,
        y,
        tier.size_px() / 2.0,
        accent.with_alpha(if large { 0.3 } else { 0.2 }),
        accent,
        2.0,
    );
    let label = TextPrimitive::new(
        abbreviate_count(point_count),
        x,
        y,
        CLUSTER_LABEL_FONT_PX,
        Color::WHITE,
    );

    ClusterMarker {
        id,
        position,
        point_count,
        member_ids,
        expansion_zoom,
        tier,
        large,
        badge,
        label,
        tooltip: format!("{} events", format_thousands(u64::from(point_count))),
    }
}

fn leaf_marker(
    viewport: &MapViewport,
    record_id: i64,
    position: LonLat,
    category: Option<String>,
    location: String,
) -> LeafMarker {
    let (x, y) = viewport.project(position);
    let circle = CirclePrimitive::new(
        x,
        y,
        LEAF_RADIUS_PX,
        category_color(category.as_deref()).with_alpha(LEAF_FILL_OPACITY),
        Color::WHITE.with_alpha(LEAF_STROKE_OPACITY),
        LEAF_STROKE_WIDTH_PX,
    );
    let tooltip_title = category.clone().unwrap_or_else(|| "Unknown".to_owned());

    LeafMarker {
        record_id,
        position,
        category,
        circle,
        tooltip_title,
        tooltip_location: location,
    }
}
