pub mod cluster_index;
pub mod projection;
pub mod timeline;
pub mod timer;
pub mod types;

pub use cluster_index::{ClusterFeature, ClusterId, ClusterIndex, ClusterIndexConfig};
pub use projection::MapViewport;
pub use timeline::{DEFAULT_YEAR, MAX_YEAR, MIN_YEAR, TimelineMapper, clamp_year};
pub use timer::{TimerSlot, TimestampMs};
pub use types::{BoundingBox, GeoPoint, LonLat, Viewport, ViewportQuery};
