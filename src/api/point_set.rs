use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::core::cluster_index::{ClusterIndex, ClusterIndexConfig};
use crate::core::types::GeoPoint;
use crate::error::MapResult;

/// The loaded year's points together with their derived cluster index.
///
/// Replaced wholesale on every year or filter change; both the points and
/// the index are shared read-only.
#[derive(Debug, Clone)]
pub struct ActivePointSet {
    year: i32,
    category: Option<String>,
    points: Arc<[GeoPoint]>,
    index: Arc<ClusterIndex>,
    positions: IndexMap<i64, usize>,
}

impl ActivePointSet {
    pub fn build(
        year: i32,
        category: Option<String>,
        points: Vec<GeoPoint>,
        config: ClusterIndexConfig,
    ) -> MapResult<Self> {
        let index = ClusterIndex::build(&points, config)?;
        let positions = points
            .iter()
            .enumerate()
            .map(|(position, point)| (point.id, position))
            .collect();
        debug!(
            year,
            point_count = points.len(),
            indexed_count = index.point_count(),
            dropped = index.dropped_points(),
            "active point set built"
        );
        Ok(Self {
            year,
            category,
            points: points.into(),
            index: Arc::new(index),
            positions,
        })
    }

    /// Empty set for `year`; its index has no levels.
    pub fn empty(year: i32, config: ClusterIndexConfig) -> MapResult<Self> {
        Self::build(year, None, Vec::new(), config)
    }

    #[must_use]
    pub fn year(&self) -> i32 {
        self.year
    }

    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    #[must_use]
    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    #[must_use]
    pub fn shared_points(&self) -> Arc<[GeoPoint]> {
        Arc::clone(&self.points)
    }

    #[must_use]
    pub fn index(&self) -> &ClusterIndex {
        &self.index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: i64) -> Option<&GeoPoint> {
        self.positions
            .get(&id)
            .and_then(|&position| self.points.get(position))
    }

    #[must_use]
    pub fn location_label(&self, id: i64) -> Option<&str> {
        self.get(id).and_then(|point| point.location_label.as_deref())
    }
}
