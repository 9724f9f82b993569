use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::core::projection::{lat_to_unit_y, lon_to_unit_x, unit_x_to_lon, unit_y_to_lat};
use crate::core::types::{BoundingBox, GeoPoint, ViewportQuery, normalize_lon};
use crate::error::{MapError, MapResult};

/// Highest cluster level accepted by [`ClusterIndexConfig::validate`].
pub const MAX_SUPPORTED_CLUSTER_ZOOM: u8 = 24;

const NO_PARENT: u32 = u32::MAX;

type NodeEntry = GeomWithData<[f64; 2], u32>;

/// Tuning for hierarchical point clustering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterIndexConfig {
    /// Merge radius in screen pixels, constant across zoom levels.
    pub radius_px: f64,
    /// Tile extent the radius is expressed in.
    pub extent: f64,
    pub min_zoom: u8,
    /// Deepest level that still aggregates; one level deeper holds raw points.
    pub max_zoom: u8,
    /// Smallest member count reported as a cluster.
    pub min_points: u32,
}

impl Default for ClusterIndexConfig {
    fn default() -> Self {
        Self {
            radius_px: 60.0,
            extent: 512.0,
            min_zoom: 0,
            max_zoom: 14,
            min_points: 3,
        }
    }
}

impl ClusterIndexConfig {
    pub fn validate(self) -> MapResult<Self> {
        if !self.radius_px.is_finite() || self.radius_px <= 0.0 {
            return Err(MapError::InvalidConfig(
                "cluster radius must be finite and > 0".to_owned(),
            ));
        }
        if !self.extent.is_finite() || self.extent <= 0.0 {
            return Err(MapError::InvalidConfig(
                "cluster extent must be finite and > 0".to_owned(),
            ));
        }
        if self.min_zoom > self.max_zoom || self.max_zoom > MAX_SUPPORTED_CLUSTER_ZOOM {
            return Err(MapError::InvalidConfig(format!(
                "cluster zoom range must satisfy min <= max <= {MAX_SUPPORTED_CLUSTER_ZOOM}"
            )));
        }
        if self.min_points < 2 {
            return Err(MapError::InvalidConfig(
                "cluster min_points must be >= 2".to_owned(),
            ));
        }
        Ok(self)
    }

    fn tolerance_at(self, zoom: u8) -> f64 {
        self.radius_px / (self.extent * 2f64.powi(i32::from(zoom)))
    }
}

/// Identity of a cluster: the level it was formed at and its slot there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClusterId {
    pub level: u8,
    pub index: u32,
}

/// One query result: an aggregated cluster or an individual point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClusterFeature {
    Cluster {
        id: ClusterId,
        lat: f64,
        lon: f64,
        point_count: u32,
        member_ids: Vec<i64>,
        expansion_zoom: u8,
    },
    Leaf {
        lat: f64,
        lon: f64,
        source_id: i64,
        category: Option<String>,
    },
}

impl ClusterFeature {
    #[must_use]
    pub fn lat(&self) -> f64 {
        match self {
            Self::Cluster { lat, .. } | Self::Leaf { lat, .. } => *lat,
        }
    }

    #[must_use]
    pub fn lon(&self) -> f64 {
        match self {
            Self::Cluster { lon, .. } | Self::Leaf { lon, .. } => *lon,
        }
    }

    #[must_use]
    pub fn point_count(&self) -> u32 {
        match self {
            Self::Cluster { point_count, .. } => *point_count,
            Self::Leaf { .. } => 1,
        }
    }

    #[must_use]
    pub fn is_cluster(&self) -> bool {
        matches!(self, Self::Cluster { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum NodeIdentity {
    Point(u32),
    Cluster(ClusterId),
}

#[derive(Debug, Clone, Copy)]
struct Node {
    x: f64,
    y: f64,
    num_points: u32,
    identity: NodeIdentity,
    parent: u32,
}

impl Node {
    fn carried(self) -> Self {
        Self {
            parent: NO_PARENT,
            ..self
        }
    }
}

#[derive(Debug)]
struct Level {
    zoom: u8,
    nodes: Vec<Node>,
    tree: RTree<NodeEntry>,
    /// CSR child lists into the next deeper level.
    child_offsets: Vec<u32>,
    child_indices: Vec<u32>,
    /// Start of each node's members in `ClusterIndex::leaf_order`.
    leaf_offsets: Vec<u32>,
}

impl Level {
    fn new(zoom: u8, nodes: Vec<Node>, tree: RTree<NodeEntry>) -> Self {
        Self {
            zoom,
            nodes,
            tree,
            child_offsets: Vec::new(),
            child_indices: Vec::new(),
            leaf_offsets: Vec::new(),
        }
    }

    fn children(&self, index: u32) -> &[u32] {
        let index = index as usize;
        match (
            self.child_offsets.get(index),
            self.child_offsets.get(index + 1),
        ) {
            (Some(&start), Some(&end)) => &self.child_indices[start as usize..end as usize],
            _ => &[],
        }
    }
}

/// Immutable zoom-hierarchical cluster index over one point set.
///
/// Levels are stored as flat arenas from `min_zoom` to `max_zoom + 1`; the
/// last level holds every valid input point. Rebuilding from the same points
/// and config always yields the same index.
#[derive(Debug)]
pub struct ClusterIndex {
    config: ClusterIndexConfig,
    points: Vec<GeoPoint>,
    levels: Vec<Level>,
    leaf_order: Vec<i64>,
    dropped_points: usize,
}

impl ClusterIndex {
    /// Builds the hierarchy. Points with invalid geometry are dropped.
    pub fn build(points: &[GeoPoint], config: ClusterIndexConfig) -> MapResult<Self> {
        let config = config.validate()?;
        let valid: Vec<GeoPoint> = points
            .iter()
            .filter(|point| point.has_valid_geometry())
            .cloned()
            .collect();
        let dropped_points = points.len() - valid.len();
        if dropped_points > 0 {
            warn!(
                dropped = dropped_points,
                total = points.len(),
                "dropping points with invalid geometry from cluster index"
            );
        }

        if valid.is_empty() {
            return Ok(Self {
                config,
                points: valid,
                levels: Vec::new(),
                leaf_order: Vec::new(),
                dropped_points,
            });
        }

        let mut nodes: Vec<Node> = valid
            .iter()
            .enumerate()
            .map(|(index, point)| Node {
                x: lon_to_unit_x(point.lon),
                y: lat_to_unit_y(point.lat),
                num_points: 1,
                identity: NodeIdentity::Point(index as u32),
                parent: NO_PARENT,
            })
            .collect();
        let mut tree = build_tree(&nodes);
        let mut levels_bottom_up =
            Vec::with_capacity(usize::from(config.max_zoom - config.min_zoom) + 2);

        for zoom in (config.min_zoom..=config.max_zoom).rev() {
            let next = cluster_level(&mut nodes, &tree, zoom, config);
            trace!(zoom, nodes = next.len(), "built cluster level");
            let next_tree = build_tree(&next);
            levels_bottom_up.push(Level::new(
                zoom + 1,
                std::mem::replace(&mut nodes, next),
                std::mem::replace(&mut tree, next_tree),
            ));
        }
        levels_bottom_up.push(Level::new(config.min_zoom, nodes, tree));
        levels_bottom_up.reverse();
        let mut levels = levels_bottom_up;

        link_children(&mut levels);
        let leaf_order = assign_leaf_ranges(&mut levels, &valid);

        debug!(
            points = valid.len(),
            dropped = dropped_points,
            levels = levels.len(),
            top_level_nodes = levels.first().map_or(0, |level| level.nodes.len()),
            "built cluster index"
        );

        Ok(Self {
            config,
            points: valid,
            levels,
            leaf_order,
            dropped_points,
        })
    }

    #[must_use]
    pub fn config(&self) -> ClusterIndexConfig {
        self.config
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Number of indexed (valid) points.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn dropped_points(&self) -> usize {
        self.dropped_points
    }

    #[must_use]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Features whose aggregation point lies inside the query box at the
    /// query zoom, floored into the built level range.
    #[must_use]
    pub fn query(&self, query: &ViewportQuery) -> Vec<ClusterFeature> {
        if self.levels.is_empty() {
            return Vec::new();
        }
        let bbox = match query.bbox.validate() {
            Ok(bbox) => bbox,
            Err(err) => {
                warn!(error = %err, "ignoring cluster query with invalid bounding box");
                return Vec::new();
            }
        };

        let south = bbox.south.clamp(-90.0, 90.0);
        let north = bbox.north.clamp(-90.0, 90.0);
        let (west, east) = if bbox.east - bbox.west >= 360.0 {
            (-180.0, 180.0)
        } else {
            (wrap_west(bbox.west), normalize_lon(bbox.east))
        };

        let level = self.level_for_zoom(query.zoom);
        let mut hits = if west > east {
            let mut eastern = self.nodes_in(level, BoundingBox::new(west, south, 180.0, north));
            eastern.extend(self.nodes_in(level, BoundingBox::new(-180.0, south, east, north)));
            eastern
        } else {
            self.nodes_in(level, BoundingBox::new(west, south, east, north))
        };
        hits.sort_unstable();
        hits.dedup();
        trace!(
            zoom = query.zoom,
            level = self.levels[level].zoom,
            hits = hits.len(),
            "cluster query"
        );

        hits.into_iter()
            .map(|index| self.feature_for(level, index))
            .collect()
    }

    /// Smallest zoom at which the cluster's children stop collapsing into it.
    pub fn expansion_zoom(&self, cluster_id: ClusterId) -> MapResult<u8> {
        let mut current = cluster_id;
        self.cluster_position(current)?;
        let mut zoom = current.level;
        while zoom <= self.config.max_zoom {
            let children = self.child_nodes(current)?;
            zoom += 1;
            if children.len() != 1 {
                break;
            }
            match children[0].identity {
                NodeIdentity::Cluster(child) => current = child,
                NodeIdentity::Point(_) => break,
            }
        }
        Ok(zoom)
    }

    /// Direct children of a cluster, one level deeper than where it formed.
    pub fn children(&self, cluster_id: ClusterId) -> MapResult<Vec<ClusterFeature>> {
        let (level, _) = self.cluster_position(cluster_id)?;
        let parent = &self.levels[level];
        Ok(parent
            .children(cluster_id.index)
            .iter()
            .map(|&child| self.feature_for(level + 1, child))
            .collect())
    }

    /// Ids of every point aggregated by the cluster.
    pub fn member_ids(&self, cluster_id: ClusterId) -> MapResult<&[i64]> {
        let (level, index) = self.cluster_position(cluster_id)?;
        Ok(self.members_of(level, index))
    }

    fn level_for_zoom(&self, zoom: u8) -> usize {
        let deepest = self.config.max_zoom + 1;
        let clamped = zoom.clamp(self.config.min_zoom, deepest);
        usize::from(clamped - self.config.min_zoom)
    }

    fn nodes_in(&self, level: usize, bbox: BoundingBox) -> Vec<u32> {
        let envelope = AABB::from_corners(
            [lon_to_unit_x(bbox.west), lat_to_unit_y(bbox.north)],
            [lon_to_unit_x(bbox.east), lat_to_unit_y(bbox.south)],
        );
        self.levels[level]
            .tree
            .locate_in_envelope(&envelope)
            .map(|entry| entry.data)
            .collect()
    }

    fn cluster_position(&self, cluster_id: ClusterId) -> MapResult<(usize, u32)> {
        let unknown = MapError::UnknownCluster {
            level: cluster_id.level,
            index: cluster_id.index,
        };
        if cluster_id.level < self.config.min_zoom || cluster_id.level > self.config.max_zoom {
            return Err(unknown);
        }
        let level = usize::from(cluster_id.level - self.config.min_zoom);
        match self
            .levels
            .get(level)
            .and_then(|level| level.nodes.get(cluster_id.index as usize))
        {
            Some(node) if node.identity == NodeIdentity::Cluster(cluster_id) => {
                Ok((level, cluster_id.index))
            }
            _ => Err(unknown),
        }
    }

    fn child_nodes(&self, cluster_id: ClusterId) -> MapResult<SmallVec<[Node; 8]>> {
        let (level, index) = self.cluster_position(cluster_id)?;
        let deeper = &self.levels[level + 1];
        Ok(self.levels[level]
            .children(index)
            .iter()
            .map(|&child| deeper.nodes[child as usize])
            .collect())
    }

    fn members_of(&self, level: usize, index: u32) -> &[i64] {
        let level = &self.levels[level];
        let node = level.nodes[index as usize];
        let start = level.leaf_offsets[index as usize] as usize;
        &self.leaf_order[start..start + node.num_points as usize]
    }

    fn feature_for(&self, level: usize, index: u32) -> ClusterFeature {
        let node = self.levels[level].nodes[index as usize];
        match node.identity {
            NodeIdentity::Point(point_index) => {
                let point = &self.points[point_index as usize];
                ClusterFeature::Leaf {
                    lat: point.lat,
                    lon: point.lon,
                    source_id: point.id,
                    category: point.category.clone(),
                }
            }
            NodeIdentity::Cluster(id) => ClusterFeature::Cluster {
                id,
                lat: unit_y_to_lat(node.y),
                lon: unit_x_to_lon(node.x),
                point_count: node.num_points,
                member_ids: self.members_of(level, index).to_vec(),
                expansion_zoom: self
                    .expansion_zoom(id)
                    .unwrap_or(self.config.max_zoom + 1),
            },
        }
    }
}

fn wrap_west(lon: f64) -> f64 {
    ((lon + 180.0) % 360.0 + 360.0) % 360.0 - 180.0
}

fn build_tree(nodes: &[Node]) -> RTree<NodeEntry> {
    RTree::bulk_load(
        nodes
            .iter()
            .enumerate()
            .map(|(index, node)| GeomWithData::new([node.x, node.y], index as u32))
            .collect(),
    )
}

/// Aggregates `nodes` (one level deeper) into the nodes of level `zoom`.
///
/// Sets `parent` on every input node; each input node ends up with exactly one
/// parent, either a new cluster or a carried copy of itself.
fn cluster_level(
    nodes: &mut [Node],
    tree: &RTree<NodeEntry>,
    zoom: u8,
    config: ClusterIndexConfig,
) -> Vec<Node> {
    let tolerance = config.tolerance_at(zoom);
    let tolerance_sq = tolerance * tolerance;
    let mut assigned = vec![false; nodes.len()];
    let mut next = Vec::new();

    for i in 0..nodes.len() {
        if assigned[i] {
            continue;
        }
        assigned[i] = true;
        let seed = nodes[i];

        let mut neighbors: SmallVec<[u32; 16]> = tree
            .locate_within_distance([seed.x, seed.y], tolerance_sq)
            .map(|entry| entry.data)
            .filter(|&k| !assigned[k as usize])
            .collect();
        neighbors.sort_unstable();

        let num_points = neighbors
            .iter()
            .fold(seed.num_points, |acc, &k| acc + nodes[k as usize].num_points);

        let parent = next.len() as u32;
        if num_points > seed.num_points && num_points >= config.min_points {
            let mut wx = seed.x * f64::from(seed.num_points);
            let mut wy = seed.y * f64::from(seed.num_points);
            nodes[i].parent = parent;
            for &k in &neighbors {
                let neighbor = &mut nodes[k as usize];
                assigned[k as usize] = true;
                neighbor.parent = parent;
                wx += neighbor.x * f64::from(neighbor.num_points);
                wy += neighbor.y * f64::from(neighbor.num_points);
            }
            next.push(Node {
                x: wx / f64::from(num_points),
                y: wy / f64::from(num_points),
                num_points,
                identity: NodeIdentity::Cluster(ClusterId {
                    level: zoom,
                    index: parent,
                }),
                parent: NO_PARENT,
            });
        } else {
            nodes[i].parent = parent;
            next.push(seed.carried());
            if num_points > 1 {
                for &k in &neighbors {
                    assigned[k as usize] = true;
                    nodes[k as usize].parent = next.len() as u32;
                    next.push(nodes[k as usize].carried());
                }
            }
        }
    }

    next
}

fn link_children(levels: &mut [Level]) {
    for depth in 0..levels.len().saturating_sub(1) {
        let parent_count = levels[depth].nodes.len();
        let mut offsets = vec![0u32; parent_count + 1];
        for child in &levels[depth + 1].nodes {
            offsets[child.parent as usize + 1] += 1;
        }
        for slot in 1..offsets.len() {
            offsets[slot] += offsets[slot - 1];
        }
        let mut cursor = offsets.clone();
        let mut indices = vec![0u32; levels[depth + 1].nodes.len()];
        for (child_index, child) in levels[depth + 1].nodes.iter().enumerate() {
            let slot = &mut cursor[child.parent as usize];
            indices[*slot as usize] = child_index as u32;
            *slot += 1;
        }
        levels[depth].child_offsets = offsets;
        levels[depth].child_indices = indices;
    }
}

/// Lays members out so every node owns a contiguous `leaf_order` slice.
fn assign_leaf_ranges(levels: &mut [Level], points: &[GeoPoint]) -> Vec<i64> {
    let Some(top) = levels.first_mut() else {
        return Vec::new();
    };
    let mut running = 0u32;
    top.leaf_offsets = top
        .nodes
        .iter()
        .map(|node| {
            let start = running;
            running += node.num_points;
            start
        })
        .collect();

    for depth in 0..levels.len() - 1 {
        let (upper, lower) = levels.split_at_mut(depth + 1);
        let parent = &upper[depth];
        let child = &mut lower[0];
        child.leaf_offsets = vec![0; child.nodes.len()];
        for parent_index in 0..parent.nodes.len() {
            let mut offset = parent.leaf_offsets[parent_index];
            for &child_index in parent.children(parent_index as u32) {
                child.leaf_offsets[child_index as usize] = offset;
                offset += child.nodes[child_index as usize].num_points;
            }
        }
    }

    let mut leaf_order = vec![0i64; points.len()];
    if let Some(leaves) = levels.last() {
        for (index, node) in leaves.nodes.iter().enumerate() {
            if let NodeIdentity::Point(point_index) = node.identity {
                leaf_order[leaves.leaf_offsets[index] as usize] = points[point_index as usize].id;
            }
        }
    }
    leaf_order
}

#[cfg(test)]
mod tests {
    use super::{ClusterFeature, ClusterIndex, ClusterIndexConfig};
    use crate::core::types::{BoundingBox, GeoPoint, ViewportQuery};

    fn triad() -> Vec<GeoPoint> {
        vec![
            GeoPoint::new(1, 40.0, -75.0),
            GeoPoint::new(2, 40.001, -75.001),
            GeoPoint::new(3, 40.002, -75.002),
        ]
    }

    fn world(zoom: u8) -> ViewportQuery {
        ViewportQuery::new(BoundingBox::world(), zoom)
    }

    #[test]
    fn nearby_triad_clusters_at_low_zoom_and_splits_at_street_zoom() {
        let index = ClusterIndex::build(&triad(), ClusterIndexConfig::default()).expect("index");

        let low = index.query(&world(3));
        assert_eq!(low.len(), 1);
        match &low[0] {
            ClusterFeature::Cluster {
                point_count,
                member_ids,
                ..
            } => {
                assert_eq!(*point_count, 3);
                let mut ids = member_ids.clone();
                ids.sort_unstable();
                assert_eq!(ids, vec![1, 2, 3]);
            }
            other => panic!("expected cluster, got {other:?}"),
        }

        let street = index.query(&world(18));
        assert_eq!(street.len(), 3);
        assert!(street.iter().all(|feature| !feature.is_cluster()));
    }

    #[test]
    fn pair_below_min_points_stays_as_leaves() {
        let pair = vec![GeoPoint::new(1, 10.0, 10.0), GeoPoint::new(2, 10.0001, 10.0001)];
        let index = ClusterIndex::build(&pair, ClusterIndexConfig::default()).expect("index");
        for zoom in 0..=20 {
            let features = index.query(&world(zoom));
            assert_eq!(features.len(), 2, "zoom {zoom}");
            assert!(features.iter().all(|feature| !feature.is_cluster()));
        }
    }

    #[test]
    fn empty_and_invalid_inputs_produce_empty_index() {
        let index = ClusterIndex::build(&[], ClusterIndexConfig::default()).expect("index");
        assert!(index.is_empty());
        assert!(index.query(&world(5)).is_empty());

        let invalid = vec![GeoPoint::new(1, 95.0, 0.0), GeoPoint::new(2, 0.0, f64::NAN)];
        let index = ClusterIndex::build(&invalid, ClusterIndexConfig::default()).expect("index");
        assert!(index.is_empty());
        assert_eq!(index.dropped_points(), 2);
    }

    #[test]
    fn single_point_is_always_a_leaf() {
        let points = [GeoPoint::new(9, 1.0, 2.0)];
        let index = ClusterIndex::build(&points, ClusterIndexConfig::default()).expect("index");
        for zoom in [0, 7, 14, 15, 22] {
            let features = index.query(&world(zoom));
            assert_eq!(features.len(), 1);
            assert!(matches!(
                features[0],
                ClusterFeature::Leaf { source_id: 9, .. }
            ));
        }
    }

    #[test]
    fn expansion_zoom_splits_cluster() {
        let index = ClusterIndex::build(&triad(), ClusterIndexConfig::default()).expect("index");
        let low = index.query(&world(0));
        let ClusterFeature::Cluster {
            id, expansion_zoom, ..
        } = &low[0]
        else {
            panic!("expected cluster");
        };
        let expansion = index.expansion_zoom(*id).expect("expansion zoom");
        assert_eq!(expansion, *expansion_zoom);
        assert!(expansion > id.level);

        let children = index.children(*id).expect("children");
        assert!(children.len() > 1);
        let total: u32 = children.iter().map(ClusterFeature::point_count).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn invalid_config_fails_fast() {
        let config = ClusterIndexConfig {
            min_points: 1,
            ..ClusterIndexConfig::default()
        };
        assert!(ClusterIndex::build(&triad(), config).is_err());

        let config = ClusterIndexConfig {
            min_zoom: 5,
            max_zoom: 4,
            ..ClusterIndexConfig::default()
        };
        assert!(ClusterIndex::build(&triad(), config).is_err());
    }

    #[test]
    fn antimeridian_query_returns_both_sides() {
        let points = vec![GeoPoint::new(1, 0.0, 179.5), GeoPoint::new(2, 0.0, -179.5)];
        let index = ClusterIndex::build(&points, ClusterIndexConfig::default()).expect("index");
        let query = ViewportQuery::new(BoundingBox::new(170.0, -5.0, -170.0, 5.0), 16);
        assert_eq!(index.query(&query).len(), 2);
    }

    #[test]
    fn rebuild_is_deterministic() {
        let points: Vec<GeoPoint> = (0..400)
            .map(|i| {
                let f = f64::from(i);
                GeoPoint::new(i64::from(i), (f * 0.37).sin() * 50.0, (f * 0.73).cos() * 150.0)
            })
            .collect();
        let a = ClusterIndex::build(&points, ClusterIndexConfig::default()).expect("index a");
        let b = ClusterIndex::build(&points, ClusterIndexConfig::default()).expect("index b");
        for zoom in [0, 2, 5, 9, 15] {
            assert_eq!(a.query(&world(zoom)), b.query(&world(zoom)));
        }
    }
}
