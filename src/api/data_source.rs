use serde::{Deserialize, Serialize};

use crate::api::aggregates::{StatsResponse, YearCountsResponse, point_year};
use crate::core::timeline::{MAX_YEAR, MIN_YEAR};
use crate::core::types::GeoPoint;
use crate::error::{MapError, MapResult};

/// Category value the host UI uses for "no filter".
pub const ALL_CATEGORIES: &str = "All";

/// Point-set fetch for one year, optionally filtered to one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointSetRequest {
    pub year: i32,
    #[serde(default, alias = "shape")]
    pub category: Option<String>,
}

impl PointSetRequest {
    /// Validates the year and normalizes the `"All"`/empty category to no filter.
    pub fn new(year: i32, category: Option<&str>) -> MapResult<Self> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(MapError::InvalidData(format!(
                "point-set year {year} is outside [{MIN_YEAR}, {MAX_YEAR}]"
            )));
        }
        let category = category
            .map(str::trim)
            .filter(|name| !name.is_empty() && *name != ALL_CATEGORIES)
            .map(str::to_owned);
        Ok(Self { year, category })
    }

    #[must_use]
    pub fn matches(&self, point: &GeoPoint) -> bool {
        if point_year(point) != Some(self.year) {
            return false;
        }
        match &self.category {
            Some(category) => point.category.as_deref() == Some(category.as_str()),
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointSetResponse {
    pub year: i32,
    pub count: usize,
    #[serde(alias = "sightings")]
    pub points: Vec<GeoPoint>,
}

impl PointSetResponse {
    #[must_use]
    pub fn new(year: i32, points: Vec<GeoPoint>) -> Self {
        Self {
            year,
            count: points.len(),
            points,
        }
    }

    pub fn from_json_str(input: &str) -> MapResult<Self> {
        serde_json::from_str(input)
            .map_err(|e| MapError::InvalidData(format!("failed to parse point-set json: {e}")))
    }
}

/// Supplier of per-year point sets.
///
/// Errors are recovered by the engine: it shows the no-data state instead of
/// propagating the failure.
pub trait PointSetSource {
    fn fetch(&mut self, request: &PointSetRequest) -> MapResult<PointSetResponse>;
}

/// In-memory source over a full record collection.
#[derive(Debug, Clone, Default)]
pub struct StaticPointSource {
    points: Vec<GeoPoint>,
}

impl StaticPointSource {
    /// Records are kept in ascending id order, matching the paged fetch order.
    #[must_use]
    pub fn new(mut points: Vec<GeoPoint>) -> Self {
        points.sort_by_key(|point| point.id);
        Self { points }
    }

    #[must_use]
    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    #[must_use]
    pub fn year_counts(&self) -> YearCountsResponse {
        YearCountsResponse::from_points(&self.points)
    }

    #[must_use]
    pub fn stats(&self) -> StatsResponse {
        StatsResponse::from_points(&self.points)
    }
}

impl PointSetSource for StaticPointSource {
    fn fetch(&mut self, request: &PointSetRequest) -> MapResult<PointSetResponse> {
        let points = self
            .points
            .iter()
            .filter(|point| request.matches(point))
            .cloned()
            .collect();
        Ok(PointSetResponse::new(request.year, points))
    }
}
