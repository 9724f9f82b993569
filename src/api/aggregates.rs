use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::timeline::{MAX_YEAR, MIN_YEAR};
use crate::core::types::GeoPoint;
use crate::error::{MapError, MapResult};

/// Number of categories reported in [`StatsResponse::top_categories`].
pub const TOP_CATEGORY_LIMIT: usize = 20;

const NAIVE_DATE_TIME_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Canonical year of a record timestamp.
///
/// Accepts RFC 3339, naive ISO date-times and plain dates. Returns `None` for
/// unparseable input or years outside `[MIN_YEAR, MAX_YEAR]`.
#[must_use]
pub fn bucket_year(timestamp: &str) -> Option<i32> {
    let timestamp = timestamp.trim();
    let year = if let Ok(parsed) = DateTime::parse_from_rfc3339(timestamp) {
        parsed.year()
    } else if let Some(parsed) = NAIVE_DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(timestamp, format).ok())
    {
        parsed.year()
    } else {
        NaiveDate::parse_from_str(timestamp, "%Y-%m-%d").ok()?.year()
    };
    (MIN_YEAR..=MAX_YEAR).contains(&year).then_some(year)
}

/// Canonical year of a point, when its timestamp buckets.
#[must_use]
pub fn point_year(point: &GeoPoint) -> Option<i32> {
    point.timestamp.as_deref().and_then(bucket_year)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearCount {
    pub year: i32,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearCountsResponse {
    pub year_counts: Vec<YearCount>,
}

impl YearCountsResponse {
    /// Per-year counts in ascending year order; undated records are skipped.
    #[must_use]
    pub fn from_points(points: &[GeoPoint]) -> Self {
        let mut counts: IndexMap<i32, u64> = IndexMap::new();
        for year in points.iter().filter_map(point_year) {
            *counts.entry(year).or_insert(0) += 1;
        }
        counts.sort_keys();
        Self {
            year_counts: counts
                .into_iter()
                .map(|(year, count)| YearCount { year, count })
                .collect(),
        }
    }

    #[must_use]
    pub fn count_for(&self, year: i32) -> u64 {
        self.year_counts
            .binary_search_by_key(&year, |entry| entry.year)
            .map_or(0, |position| self.year_counts[position].count)
    }

    #[must_use]
    pub fn max_count(&self) -> u64 {
        self.year_counts
            .iter()
            .map(|entry| entry.count)
            .max()
            .unwrap_or(0)
    }

    pub fn from_json_str(input: &str) -> MapResult<Self> {
        serde_json::from_str(input)
            .map_err(|e| MapError::InvalidData(format!("failed to parse year counts json: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    #[serde(alias = "shape")]
    pub category: String,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub min: i32,
    pub max: i32,
}

impl Default for YearRange {
    fn default() -> Self {
        Self {
            min: MIN_YEAR,
            max: MAX_YEAR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    #[serde(alias = "totalReports")]
    pub total_records: u64,
    #[serde(default)]
    pub year_range: YearRange,
    #[serde(alias = "topShapes")]
    pub top_categories: Vec<CategoryCount>,
    #[serde(default, alias = "allShapes")]
    pub all_categories: Vec<String>,
}

impl StatsResponse {
    /// Totals over `points`. Records without a category count toward the
    /// total only.
    #[must_use]
    pub fn from_points(points: &[GeoPoint]) -> Self {
        let mut counts: IndexMap<&str, u64> = IndexMap::new();
        for category in points.iter().filter_map(|point| point.category.as_deref()) {
            *counts.entry(category).or_insert(0) += 1;
        }

        let mut ranked: Vec<CategoryCount> = counts
            .iter()
            .map(|(category, count)| CategoryCount {
                category: (*category).to_owned(),
                count: *count,
            })
            .collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));
        ranked.truncate(TOP_CATEGORY_LIMIT);

        let mut all_categories: Vec<String> = counts.keys().map(|key| (*key).to_owned()).collect();
        all_categories.sort();

        Self {
            total_records: points.len() as u64,
            year_range: YearRange::default(),
            top_categories: ranked,
            all_categories,
        }
    }

    pub fn from_json_str(input: &str) -> MapResult<Self> {
        serde_json::from_str(input)
            .map_err(|e| MapError::InvalidData(format!("failed to parse stats json: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::{StatsResponse, YearCountsResponse, bucket_year};
    use crate::core::types::GeoPoint;

    #[test]
    fn bucketing_accepts_common_timestamp_shapes() {
        assert_eq!(bucket_year("2020-06-01T21:30:00"), Some(2020));
        assert_eq!(bucket_year("2020-06-01T21:30:00.250"), Some(2020));
        assert_eq!(bucket_year("1999-12-31T23:59:59+00:00"), Some(1999));
        assert_eq!(bucket_year("1561-04-14"), Some(1561));
        assert_eq!(bucket_year("1975-07-04 20:00:00"), Some(1975));
    }

    #[test]
    fn bucketing_drops_garbage_and_out_of_range_years() {
        assert_eq!(bucket_year("last tuesday"), None);
        assert_eq!(bucket_year("1300-01-01"), None);
        assert_eq!(bucket_year("2030-01-01T00:00:00"), None);
    }

    #[test]
    fn year_counts_are_sorted_and_skip_undated_records() {
        let points = vec![
            GeoPoint::new(1, 0.0, 0.0).with_timestamp("2001-01-01T00:00:00"),
            GeoPoint::new(2, 0.0, 0.0).with_timestamp("1999-05-05T00:00:00"),
            GeoPoint::new(3, 0.0, 0.0).with_timestamp("2001-12-31T00:00:00"),
            GeoPoint::new(4, 0.0, 0.0),
        ];
        let counts = YearCountsResponse::from_points(&points);
        let years: Vec<i32> = counts.year_counts.iter().map(|entry| entry.year).collect();
        assert_eq!(years, vec![1999, 2001]);
        assert_eq!(counts.count_for(2001), 2);
        assert_eq!(counts.count_for(2000), 0);
        assert_eq!(counts.max_count(), 2);
    }

    #[test]
    fn stats_rank_categories_by_count_then_name() {
        let mut points = Vec::new();
        for (id, category) in ["Light", "Disk", "Light", "Circle", "Disk", "Orb"]
            .into_iter()
            .enumerate()
        {
            points.push(GeoPoint::new(id as i64, 0.0, 0.0).with_category(category));
        }
        points.push(GeoPoint::new(99, 0.0, 0.0));

        let stats = StatsResponse::from_points(&points);
        assert_eq!(stats.total_records, 7);
        let top: Vec<(&str, u64)> = stats
            .top_categories
            .iter()
            .map(|entry| (entry.category.as_str(), entry.count))
            .collect();
        assert_eq!(
            top,
            vec![("Disk", 2), ("Light", 2), ("Circle", 1), ("Orb", 1)]
        );
        assert_eq!(stats.all_categories, vec!["Circle", "Disk", "Light", "Orb"]);
    }

    #[test]
    fn stats_accept_legacy_wire_names() {
        let stats = StatsResponse::from_json_str(
            r#"{"totalReports":3,"yearRange":{"min":1400,"max":2026},"topShapes":[{"shape":"Light","count":3}],"allShapes":["Light"]}"#,
        )
        .expect("stats json");
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.top_categories[0].category, "Light");
    }
}
