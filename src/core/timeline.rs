use serde::{Deserialize, Serialize};

use crate::error::{MapError, MapResult};

pub const MIN_YEAR: i32 = 1400;
pub const MAX_YEAR: i32 = 2026;
pub const DEFAULT_YEAR: i32 = 2020;

/// Breakpoints of the scrubber axis; every gap gets the same track width.
pub const DEFAULT_ANCHOR_YEARS: [i32; 10] =
    [1400, 1800, 1900, 1950, 1970, 1990, 2000, 2010, 2020, 2026];

/// Integer resolution of the slider track.
pub const SLIDER_MAX: u32 = 10_000;

const BOUNDARY_SNAP_EPSILON: f64 = 1e-9;

/// Clamps a year into `[MIN_YEAR, MAX_YEAR]`.
#[must_use]
pub fn clamp_year(year: i32) -> i32 {
    year.clamp(MIN_YEAR, MAX_YEAR)
}

/// Non-linear mapping between a uniform 0..=100 scrubber and the year axis.
///
/// The axis is split into equal-width progress segments, one per pair of
/// adjacent anchor years, with linear interpolation inside each segment.
///
/// Serializes as the bare anchor list; deserializing runs the same checks as
/// [`TimelineMapper::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<i32>", into = "Vec<i32>")]
pub struct TimelineMapper {
    anchors: Vec<i32>,
}

impl TryFrom<Vec<i32>> for TimelineMapper {
    type Error = MapError;

    fn try_from(anchors: Vec<i32>) -> MapResult<Self> {
        Self::new(anchors)
    }
}

impl From<TimelineMapper> for Vec<i32> {
    fn from(mapper: TimelineMapper) -> Self {
        mapper.anchors
    }
}

impl Default for TimelineMapper {
    fn default() -> Self {
        Self {
            anchors: DEFAULT_ANCHOR_YEARS.to_vec(),
        }
    }
}

impl TimelineMapper {
    /// Builds a mapper over custom anchors (at least two, strictly increasing).
    pub fn new(anchors: Vec<i32>) -> MapResult<Self> {
        if anchors.len() < 2 {
            return Err(MapError::InvalidConfig(
                "timeline needs at least two anchor years".to_owned(),
            ));
        }
        if anchors.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(MapError::InvalidConfig(
                "timeline anchor years must be strictly increasing".to_owned(),
            ));
        }
        Ok(Self { anchors })
    }

    #[must_use]
    pub fn anchors(&self) -> &[i32] {
        &self.anchors
    }

    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.anchors.len() - 1
    }

    #[must_use]
    pub fn first_year(&self) -> i32 {
        self.anchors[0]
    }

    #[must_use]
    pub fn last_year(&self) -> i32 {
        self.anchors[self.anchors.len() - 1]
    }

    /// Progress of the boundary in front of anchor `index`.
    #[must_use]
    pub fn anchor_progress(&self, index: usize) -> f64 {
        let index = index.min(self.segment_count());
        index as f64 / self.segment_count() as f64 * 100.0
    }

    pub fn year_to_progress(&self, year: i32) -> f64 {
        if year <= self.first_year() {
            return 0.0;
        }
        if year >= self.last_year() {
            return 100.0;
        }

        let segment = self
            .anchors
            .windows(2)
            .position(|pair| year <= pair[1])
            .unwrap_or(self.segment_count() - 1);
        let start = self.anchors[segment];
        let end = self.anchors[segment + 1];
        if year == end {
            return self.anchor_progress(segment + 1);
        }
        let t = f64::from(year - start) / f64::from(end - start);
        (segment as f64 + t) / self.segment_count() as f64 * 100.0
    }

    /// Inverse of [`TimelineMapper::year_to_progress`], rounded to whole years.
    pub fn progress_to_year(&self, progress: f64) -> i32 {
        if progress.is_nan() || progress <= 0.0 {
            return self.first_year();
        }
        if progress >= 100.0 {
            return self.last_year();
        }

        let scaled = progress / 100.0 * self.segment_count() as f64;
        let nearest = scaled.round();
        if (scaled - nearest).abs() <= BOUNDARY_SNAP_EPSILON {
            return self.anchors[nearest as usize];
        }

        let segment = (scaled.floor() as usize).min(self.segment_count() - 1);
        let t = scaled - segment as f64;
        let start = f64::from(self.anchors[segment]);
        let end = f64::from(self.anchors[segment + 1]);
        (start + t * (end - start)).round() as i32
    }

    /// Slider track position (0..=`SLIDER_MAX`) for a year.
    #[must_use]
    pub fn slider_value_for_year(&self, year: i32) -> u32 {
        (self.year_to_progress(year) / 100.0 * f64::from(SLIDER_MAX)).round() as u32
    }

    #[must_use]
    pub fn year_for_slider_value(&self, value: u32) -> i32 {
        let value = value.min(SLIDER_MAX);
        self.progress_to_year(f64::from(value) / f64::from(SLIDER_MAX) * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::{DEFAULT_ANCHOR_YEARS, SLIDER_MAX, TimelineMapper};

    #[test]
    fn anchors_map_to_segment_boundaries() {
        let mapper = TimelineMapper::default();
        assert_relative_eq!(mapper.year_to_progress(1800), 100.0 / 9.0, epsilon = 1e-9);
        for (index, &year) in DEFAULT_ANCHOR_YEARS.iter().enumerate() {
            assert_relative_eq!(
                mapper.year_to_progress(year),
                mapper.anchor_progress(index),
                epsilon = 1e-9
            );
            assert_eq!(mapper.progress_to_year(mapper.anchor_progress(index)), year);
        }
    }

    #[test]
    fn deserializing_rejects_invalid_anchor_lists() {
        assert!(serde_json::from_str::<TimelineMapper>("[]").is_err());
        assert!(serde_json::from_str::<TimelineMapper>("[2000]").is_err());
        assert!(serde_json::from_str::<TimelineMapper>("[2000, 1990]").is_err());

        let mapper: TimelineMapper = serde_json::from_str("[1900, 2000]").expect("mapper");
        assert_eq!(mapper.anchors(), &[1900, 2000]);
        let json = serde_json::to_string(&TimelineMapper::default()).expect("json");
        assert_eq!(json, "[1400,1800,1900,1950,1970,1990,2000,2010,2020,2026]");
    }

    #[test]
    fn ends_clamp() {
        let mapper = TimelineMapper::default();
        assert_eq!(mapper.progress_to_year(0.0), 1400);
        assert_eq!(mapper.progress_to_year(100.0), 2026);
        assert_eq!(mapper.progress_to_year(-5.0), 1400);
        assert_eq!(mapper.progress_to_year(250.0), 2026);
        assert_eq!(mapper.progress_to_year(f64::NAN), 1400);
        assert_eq!(mapper.year_to_progress(1000), 0.0);
        assert_eq!(mapper.year_to_progress(3000), 100.0);
    }

    #[test]
    fn interpolates_inside_segment() {
        let mapper = TimelineMapper::default();
        let midpoint = (mapper.anchor_progress(2) + mapper.anchor_progress(3)) / 2.0;
        assert_eq!(mapper.progress_to_year(midpoint), 1925);
        assert_relative_eq!(mapper.year_to_progress(1925), midpoint, epsilon = 1e-9);
    }

    #[test]
    fn slider_round_trip_covers_recent_years_exactly() {
        let mapper = TimelineMapper::default();
        for year in 1990..=2026 {
            let value = mapper.slider_value_for_year(year);
            assert!(value <= SLIDER_MAX);
            assert_eq!(mapper.year_for_slider_value(value), year);
        }
    }

    #[test]
    fn custom_anchors_are_validated() {
        assert!(TimelineMapper::new(vec![2000]).is_err());
        assert!(TimelineMapper::new(vec![2000, 1990]).is_err());
        assert!(TimelineMapper::new(vec![1990, 2000, 2010]).is_ok());
    }
}
