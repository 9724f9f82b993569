use approx::assert_relative_eq;
use proptest::prelude::*;
use signal_map::core::timeline::{DEFAULT_ANCHOR_YEARS, SLIDER_MAX};
use signal_map::core::{MAX_YEAR, MIN_YEAR, TimelineMapper};

#[test]
fn anchors_sit_on_equal_progress_steps() {
    let mapper = TimelineMapper::default();
    let step = 100.0 / (DEFAULT_ANCHOR_YEARS.len() - 1) as f64;
    for (i, year) in DEFAULT_ANCHOR_YEARS.iter().enumerate() {
        assert_relative_eq!(mapper.year_to_progress(*year), step * i as f64, epsilon = 1e-9);
        assert_eq!(mapper.progress_to_year(step * i as f64), *year);
    }
}

#[test]
fn recent_decades_get_more_track_than_early_centuries() {
    let mapper = TimelineMapper::default();
    let early = mapper.year_to_progress(1401) - mapper.year_to_progress(1400);
    let recent = mapper.year_to_progress(2011) - mapper.year_to_progress(2010);
    assert!(recent > early * 10.0);
    assert_relative_eq!(recent / early, 40.0, epsilon = 1e-9);
}

#[test]
fn out_of_range_inputs_clamp_to_the_ends() {
    let mapper = TimelineMapper::default();
    assert_eq!(mapper.year_to_progress(1000), 0.0);
    assert_eq!(mapper.year_to_progress(3000), 100.0);
    assert_eq!(mapper.progress_to_year(-5.0), MIN_YEAR);
    assert_eq!(mapper.progress_to_year(f64::NAN), MIN_YEAR);
    assert_eq!(mapper.progress_to_year(250.0), MAX_YEAR);
    assert_eq!(mapper.year_for_slider_value(SLIDER_MAX + 50), MAX_YEAR);
}

proptest! {
    #[test]
    fn year_progress_round_trip(year in MIN_YEAR..=MAX_YEAR) {
        let mapper = TimelineMapper::default();
        prop_assert_eq!(mapper.progress_to_year(mapper.year_to_progress(year)), year);
    }

    #[test]
    fn progress_year_round_trip_stays_within_segment_rounding(p in 0.0f64..=100.0) {
        let mapper = TimelineMapper::default();
        let anchors = mapper.anchors();
        let segments = mapper.segment_count();
        let segment_width = 100.0 / segments as f64;
        let segment = ((p / segment_width).floor() as usize).min(segments - 1);
        let span = f64::from(anchors[segment + 1] - anchors[segment]);
        let tolerance = 0.5 / span * segment_width + 1e-9;

        let restored = mapper.year_to_progress(mapper.progress_to_year(p));
        prop_assert!(
            (restored - p).abs() <= tolerance,
            "p={} restored={} tolerance={}",
            p,
            restored,
            tolerance
        );
    }

    #[test]
    fn slider_round_trip(year in MIN_YEAR..=MAX_YEAR) {
        let mapper = TimelineMapper::default();
        let value = mapper.slider_value_for_year(year);
        prop_assert!(value <= SLIDER_MAX);
        prop_assert_eq!(mapper.year_for_slider_value(value), year);
    }

    #[test]
    fn progress_is_strictly_monotonic(a in MIN_YEAR..MAX_YEAR, gap in 1i32..200) {
        let mapper = TimelineMapper::default();
        let b = (a + gap).min(MAX_YEAR);
        prop_assume!(b > a);
        prop_assert!(mapper.year_to_progress(a) < mapper.year_to_progress(b));
    }

    #[test]
    fn progress_to_year_never_decreases(p in 0.0f64..100.0, dp in 0.0f64..10.0) {
        let mapper = TimelineMapper::default();
        prop_assert!(mapper.progress_to_year(p) <= mapper.progress_to_year(p + dp));
    }
}
