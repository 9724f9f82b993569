use tracing::{debug, warn};

use crate::core::timer::TimestampMs;
use crate::core::types::GeoPoint;
use crate::error::{MapError, MapResult};
use crate::extensions::PointSetExport;
use crate::render::Renderer;

use super::data_source::{PointSetRequest, PointSetResponse, PointSetSource};
use super::engine::DataStatus;
use super::point_set::ActivePointSet;
use super::{MapEngine, MapEvent};

impl<R: Renderer> MapEngine<R> {
    /// Attaches a point source and loads the active year from it.
    pub fn set_point_source(&mut self, source: Box<dyn PointSetSource>, now_ms: TimestampMs) {
        self.source = Some(source);
        self.reload(now_ms);
    }

    /// Detaches the point source. The loaded point set stays in place.
    pub fn clear_point_source(&mut self) -> bool {
        self.source.take().is_some()
    }

    #[must_use]
    pub fn has_point_source(&self) -> bool {
        self.source.is_some()
    }

    /// Sets the category filter (`None` or `"All"` for every category) and reloads.
    pub fn set_category_filter(&mut self, category: Option<&str>, now_ms: TimestampMs) {
        let category = category
            .map(str::trim)
            .filter(|name| !name.is_empty() && *name != super::data_source::ALL_CATEGORIES)
            .map(str::to_owned);
        if self.category_filter == category {
            return;
        }
        self.category_filter = category;
        self.reload(now_ms);
    }

    /// Fetches the active year again from the attached source.
    ///
    /// Fetch failures never propagate: the engine falls back to an empty
    /// point set and reports [`DataStatus::Unavailable`].
    pub fn reload(&mut self, now_ms: TimestampMs) -> DataStatus {
        self.observe_clock(now_ms);
        let year = self.year();
        let request = match PointSetRequest::new(year, self.category_filter.as_deref()) {
            Ok(request) => request,
            Err(err) => {
                self.mark_unavailable(&err, now_ms);
                return self.data_status;
            }
        };
        let fetched = match self.source.as_mut() {
            Some(source) => source.fetch(&request),
            None => return self.data_status,
        };

        match fetched {
            Ok(response) => {
                if let Err(err) = self.apply_point_set_response(response, now_ms) {
                    self.mark_unavailable(&err, now_ms);
                }
            }
            Err(err) => self.mark_unavailable(&err, now_ms),
        }
        self.data_status
    }

    /// Installs a fetched response for the active year.
    ///
    /// Responses for another year are stale and rejected.
    pub fn apply_point_set_response(
        &mut self,
        response: PointSetResponse,
        now_ms: TimestampMs,
    ) -> MapResult<()> {
        if response.year != self.year() {
            return Err(MapError::InvalidData(format!(
                "stale point-set response for {} while {} is active",
                response.year,
                self.year()
            )));
        }
        if response.count != response.points.len() {
            debug!(
                declared = response.count,
                received = response.points.len(),
                "point-set response count differs from payload"
            );
        }
        self.install_points(response.points, now_ms)
    }

    /// Replaces the active point set with host-supplied points for the active year.
    pub fn set_points(&mut self, points: Vec<GeoPoint>, now_ms: TimestampMs) -> MapResult<()> {
        self.observe_clock(now_ms);
        self.install_points(points, now_ms)
    }

    /// Records a failed host-side fetch and shows the no-data state.
    pub fn report_fetch_failure(&mut self, error: &MapError, now_ms: TimestampMs) {
        self.observe_clock(now_ms);
        self.mark_unavailable(error, now_ms);
    }

    /// Exports the active point set for offline analysis.
    #[must_use]
    pub fn export_point_set(&self) -> PointSetExport {
        PointSetExport::from_point_set(&self.point_set)
    }

    fn install_points(&mut self, points: Vec<GeoPoint>, now_ms: TimestampMs) -> MapResult<()> {
        let year = self.year();
        let point_set = ActivePointSet::build(
            year,
            self.category_filter.clone(),
            points,
            self.config.cluster,
        )?;
        // Malformed records never reach the index, so only indexed points count.
        self.data_status = if point_set.index().point_count() == 0 {
            DataStatus::NoData
        } else {
            DataStatus::Ready
        };
        self.point_set = point_set;
        debug!(
            year,
            count = self.point_set.len(),
            status = ?self.data_status,
            "active point set replaced"
        );

        let rebuilds = self.controller.rebuild_count();
        self.controller
            .replace_point_set(&self.point_set, &self.camera, now_ms);
        self.emit_plugin_event(MapEvent::PointSetReplaced {
            year,
            count: self.point_set.len(),
        });
        self.emit_layer_rebuilt_since(rebuilds);
        Ok(())
    }

    fn mark_unavailable(&mut self, error: &MapError, now_ms: TimestampMs) {
        let year = self.year();
        warn!(error = %error, year, "point set unavailable; showing empty state");
        match ActivePointSet::empty(year, self.config.cluster) {
            Ok(empty) => self.point_set = empty,
            Err(err) => warn!(error = %err, "failed to reset point set"),
        }
        self.data_status = DataStatus::Unavailable;
        let rebuilds = self.controller.rebuild_count();
        self.controller
            .replace_point_set(&self.point_set, &self.camera, now_ms);
        self.emit_plugin_event(MapEvent::DataUnavailable { year });
        self.emit_layer_rebuilt_since(rebuilds);
    }
}
