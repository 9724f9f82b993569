//! Downloadable documents for the active point set.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::api::ActivePointSet;
use crate::core::types::GeoPoint;
use crate::error::{MapError, MapResult};

pub const POINT_SET_EXPORT_JSON_SCHEMA_V1: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointSetExport {
    pub year: i32,
    #[serde(default)]
    pub category: Option<String>,
    pub count: usize,
    pub points: Vec<GeoPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointSetExportJsonContractV1 {
    pub schema_version: u32,
    pub export: PointSetExport,
}

impl PointSetExport {
    #[must_use]
    pub fn from_point_set(point_set: &ActivePointSet) -> Self {
        Self {
            year: point_set.year(),
            category: point_set.category().map(str::to_owned),
            count: point_set.len(),
            points: point_set.points().to_vec(),
        }
    }

    pub fn to_json_contract_v1_pretty(&self) -> MapResult<String> {
        let payload = PointSetExportJsonContractV1 {
            schema_version: POINT_SET_EXPORT_JSON_SCHEMA_V1,
            export: self.clone(),
        };
        serde_json::to_string_pretty(&payload).map_err(|e| {
            MapError::InvalidData(format!("failed to serialize point-set export v1: {e}"))
        })
    }

    pub fn from_json_compat_str(input: &str) -> MapResult<Self> {
        if let Ok(export) = serde_json::from_str::<PointSetExport>(input) {
            return Ok(export);
        }
        let payload: PointSetExportJsonContractV1 = serde_json::from_str(input).map_err(|e| {
            MapError::InvalidData(format!("failed to parse point-set export json payload: {e}"))
        })?;
        if payload.schema_version != POINT_SET_EXPORT_JSON_SCHEMA_V1 {
            return Err(MapError::InvalidData(format!(
                "unsupported point-set export schema version: {}",
                payload.schema_version
            )));
        }
        Ok(payload.export)
    }

    /// GeoJSON `FeatureCollection` with one `Point` feature per record.
    #[must_use]
    pub fn to_geojson(&self) -> Value {
        let features: Vec<Value> = self
            .points
            .iter()
            .map(|point| {
                json!({
                    "type": "Feature",
                    "id": point.id,
                    "geometry": {
                        "type": "Point",
                        "coordinates": [point.lon, point.lat],
                    },
                    "properties": {
                        "category": point.category,
                        "timestamp": point.timestamp,
                        "location": point.location_label,
                    },
                })
            })
            .collect();
        json!({
            "type": "FeatureCollection",
            "features": features,
        })
    }

    pub fn to_geojson_string(&self) -> MapResult<String> {
        serde_json::to_string(&self.to_geojson())
            .map_err(|e| MapError::InvalidData(format!("failed to serialize geojson export: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::PointSetExport;
    use crate::api::ActivePointSet;
    use crate::core::cluster_index::ClusterIndexConfig;
    use crate::core::types::GeoPoint;

    fn export() -> PointSetExport {
        let set = ActivePointSet::build(
            2021,
            Some("Light".to_owned()),
            vec![GeoPoint::new(4, 12.5, -3.25).with_category("Light")],
            ClusterIndexConfig::default(),
        )
        .expect("set");
        PointSetExport::from_point_set(&set)
    }

    #[test]
    fn contract_accepts_wrapped_and_bare_payloads() {
        let export = export();
        let wrapped = export.to_json_contract_v1_pretty().expect("json");
        assert!(wrapped.contains("\"schema_version\": 1"));
        assert_eq!(
            PointSetExport::from_json_compat_str(&wrapped).expect("wrapped"),
            export
        );
        let bare = serde_json::to_string(&export).expect("bare");
        assert_eq!(
            PointSetExport::from_json_compat_str(&bare).expect("bare"),
            export
        );
    }

    #[test]
    fn unknown_schema_version_is_rejected() {
        let input = r#"{"schema_version":7,"export":{"year":2021,"count":0,"points":[]}}"#;
        assert!(PointSetExport::from_json_compat_str(input).is_err());
    }

    #[test]
    fn geojson_uses_lon_lat_order() {
        let geojson = export().to_geojson();
        assert_eq!(geojson["type"], "FeatureCollection");
        assert_eq!(geojson["features"][0]["geometry"]["coordinates"][0], -3.25);
        assert_eq!(geojson["features"][0]["geometry"]["coordinates"][1], 12.5);
        assert_eq!(geojson["features"][0]["properties"]["category"], "Light");
    }
}
