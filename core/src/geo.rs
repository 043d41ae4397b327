//! Bounding-box normalization and GeoJSON shapes for the incident map.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::incidents::{Incident, IncidentStatus, IncidentType};

pub const DEFAULT_MAP_LIMIT: i64 = 100;
pub const MAX_MAP_LIMIT: i64 = 500;

/// A corner-normalized rectangle: `min_* <= max_*` on both axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Parse `"minLng,minLat,maxLng,maxLat"`.
    ///
    /// Corners may be given in either order. Anything that is not exactly four
    /// finite numbers yields `None`: the box is an advisory filter, so a bad
    /// one is ignored rather than rejected.
    pub fn normalize(raw: Option<&str>) -> Option<Self> {
        let raw = raw?;
        let mut values = [0.0_f64; 4];
        let mut parts = raw.split(',');
        for slot in values.iter_mut() {
            let token = parts.next()?.trim();
            let value: f64 = token.parse().ok()?;
            if !value.is_finite() {
                return None;
            }
            *slot = value;
        }
        if parts.next().is_some() {
            return None;
        }

        let [lng_a, lat_a, lng_b, lat_b] = values;
        Some(Self {
            min_lng: lng_a.min(lng_b),
            min_lat: lat_a.min(lat_b),
            max_lng: lng_a.max(lng_b),
            max_lat: lat_a.max(lat_b),
        })
    }

    /// Inclusive containment; rows without coordinates are never inside.
    pub fn contains(&self, latitude: Option<f64>, longitude: Option<f64>) -> bool {
        match (latitude, longitude) {
            (Some(lat), Some(lng)) => {
                (self.min_lat..=self.max_lat).contains(&lat)
                    && (self.min_lng..=self.max_lng).contains(&lng)
            }
            _ => false,
        }
    }
}

/// Clamp the requested map size to `[1, MAX_MAP_LIMIT]`.
pub fn clamp_map_limit(requested: Option<i64>) -> i64 {
    requested
        .unwrap_or(DEFAULT_MAP_LIMIT)
        .clamp(1, MAX_MAP_LIMIT)
}

/// Normalized filter for the map query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapFilter {
    pub status: Option<IncidentStatus>,
    pub type_incident: Option<IncidentType>,
    pub bbox: Option<BoundingBox>,
    pub limit: i64,
}

impl MapFilter {
    pub fn new(
        status: Option<IncidentStatus>,
        type_incident: Option<IncidentType>,
        bbox: Option<&str>,
        limit: Option<i64>,
    ) -> Self {
        Self {
            status,
            type_incident,
            bbox: BoundingBox::normalize(bbox),
            limit: clamp_map_limit(limit),
        }
    }

    pub fn matches(&self, incident: &Incident) -> bool {
        self.status.is_none_or(|s| s == incident.status)
            && self.type_incident.is_none_or(|t| t == incident.type_incident)
            && self
                .bbox
                .is_none_or(|b| b.contains(incident.latitude, incident.longitude))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    #[schema(value_type = String, example = "FeatureCollection")]
    pub kind: &'static str,
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Feature {
    #[serde(rename = "type")]
    #[schema(value_type = String, example = "Feature")]
    pub kind: &'static str,
    pub geometry: Point,
    pub properties: FeatureProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Point {
    #[serde(rename = "type")]
    #[schema(value_type = String, example = "Point")]
    pub kind: &'static str,
    /// `[longitude, latitude]`
    #[schema(value_type = Vec<f64>)]
    pub coordinates: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeatureProperties {
    pub id: i64,
    pub type_incident: IncidentType,
    pub status: IncidentStatus,
    pub message: String,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Feature {
    /// Project an incident onto a map point. `None` without both coordinates.
    pub fn from_incident(incident: Incident) -> Option<Self> {
        let (Some(lat), Some(lng)) = (incident.latitude, incident.longitude) else {
            return None;
        };
        Some(Self {
            kind: "Feature",
            geometry: Point {
                kind: "Point",
                coordinates: [lng, lat],
            },
            properties: FeatureProperties {
                id: incident.id,
                type_incident: incident.type_incident,
                status: incident.status,
                message: incident.message,
                address: incident.address,
                created_at: incident.created_at,
            },
        })
    }
}

impl FromIterator<Incident> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Incident>>(iter: I) -> Self {
        Self {
            kind: "FeatureCollection",
            features: iter.into_iter().filter_map(Feature::from_incident).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incident(id: i64, latitude: Option<f64>, longitude: Option<f64>) -> Incident {
        let now = Utc::now();
        Incident {
            id,
            type_incident: IncidentType::Accident,
            message: "Car crash on the corner".to_string(),
            latitude,
            longitude,
            address: None,
            reporter_id: Some(3),
            status: IncidentStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn swapped_corners_normalize_identically() {
        let a = BoundingBox::normalize(Some("10,-5,2,3")).unwrap();
        let b = BoundingBox::normalize(Some("2,-5,10,3")).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            a,
            BoundingBox {
                min_lng: 2.0,
                min_lat: -5.0,
                max_lng: 10.0,
                max_lat: 3.0,
            }
        );
    }

    #[test]
    fn malformed_boxes_degrade_to_none() {
        for raw in [
            "a,b,c,d",
            "1,2,3",
            "1,2,3,4,5",
            "1,,3,4",
            "NaN,0,1,1",
            "inf,0,1,1",
            "",
        ] {
            assert_eq!(BoundingBox::normalize(Some(raw)), None, "{raw:?}");
        }
        assert_eq!(BoundingBox::normalize(None), None);
    }

    #[test]
    fn whitespace_around_numbers_is_tolerated() {
        let bbox = BoundingBox::normalize(Some(" -58.5, -34.7 ,-58.3,-34.5")).unwrap();
        assert_eq!(bbox.min_lng, -58.5);
        assert_eq!(bbox.max_lat, -34.5);
    }

    #[test]
    fn limit_is_clamped_independently_of_bbox() {
        assert_eq!(clamp_map_limit(None), DEFAULT_MAP_LIMIT);
        assert_eq!(clamp_map_limit(Some(0)), 1);
        assert_eq!(clamp_map_limit(Some(-20)), 1);
        assert_eq!(clamp_map_limit(Some(10_000)), MAX_MAP_LIMIT);
        assert_eq!(MapFilter::new(None, None, Some("junk"), Some(900)).limit, MAX_MAP_LIMIT);
    }

    #[test]
    fn bbox_excludes_rows_without_coordinates() {
        let bbox = BoundingBox::normalize(Some("0,0,10,10")).unwrap();
        assert!(bbox.contains(Some(5.0), Some(5.0)));
        assert!(bbox.contains(Some(10.0), Some(0.0)));
        assert!(!bbox.contains(None, Some(5.0)));
        assert!(!bbox.contains(Some(5.0), None));
        assert!(!bbox.contains(Some(11.0), Some(5.0)));
    }

    #[test]
    fn feature_collection_skips_incidents_without_coordinates() {
        let collection: FeatureCollection = vec![
            incident(1, Some(-34.6), Some(-58.4)),
            incident(2, None, Some(-58.4)),
            incident(3, Some(-34.6), None),
        ]
        .into_iter()
        .collect();

        assert_eq!(collection.features.len(), 1);
        let feature = &collection.features[0];
        assert_eq!(feature.properties.id, 1);
        assert_eq!(feature.geometry.coordinates, [-58.4, -34.6]);

        let json = serde_json::to_value(&collection).unwrap();
        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["features"][0]["geometry"]["type"], "Point");
        assert_eq!(json["features"][0]["properties"]["typeIncident"], "ACCIDENT");
    }
}
