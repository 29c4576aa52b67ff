// src/nspd/geometry.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::f64::consts::PI;

use super::schemas::NspdGeometry;
use crate::utils::constants::WEB_MERCATOR_HALF_EXTENT;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

/// Inverse spherical Mercator, EPSG:3857 meters to WGS84 degrees.
pub fn web_mercator_to_wgs84(x: f64, y: f64) -> LatLon {
    let lon = x * 180.0 / WEB_MERCATOR_HALF_EXTENT;
    let lat = y * 180.0 / WEB_MERCATOR_HALF_EXTENT;
    let lat = 180.0 / PI * (2.0 * (lat * PI / 180.0).exp().atan() - PI / 2.0);
    LatLon { lat, lon }
}

/// Forward spherical Mercator, WGS84 degrees to EPSG:3857 meters.
pub fn wgs84_to_web_mercator(point: LatLon) -> (f64, f64) {
    let x = point.lon * WEB_MERCATOR_HALF_EXTENT / 180.0;
    let y = ((90.0 + point.lat) * PI / 360.0).tan().ln() / (PI / 180.0);
    let y = y * WEB_MERCATOR_HALF_EXTENT / 180.0;
    (x, y)
}

fn as_xy(value: &Value) -> Option<(f64, f64)> {
    let pair = value.as_array()?;
    if pair.len() < 2 {
        return None;
    }
    Some((pair[0].as_f64()?, pair[1].as_f64()?))
}

/// Arithmetic mean of the ring's vertices. The closing vertex is counted
/// like any other; this is not an area-weighted centroid.
fn ring_mean(ring: &Value) -> Option<(f64, f64)> {
    let (sum_x, sum_y, count) = ring
        .as_array()?
        .iter()
        .filter_map(as_xy)
        .fold((0.0, 0.0, 0usize), |(sx, sy, n), (x, y)| (sx + x, sy + y, n + 1));
    if count == 0 {
        None
    } else {
        Some((sum_x / count as f64, sum_y / count as f64))
    }
}

/// Centroid in the geometry's own (3857) coordinates. Only the outer ring
/// of the first polygon is considered.
pub fn centroid_of(geometry: &NspdGeometry) -> Option<(f64, f64)> {
    let coords = &geometry.coordinates;
    match geometry.geometry_type.as_str() {
        "Point" => as_xy(coords),
        "Polygon" => ring_mean(coords.get(0)?),
        "MultiPolygon" => ring_mean(coords.get(0)?.get(0)?),
        _ => None,
    }
}

pub fn centroid_wgs84(geometry: &NspdGeometry) -> Option<LatLon> {
    centroid_of(geometry).map(|(x, y)| web_mercator_to_wgs84(x, y))
}

/// Whether the geometry carries an actual parcel contour.
pub fn is_contour(geometry: &NspdGeometry) -> bool {
    matches!(geometry.geometry_type.as_str(), "Polygon" | "MultiPolygon")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn polygon(ring: Value) -> NspdGeometry {
        NspdGeometry {
            geometry_type: "Polygon".to_string(),
            coordinates: json!([ring]),
        }
    }

    #[test]
    fn test_point_centroid() {
        let geometry = NspdGeometry {
            geometry_type: "Point".to_string(),
            coordinates: json!([100.0, 200.0]),
        };
        assert_eq!(centroid_of(&geometry), Some((100.0, 200.0)));
        assert!(!is_contour(&geometry));
    }

    #[test]
    fn test_polygon_centroid_averages_first_ring() {
        let geometry = NspdGeometry {
            geometry_type: "Polygon".to_string(),
            coordinates: json!([
                [[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]],
                [[100.0, 100.0], [101.0, 101.0], [100.0, 101.0]]
            ]),
        };
        assert_eq!(centroid_of(&geometry), Some((2.0, 2.0)));
        assert!(is_contour(&geometry));
    }

    #[test]
    fn test_multipolygon_uses_first_polygon() {
        let geometry = NspdGeometry {
            geometry_type: "MultiPolygon".to_string(),
            coordinates: json!([
                [[[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0]]],
                [[[50.0, 50.0], [60.0, 50.0], [60.0, 60.0]]]
            ]),
        };
        assert_eq!(centroid_of(&geometry), Some((1.0, 1.0)));
    }

    #[test]
    fn test_unsupported_or_empty_geometry() {
        let line = NspdGeometry {
            geometry_type: "LineString".to_string(),
            coordinates: json!([[0.0, 0.0], [1.0, 1.0]]),
        };
        assert_eq!(centroid_of(&line), None);
        assert_eq!(centroid_of(&polygon(json!([]))), None);
        let no_coords = NspdGeometry {
            geometry_type: "Polygon".to_string(),
            coordinates: Value::Null,
        };
        assert_eq!(centroid_of(&no_coords), None);
    }

    #[test]
    fn test_known_conversion() {
        let p = web_mercator_to_wgs84(0.0, 0.0);
        assert!(p.lat.abs() < 1e-9 && p.lon.abs() < 1e-9);

        // Kaliningrad is near 54.71N 20.51E
        let (x, y) = wgs84_to_web_mercator(LatLon { lat: 54.71, lon: 20.51 });
        let back = web_mercator_to_wgs84(x, y);
        assert!((back.lat - 54.71).abs() < 1e-7);
        assert!((back.lon - 20.51).abs() < 1e-7);
    }

    #[test]
    fn test_polygon_centroid_round_trip() {
        let ring = json!([
            [2283000.0, 7303000.0],
            [2283100.0, 7303000.0],
            [2283100.0, 7303080.0],
            [2283000.0, 7303080.0],
            [2283000.0, 7303000.0]
        ]);
        let geometry = polygon(ring);
        let (cx, cy) = centroid_of(&geometry).unwrap();
        let wgs = centroid_wgs84(&geometry).unwrap();
        let (x, y) = wgs84_to_web_mercator(wgs);
        assert!((x - cx).abs() < 1e-3);
        assert!((y - cy).abs() < 1e-3);
    }
}
