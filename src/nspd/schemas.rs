// src/nspd/schemas.rs
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::geometry::LatLon;

/// Top-level body of the geoportal search endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NspdSearchResponse {
    #[serde(default)]
    pub data: Option<NspdData>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

impl NspdSearchResponse {
    pub fn first_feature(&self) -> Option<&NspdFeature> {
        self.data.as_ref().and_then(|d| d.features.first())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NspdData {
    #[serde(default)]
    pub features: Vec<NspdFeature>,
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NspdFeature {
    #[serde(default)]
    pub geometry: Option<NspdGeometry>,
    #[serde(default)]
    pub properties: NspdProperties,
}

/// GeoJSON-like geometry in EPSG:3857 meters. Coordinates are kept as raw
/// JSON because their nesting depth depends on `geometry_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NspdGeometry {
    #[serde(rename = "type")]
    pub geometry_type: String,
    #[serde(default)]
    pub coordinates: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NspdProperties {
    #[serde(default, deserialize_with = "loose_string")]
    pub cadastral_number: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub address: Option<String>,
    #[serde(default)]
    pub area_value: Option<f64>,
    #[serde(default, deserialize_with = "loose_string")]
    pub area_unit: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub category_id: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub utilization_id: Option<String>,
}

/// Accepts a string, a number or null; blank strings become `None`.
fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Registry object reduced to what the resolver and geometry sync use.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CadastralObject {
    pub cadastral_number: String,
    pub address: Option<String>,
    pub geometry: NspdGeometry,
    pub centroid: Option<LatLon>,
    pub land_category: Option<String>,
    pub permitted_use: Option<String>,
    pub area: Option<f64>,
    pub area_unit: Option<String>,
}

impl CadastralObject {
    pub fn geometry_type(&self) -> &str {
        &self.geometry.geometry_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_search_response() {
        let body = r#"{
            "data": {
                "features": [{
                    "type": "Feature",
                    "id": "1",
                    "geometry": {"type": "Point", "coordinates": [2253000.5, 7263000.25]},
                    "properties": {
                        "cadastral_number": "39:03:080808:562",
                        "address": "  Калининградская обл, Гурьевский р-н, п Шоссейное ",
                        "area_value": 1200,
                        "category_id": 3,
                        "utilization_id": ""
                    }
                }],
                "total": 1
            },
            "success": true
        }"#;

        let response: NspdSearchResponse = serde_json::from_str(body).unwrap();
        let feature = response.first_feature().unwrap();
        assert_eq!(feature.geometry.as_ref().unwrap().geometry_type, "Point");
        assert_eq!(
            feature.properties.address.as_deref(),
            Some("Калининградская обл, Гурьевский р-н, п Шоссейное")
        );
        assert_eq!(feature.properties.category_id.as_deref(), Some("3"));
        assert_eq!(feature.properties.utilization_id, None);
        assert_eq!(feature.properties.area_value, Some(1200.0));
    }

    #[test]
    fn test_empty_and_missing_data() {
        let empty: NspdSearchResponse = serde_json::from_str(r#"{"data": {"features": []}}"#).unwrap();
        assert!(empty.first_feature().is_none());

        let bare: NspdSearchResponse = serde_json::from_str("{}").unwrap();
        assert!(bare.first_feature().is_none());
    }
}
