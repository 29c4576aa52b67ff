// src/models/core.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Administrative district or municipal area of the region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct District {
    pub id: Uuid,
    pub name: String,
}

/// Named locality belonging to exactly one district.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: Uuid,
    pub name: String,
    pub district_id: Uuid,
}

/// A parcel row from `land_plots`, reduced to the columns the
/// resolution and bundling jobs read.
///
/// `district` and `location` are free text, not foreign keys.
/// `bundle_id`, when set, is the `id` of the group's primary parcel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandPlot {
    pub id: Uuid,
    pub title: Option<String>,
    pub cadastral_number: Option<String>,
    pub additional_cadastral_numbers: Vec<String>,
    pub district: Option<String>,
    pub location: Option<String>,
    pub center_lat: Option<f64>,
    pub center_lon: Option<f64>,
    pub has_coordinates: bool,
    pub bundle_id: Option<Uuid>,
    pub is_bundle_primary: bool,
    pub ownership_type: Option<String>,
}

impl LandPlot {
    /// Bare parcel with only identity and cadastral number set.
    pub fn new(id: Uuid, cadastral_number: &str) -> Self {
        Self {
            id,
            title: None,
            cadastral_number: Some(cadastral_number.to_string()),
            additional_cadastral_numbers: Vec::new(),
            district: None,
            location: None,
            center_lat: None,
            center_lon: None,
            has_coordinates: false,
            bundle_id: None,
            is_bundle_primary: false,
            ownership_type: None,
        }
    }

    pub fn cadastral(&self) -> Option<&str> {
        self.cadastral_number
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    pub fn label(&self) -> &str {
        self.cadastral().unwrap_or("<no cadastral>")
    }
}

/// Current `district` / `location` pair of a parcel, or the patch to
/// apply to it. `None` fields are left untouched on write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl LocationFields {
    pub fn is_empty(&self) -> bool {
        self.district.is_none() && self.location.is_none()
    }
}
