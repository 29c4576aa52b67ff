// src/matching/db.rs
use anyhow::{Context, Result};
use log::{debug, info};
use tokio_postgres::types::{Json, ToSql};
use tokio_postgres::Row;
use uuid::Uuid;

use crate::matching::bundle::LinkUpdate;
use crate::matching::settlement::ReferenceTable;
use crate::models::core::{District, LandPlot, LocationFields, Settlement};
use crate::nspd::geometry::LatLon;
use crate::nspd::schemas::NspdGeometry;
use crate::utils::db_connect::PgPool;
use crate::utils::plot_filter::PlotFilterConfig;

const PLOT_COLUMNS: &str = "p.id, p.title, p.cadastral_number,
    COALESCE(p.additional_cadastral_numbers, '{}'::text[]) AS additional_cadastral_numbers,
    p.district, p.location, p.center_lat::float8 AS center_lat, p.center_lon::float8 AS center_lon,
    COALESCE(p.has_coordinates, false) AS has_coordinates,
    p.bundle_id, COALESCE(p.is_bundle_primary, false) AS is_bundle_primary, p.ownership_type";

fn row_to_plot(row: &Row) -> LandPlot {
    LandPlot {
        id: row.get("id"),
        title: row.get("title"),
        cadastral_number: row.get("cadastral_number"),
        additional_cadastral_numbers: row.get("additional_cadastral_numbers"),
        district: row.get("district"),
        location: row.get("location"),
        center_lat: row.get("center_lat"),
        center_lon: row.get("center_lon"),
        has_coordinates: row.get("has_coordinates"),
        bundle_id: row.get("bundle_id"),
        is_bundle_primary: row.get("is_bundle_primary"),
        ownership_type: row.get("ownership_type"),
    }
}

/// Loads districts and settlements ordered by name; matching treats
/// this order as the reference order for tie-breaks.
pub async fn fetch_reference_table(pool: &PgPool) -> Result<ReferenceTable> {
    let conn = pool
        .get()
        .await
        .context("Failed to get DB connection for fetch_reference_table")?;

    let districts: Vec<District> = conn
        .query("SELECT id, name FROM public.districts ORDER BY name", &[])
        .await
        .context("Failed to load districts")?
        .iter()
        .map(|row| District {
            id: row.get("id"),
            name: row.get("name"),
        })
        .collect();

    let settlements: Vec<Settlement> = conn
        .query(
            "SELECT id, name, district_id FROM public.settlements ORDER BY name",
            &[],
        )
        .await
        .context("Failed to load settlements")?
        .iter()
        .map(|row| Settlement {
            id: row.get("id"),
            name: row.get("name"),
            district_id: row.get("district_id"),
        })
        .collect();

    let table = ReferenceTable::new(districts, settlements);
    info!(
        "Loaded reference table: {} districts, {} settlements",
        table.district_count(),
        table.settlement_count()
    );
    Ok(table)
}

/// Parcels with a cadastral number passing `filter`, at most `limit` rows.
pub async fn fetch_plots_with_cadastral(
    pool: &PgPool,
    filter: &PlotFilterConfig,
    limit: Option<i64>,
) -> Result<Vec<LandPlot>> {
    let conn = pool
        .get()
        .await
        .context("Failed to get DB connection for fetch_plots_with_cadastral")?;

    let mut params: Vec<Box<dyn ToSql + Sync + Send>> = Vec::new();
    let mut sql = format!(
        "SELECT {} FROM public.land_plots p
         WHERE p.cadastral_number IS NOT NULL AND btrim(p.cadastral_number) <> ''",
        PLOT_COLUMNS
    );

    if let Some((clause, values)) = filter.build_where_clause(0) {
        if !clause.is_empty() {
            sql.push_str(" AND ");
            sql.push_str(&clause);
        }
        for value in values {
            params.push(Box::new(value));
        }
    }
    sql.push_str(" ORDER BY p.cadastral_number, p.id");
    if let Some(limit) = limit {
        params.push(Box::new(limit));
        sql.push_str(&format!(" LIMIT ${}", params.len()));
    }

    debug!("Parcel query: {}", sql);
    let param_refs: Vec<&(dyn ToSql + Sync)> = params
        .iter()
        .map(|p| p.as_ref() as &(dyn ToSql + Sync))
        .collect();

    let rows = conn
        .query(sql.as_str(), &param_refs)
        .await
        .context("Failed to load parcels")?;
    Ok(rows.iter().map(row_to_plot).collect())
}

/// Whole parcel table, for linking and diagnostics.
pub async fn fetch_all_plots(pool: &PgPool) -> Result<Vec<LandPlot>> {
    let conn = pool
        .get()
        .await
        .context("Failed to get DB connection for fetch_all_plots")?;
    let sql = format!(
        "SELECT {} FROM public.land_plots p ORDER BY p.cadastral_number NULLS LAST, p.id",
        PLOT_COLUMNS
    );
    let rows = conn
        .query(sql.as_str(), &[])
        .await
        .context("Failed to load parcel table")?;
    Ok(rows.iter().map(row_to_plot).collect())
}

/// Writes the non-`None` fields of `patch`. Returns whether a row changed.
pub async fn update_plot_location(pool: &PgPool, plot_id: Uuid, patch: &LocationFields) -> Result<bool> {
    if patch.is_empty() {
        return Ok(false);
    }
    let conn = pool
        .get()
        .await
        .context("Failed to get DB connection for update_plot_location")?;

    let updated = conn
        .execute(
            "UPDATE public.land_plots
             SET district = COALESCE($2, district),
                 location = COALESCE($3, location),
                 updated_at = now()
             WHERE id = $1",
            &[&plot_id, &patch.district, &patch.location],
        )
        .await
        .context(format!("Failed to update location of parcel {}", plot_id))?;
    Ok(updated > 0)
}

pub async fn update_plot_bundle(pool: &PgPool, update: &LinkUpdate) -> Result<bool> {
    let conn = pool
        .get()
        .await
        .context("Failed to get DB connection for update_plot_bundle")?;

    let updated = conn
        .execute(
            "UPDATE public.land_plots
             SET bundle_id = $2, is_bundle_primary = $3, updated_at = now()
             WHERE id = $1",
            &[&update.plot_id, &update.bundle_id, &update.is_bundle_primary],
        )
        .await
        .context(format!("Failed to update bundle link of parcel {}", update.plot_id))?;
    Ok(updated > 0)
}

/// A blank stored `district` counts as missing and takes the prefix district.
const GEOMETRY_UPDATE_SQL: &str = "UPDATE public.land_plots
     SET coordinates_json = $2,
         geometry_type = $3,
         has_contour = $4,
         has_coordinates = $5,
         center_lat = COALESCE($6::float8, center_lat),
         center_lon = COALESCE($7::float8, center_lon),
         land_status = COALESCE($8, land_status),
         district = COALESCE(NULLIF(btrim(district), ''), $9),
         sync_error = $10,
         updated_at = now()
     WHERE id = $1";

/// Outcome of one geometry fetch as stored on the parcel.
#[derive(Debug, Clone, Default)]
pub struct GeometryWrite {
    pub geometry: Option<NspdGeometry>,
    pub centroid: Option<LatLon>,
    pub has_contour: bool,
    pub land_status: Option<String>,
    pub district: Option<String>,
    pub sync_error: Option<String>,
}

pub async fn update_plot_geometry(pool: &PgPool, plot_id: Uuid, write: &GeometryWrite) -> Result<bool> {
    let conn = pool
        .get()
        .await
        .context("Failed to get DB connection for update_plot_geometry")?;

    let geometry_json = write
        .geometry
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .context("Failed to serialize parcel geometry")?;
    let geometry_type = write.geometry.as_ref().map(|g| g.geometry_type.clone());
    let lat = write.centroid.map(|c| c.lat);
    let lon = write.centroid.map(|c| c.lon);

    let result = if geometry_json.is_some() {
        conn.execute(
            GEOMETRY_UPDATE_SQL,
            &[
                &plot_id,
                &geometry_json.map(Json),
                &geometry_type,
                &write.has_contour,
                &write.centroid.is_some(),
                &lat,
                &lon,
                &write.land_status,
                &write.district,
                &write.sync_error,
            ],
        )
        .await
    } else {
        conn.execute(
            "UPDATE public.land_plots SET sync_error = $2, updated_at = now() WHERE id = $1",
            &[&plot_id, &write.sync_error],
        )
        .await
    };
    let updated = result.context(format!("Failed to store geometry of parcel {}", plot_id))?;

    Ok(updated > 0)
}

pub async fn update_plot_district(pool: &PgPool, plot_id: Uuid, district: &str) -> Result<bool> {
    let conn = pool
        .get()
        .await
        .context("Failed to get DB connection for update_plot_district")?;

    let updated = conn
        .execute(
            "UPDATE public.land_plots SET district = $2, updated_at = now() WHERE id = $1",
            &[&plot_id, &district],
        )
        .await
        .context(format!("Failed to update district of parcel {}", plot_id))?;
    Ok(updated > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_update_fills_blank_district() {
        assert!(GEOMETRY_UPDATE_SQL.contains("district = COALESCE(NULLIF(btrim(district), ''), $9)"));
        assert!(!GEOMETRY_UPDATE_SQL.contains("COALESCE(district,"));
    }

    #[test]
    fn test_plot_columns_default_flags() {
        assert!(PLOT_COLUMNS.contains("COALESCE(p.has_coordinates, false) AS has_coordinates"));
        assert!(PLOT_COLUMNS.contains("COALESCE(p.is_bundle_primary, false) AS is_bundle_primary"));
    }
}
