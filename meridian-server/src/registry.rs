//! Dataset registry lookups.
//!
//! The registry itself (registration, ingestion, administration) is
//! another service; this module only reads the datasets table and
//! applies the visibility rules the front-ends share.

use crate::error::{Result, ServerError};
use crate::identity::CurrentUser;
use meridian_core::{parse_type_name, slugify, DataType, Dataset, GeometryKind, GisError};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const DATASET_COLUMNS: &str = "id, name, description, data_type, geometry_type, srid, \
                               is_visible, is_public, table_name, feature_count, created_at";

fn dataset_from_row(row: &PgRow) -> Result<Dataset> {
    let data_type: String = row.try_get("data_type").map_err(GisError::from)?;
    let geometry_type: Option<String> = row.try_get("geometry_type").map_err(GisError::from)?;
    let srid: Option<i32> = row.try_get("srid").map_err(GisError::from)?;
    Ok(Dataset {
        id: row.try_get("id").map_err(GisError::from)?,
        name: row.try_get("name").map_err(GisError::from)?,
        description: row.try_get("description").map_err(GisError::from)?,
        // unrecognized kinds are treated as raster: never queryable
        data_type: DataType::from_str_lossy(&data_type).unwrap_or(DataType::Raster),
        geometry_kind: geometry_type.as_deref().map(GeometryKind::parse),
        srid: srid.unwrap_or(4326),
        is_visible: row.try_get("is_visible").map_err(GisError::from)?,
        is_public: row.try_get("is_public").map_err(GisError::from)?,
        table_name: row.try_get("table_name").map_err(GisError::from)?,
        feature_count: row.try_get("feature_count").map_err(GisError::from)?,
        created_at: row.try_get("created_at").map_err(GisError::from)?,
    })
}

/// Look up one dataset by id.
pub async fn by_id(pool: &PgPool, id: Uuid) -> Result<Option<Dataset>> {
    let sql = format!("SELECT {DATASET_COLUMNS} FROM datasets WHERE id = $1");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(GisError::from)?;
    row.as_ref().map(dataset_from_row).transpose()
}

/// Resolve a WFS type name (`gis:{uuid}`) to its dataset.
pub async fn by_type_name(pool: &PgPool, type_name: &str) -> Result<Option<Dataset>> {
    match parse_type_name(type_name) {
        Some(id) => by_id(pool, id).await,
        None => Ok(None),
    }
}

/// Resolve an ESRI service name: exact dataset name first, then the
/// normalized slug form.
pub async fn by_name_or_slug(pool: &PgPool, name: &str) -> Result<Option<Dataset>> {
    let sql = format!("SELECT {DATASET_COLUMNS} FROM datasets WHERE name = $1 LIMIT 1");
    let row = sqlx::query(&sql)
        .bind(name)
        .fetch_optional(pool)
        .await
        .map_err(GisError::from)?;
    if let Some(row) = row {
        return Ok(Some(dataset_from_row(&row)?));
    }

    let wanted = slugify(name);
    for dataset in list_public_vector(pool).await? {
        if slugify(&dataset.name) == wanted {
            return Ok(Some(dataset));
        }
    }
    Ok(None)
}

/// Public, visible vector datasets with a backing table, by name.
pub async fn list_public_vector(pool: &PgPool) -> Result<Vec<Dataset>> {
    let sql = format!(
        "SELECT {DATASET_COLUMNS} FROM datasets \
         WHERE data_type = 'vector' AND is_public AND is_visible AND table_name IS NOT NULL \
         ORDER BY name"
    );
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .map_err(GisError::from)?;
    rows.iter().map(dataset_from_row).collect()
}

/// Visibility rule shared by every read surface: public datasets are
/// open, non-public ones need an authenticated caller.
pub fn ensure_readable(dataset: &Dataset, user: Option<&CurrentUser>) -> Result<()> {
    if !dataset.is_public && user.is_none() {
        return Err(ServerError::access_denied(format!(
            "dataset {} is not public",
            dataset.id
        )));
    }
    Ok(())
}
