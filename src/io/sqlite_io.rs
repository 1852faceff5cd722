use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags, Row};
use tracing::debug;

use crate::error::SoilError;
use crate::models::{Density, HorizonRecord, OrganicContent, ProfileId};

use super::{group_by_profile, CapillaryRow, HorizonSource, ReferenceRow, ReferenceSource};

const HORIZON_COLUMNS: &str = "id, layer_depth_cm, soil_organic_carbon_percent, \
     soil_raw_density_kg_per_m3, sand_content_percent, clay_content_percent, ph_value, soil_type";

/// A soil database in SQLite holding profiles and the KA5 tables.
///
/// A fresh read-only connection is opened per read so the source can be shared
/// between threads.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    path: PathBuf,
}

impl SqliteSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, SoilError> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(conn)
    }

    fn reference_rows(&self, query: &str) -> Result<Vec<ReferenceRow>, SoilError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(query)?;
        let rows = stmt.query_map([], |row| {
            Ok(ReferenceRow {
                texture: row.get(0)?,
                axis: row.get(1)?,
                air_capacity: row.get(2)?,
                field_capacity: row.get(3)?,
                n_field_capacity: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn parse_horizon_row(row: &Row<'_>) -> rusqlite::Result<(ProfileId, HorizonRecord)> {
    let id: ProfileId = row.get(0)?;
    let sand: Option<f64> = row.get(4)?;
    let clay: Option<f64> = row.get(5)?;
    let organic_carbon: Option<f64> = row.get(2)?;
    let raw_density: Option<f64> = row.get(3)?;
    let texture: Option<String> = row.get(7)?;

    let horizon = HorizonRecord {
        lower_depth_cm: row.get(1)?,
        texture: texture.filter(|t| !t.is_empty()),
        sand: sand.map(|s| s / 100.0),
        clay: clay.map(|c| c / 100.0),
        organic: organic_carbon.map(|c| OrganicContent::Carbon(c / 100.0)),
        density: raw_density.map(Density::Raw),
        ph: row.get(6)?,
        ..HorizonRecord::default()
    };
    Ok((id, horizon))
}

impl HorizonSource for SqliteSource {
    fn identity(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }

    fn load_profile(&self, id: ProfileId) -> Result<Vec<HorizonRecord>, SoilError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {HORIZON_COLUMNS} FROM soil_profile WHERE id = ?1 \
             ORDER BY layer_depth_cm IS NULL, layer_depth_cm"
        ))?;
        let rows = stmt.query_map(params![id], parse_horizon_row)?;
        let mut horizons = Vec::new();
        for row in rows {
            horizons.push(row?.1);
        }
        Ok(horizons)
    }

    fn load_all_horizons(&self) -> Result<BTreeMap<ProfileId, Vec<HorizonRecord>>, SoilError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {HORIZON_COLUMNS} FROM soil_profile \
             ORDER BY id, layer_depth_cm IS NULL, layer_depth_cm"
        ))?;
        let rows = stmt
            .query_map([], parse_horizon_row)?
            .collect::<Result<Vec<_>, _>>()?;
        debug!(path = %self.path.display(), horizons = rows.len(), "read soil_profile table");
        Ok(group_by_profile(rows))
    }
}

impl ReferenceSource for SqliteSource {
    fn identity(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }

    fn principal_rows(&self) -> Result<Vec<ReferenceRow>, SoilError> {
        self.reference_rows(
            "SELECT soil_type, soil_raw_density, air_capacity, field_capacity, n_field_capacity \
             FROM soil_characteristic_data ORDER BY soil_type, soil_raw_density",
        )
    }

    fn modifier_rows(&self) -> Result<Vec<ReferenceRow>, SoilError> {
        self.reference_rows(
            "SELECT soil_type, organic_matter, air_capacity, field_capacity, n_field_capacity \
             FROM soil_aggregation_values ORDER BY soil_type, organic_matter",
        )
    }

    fn capillary_rows(&self) -> Result<Vec<CapillaryRow>, SoilError> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT soil_type, distance, capillary_rate FROM capillary_rise_rate")?;
        let rows = stmt.query_map([], |row| {
            Ok(CapillaryRow {
                texture: row.get(0)?,
                distance: row.get(1)?,
                rate: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
