mod csv_io;
mod json_io;
pub(crate) mod memory;
#[cfg(feature = "sqlite")]
mod sqlite_io;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SoilError;
use crate::models::{HorizonRecord, ProfileId};

pub use csv_io::{
    read_horizons_csv, read_horizons_csv_from_bytes, write_layers_csv, CsvHorizonSource,
    CsvReferenceSource,
};
pub use json_io::{profiles_to_json, write_profiles_json};
pub use memory::MemorySource;
#[cfg(feature = "sqlite")]
pub use sqlite_io::SqliteSource;

/// A data source that delivers the ordered horizons of soil profiles.
pub trait HorizonSource: Send + Sync {
    /// Stable identity used as cache key, e.g. `"csv:/data/profiles.csv"`.
    fn identity(&self) -> String;

    /// Horizons of one profile ordered by depth. Unknown ids yield an empty list.
    fn load_profile(&self, id: ProfileId) -> Result<Vec<HorizonRecord>, SoilError>;

    /// Every profile of the source in a single read.
    fn load_all_horizons(&self) -> Result<BTreeMap<ProfileId, Vec<HorizonRecord>>, SoilError>;
}

/// A data source that delivers the KA5 reference tables.
pub trait ReferenceSource: Send + Sync {
    fn identity(&self) -> String;

    /// Principal soil characteristic rows, axis = raw density [g cm-3].
    fn principal_rows(&self) -> Result<Vec<ReferenceRow>, SoilError>;

    /// Organic matter modifier rows, axis = organic matter [%].
    fn modifier_rows(&self) -> Result<Vec<ReferenceRow>, SoilError>;

    /// Capillary rise rates per texture and groundwater distance.
    fn capillary_rows(&self) -> Result<Vec<CapillaryRow>, SoilError>;
}

/// One row of a KA5 reference table, all water values in volume percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRow {
    pub texture: String,
    /// Raw density [g cm-3] or organic matter [%]; absent for peat rows
    pub axis: Option<f64>,
    pub air_capacity: f64,
    pub field_capacity: f64,
    pub n_field_capacity: f64,
}

/// One capillary rise rate entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapillaryRow {
    pub texture: String,
    /// Distance to groundwater [dm]
    pub distance: u32,
    /// [mm d-1]
    pub rate: f64,
}

/// Split a flat `(id, horizon)` stream that is already ordered by id and depth.
pub(crate) fn group_by_profile(
    rows: impl IntoIterator<Item = (ProfileId, HorizonRecord)>,
) -> BTreeMap<ProfileId, Vec<HorizonRecord>> {
    let mut profiles: BTreeMap<ProfileId, Vec<HorizonRecord>> = BTreeMap::new();
    for (id, horizon) in rows {
        profiles.entry(id).or_default().push(horizon);
    }
    profiles
}
