//! KA5 reference tables, loaded once per data source.
//!
//! Two independent tables back the characteristic derivation: the principal
//! table (Wessolek et al. 2009, Tab. 4) keyed by texture and raw density, and
//! the organic matter modifier table (Tab. 5) keyed by texture and organic
//! matter content. Capillary rise rates travel with the same source.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::capillary::CapillaryRiseRates;
use crate::error::SoilError;
use crate::io::{ReferenceRow, ReferenceSource};
use crate::models::TextureClass;

/// Lowest and highest raw density decile tabulated for mineral soils (1.1 and 1.9 g cm-3).
const MIN_DENSITY_DECILE: i32 = 11;
const MAX_DENSITY_DECILE: i32 = 19;
/// The tables are laid out on a 0.2 g cm-3 grid.
const DENSITY_DECILE_STEP: i32 = 2;

/// Water characteristics of one table row, in volume percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub saturation: f64,
    pub field_capacity: f64,
    pub permanent_wilting_point: f64,
}

impl ReferenceEntry {
    /// Saturation is air capacity plus field capacity; the wilting point is
    /// field capacity minus usable field capacity.
    pub fn from_row(row: &ReferenceRow) -> Self {
        Self {
            saturation: row.air_capacity + row.field_capacity,
            field_capacity: row.field_capacity,
            permanent_wilting_point: row.field_capacity - row.n_field_capacity,
        }
    }
}

/// Quantize an axis value to tenths, the key of both tables.
pub(crate) fn decile(x: f64) -> i32 {
    (x * 10.0).round() as i32
}

fn parse_texture(code: &str, table: &str) -> Option<TextureClass> {
    match code.parse() {
        Ok(texture) => Some(texture),
        Err(_) => {
            warn!(texture = code, table, "skipping reference row with unknown texture");
            None
        }
    }
}

/// Principal characteristics keyed by texture and raw density decile.
///
/// Peat rows carry no raw density and sit under the `None` key.
#[derive(Debug, Default)]
pub struct PrincipalTable {
    entries: HashMap<TextureClass, BTreeMap<Option<i32>, ReferenceEntry>>,
}

impl PrincipalTable {
    /// Build the table, dropping rows with any zero water column.
    pub fn from_rows(rows: &[ReferenceRow]) -> Self {
        let mut entries: HashMap<TextureClass, BTreeMap<Option<i32>, ReferenceEntry>> =
            HashMap::new();
        for row in rows {
            if row.air_capacity == 0.0 || row.field_capacity == 0.0 || row.n_field_capacity == 0.0
            {
                continue;
            }
            let Some(texture) = parse_texture(&row.texture, "principal") else {
                continue;
            };
            entries
                .entry(texture)
                .or_default()
                .insert(row.axis.map(decile), ReferenceEntry::from_row(row));
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a texture at a raw density [g cm-3], or the peat row for `None`.
    ///
    /// Densities missing from the grid are resolved by walking two deciles at a
    /// time (upwards below 1.5 g cm-3, downwards otherwise) while the key stays
    /// within 1.1..=1.9 g cm-3.
    pub fn lookup(&self, texture: TextureClass, raw_density: Option<f64>) -> Option<ReferenceEntry> {
        let by_density = self.entries.get(&texture)?;
        let Some(density) = raw_density else {
            return by_density.get(&None).copied();
        };

        let step = if density < 1.5 {
            DENSITY_DECILE_STEP
        } else {
            -DENSITY_DECILE_STEP
        };
        let mut key = decile(density);
        loop {
            if let Some(entry) = by_density.get(&Some(key)) {
                return Some(*entry);
            }
            if !(MIN_DENSITY_DECILE..=MAX_DENSITY_DECILE).contains(&key) {
                return None;
            }
            key += step;
        }
    }
}

/// Organic matter modifiers keyed by texture and organic matter decile.
#[derive(Debug, Default)]
pub struct ModifierTable {
    entries: HashMap<TextureClass, BTreeMap<i32, ReferenceEntry>>,
}

impl ModifierTable {
    pub fn from_rows(rows: &[ReferenceRow]) -> Self {
        let mut entries: HashMap<TextureClass, BTreeMap<i32, ReferenceEntry>> = HashMap::new();
        for row in rows {
            let Some(axis) = row.axis else {
                warn!(texture = %row.texture, "skipping modifier row without organic matter");
                continue;
            };
            let Some(texture) = parse_texture(&row.texture, "modifier") else {
                continue;
            };
            entries
                .entry(texture)
                .or_default()
                .insert(decile(axis), ReferenceEntry::from_row(row));
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Exact lookup at an organic matter content [%].
    pub fn lookup(&self, texture: TextureClass, organic_matter_percent: f64) -> Option<ReferenceEntry> {
        self.entries
            .get(&texture)?
            .get(&decile(organic_matter_percent))
            .copied()
    }
}

type Loaded<T> = OnceCell<Result<T, String>>;

#[derive(Default)]
struct SourceTables {
    principal: Loaded<PrincipalTable>,
    modifier: Loaded<ModifierTable>,
    capillary: Loaded<CapillaryRiseRates>,
}

/// Process-scoped store of reference tables, one set per data source identity.
///
/// Each table is read from its source at most once; a failed read is remembered
/// and reported on every later lookup. Loaded tables are never evicted.
#[derive(Default)]
pub struct ReferenceTableStore {
    slots: Mutex<HashMap<String, Arc<SourceTables>>>,
}

impl ReferenceTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the tables of `source`; nothing is read until the first lookup.
    pub fn tables(&self, source: Arc<dyn ReferenceSource>) -> ReferenceTables {
        let source_id = source.identity();
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(source_id.clone()).or_default())
        };
        ReferenceTables {
            slot,
            source,
            source_id,
        }
    }

    /// Identities of every source a handle was created for.
    pub fn known_sources(&self) -> Vec<String> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = slots.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// Lazily loaded reference tables of one data source.
///
/// Cheap to clone; all clones share the same load-once cells.
#[derive(Clone)]
pub struct ReferenceTables {
    slot: Arc<SourceTables>,
    source: Arc<dyn ReferenceSource>,
    source_id: String,
}

impl std::fmt::Debug for ReferenceTables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceTables")
            .field("source_id", &self.source_id)
            .field("principal_loaded", &self.slot.principal.get().is_some())
            .field("modifier_loaded", &self.slot.modifier.get().is_some())
            .finish()
    }
}

impl ReferenceTables {
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    fn load<'a, T>(
        &'a self,
        cell: &'a Loaded<T>,
        table: &'static str,
        read: impl FnOnce() -> Result<T, SoilError>,
        size: impl Fn(&T) -> usize,
    ) -> Result<&'a T, SoilError> {
        let outcome = cell.get_or_init(|| {
            let started = Instant::now();
            match read() {
                Ok(loaded) => {
                    info!(
                        source = %self.source_id,
                        table,
                        entries = size(&loaded),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "loaded reference table"
                    );
                    Ok(loaded)
                }
                Err(e) => {
                    warn!(source = %self.source_id, table, error = %e, "reference table load failed");
                    Err(e.into_message())
                }
            }
        });
        outcome.as_ref().map_err(|message| SoilError::DataSource {
            source_id: self.source_id.clone(),
            message: message.clone(),
        })
    }

    pub fn principal_table(&self) -> Result<&PrincipalTable, SoilError> {
        self.load(
            &self.slot.principal,
            "principal",
            || Ok(PrincipalTable::from_rows(&self.source.principal_rows()?)),
            PrincipalTable::len,
        )
    }

    pub fn modifier_table(&self) -> Result<&ModifierTable, SoilError> {
        self.load(
            &self.slot.modifier,
            "modifier",
            || Ok(ModifierTable::from_rows(&self.source.modifier_rows()?)),
            ModifierTable::len,
        )
    }

    pub fn capillary_rise_rates(&self) -> Result<&CapillaryRiseRates, SoilError> {
        self.load(
            &self.slot.capillary,
            "capillary",
            || Ok(CapillaryRiseRates::from_rows(&self.source.capillary_rows()?)),
            CapillaryRiseRates::len,
        )
    }

    /// Principal characteristics at a raw density [g cm-3]; `None` density selects peat rows.
    ///
    /// `Ok(None)` means the table has nothing for this texture.
    pub fn principal(
        &self,
        texture: TextureClass,
        raw_density: Option<f64>,
    ) -> Result<Option<ReferenceEntry>, SoilError> {
        let entry = self.principal_table()?.lookup(texture, raw_density);
        debug!(%texture, ?raw_density, found = entry.is_some(), "principal lookup");
        Ok(entry)
    }

    /// Organic matter modifier at an organic matter content [%].
    pub fn modifier(
        &self,
        texture: TextureClass,
        organic_matter_percent: f64,
    ) -> Result<Option<ReferenceEntry>, SoilError> {
        let entry = self.modifier_table()?.lookup(texture, organic_matter_percent);
        debug!(%texture, organic_matter_percent, found = entry.is_some(), "modifier lookup");
        Ok(entry)
    }

    /// Capillary rise rate [mm d-1] at a groundwater distance [dm].
    pub fn capillary_rate(
        &self,
        texture: TextureClass,
        distance_dm: u32,
    ) -> Result<Option<f64>, SoilError> {
        Ok(self.capillary_rise_rates()?.rate(texture, distance_dm))
    }
}
