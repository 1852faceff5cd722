use std::collections::{BTreeMap, HashMap};

use tracing::warn;

use crate::io::CapillaryRow;
use crate::models::TextureClass;

/// Capillary rise rates [mm d-1] by texture and distance to groundwater [dm].
#[derive(Debug, Default)]
pub struct CapillaryRiseRates {
    rates: HashMap<TextureClass, BTreeMap<u32, f64>>,
}

impl CapillaryRiseRates {
    pub fn from_rows(rows: &[CapillaryRow]) -> Self {
        let mut rates: HashMap<TextureClass, BTreeMap<u32, f64>> = HashMap::new();
        for row in rows {
            match row.texture.parse::<TextureClass>() {
                Ok(texture) => {
                    rates.entry(texture).or_default().insert(row.distance, row.rate);
                }
                Err(_) => {
                    warn!(texture = %row.texture, "skipping capillary rise row with unknown texture")
                }
            }
        }
        Self { rates }
    }

    pub fn rate(&self, texture: TextureClass, distance_dm: u32) -> Option<f64> {
        self.rates.get(&texture)?.get(&distance_dm).copied()
    }

    /// All tabulated distances of one texture.
    pub fn rates(&self, texture: TextureClass) -> Option<&BTreeMap<u32, f64>> {
        self.rates.get(&texture)
    }

    pub fn len(&self) -> usize {
        self.rates.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}
