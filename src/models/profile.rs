use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::horizon::ProfileId;
use super::layer::SoilLayer;

/// A soil profile rediscretized into layers of equal thickness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilProfile {
    pub id: ProfileId,
    pub layer_thickness_cm: u32,
    pub layers: Vec<SoilLayer>,
}

impl SoilProfile {
    pub fn new(id: ProfileId, layer_thickness_cm: u32, layers: Vec<SoilLayer>) -> Self {
        Self {
            id,
            layer_thickness_cm,
            layers,
        }
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Total depth [m], the sum of all layer thicknesses.
    pub fn total_depth_m(&self) -> f64 {
        self.layers.iter().map(|l| l.thickness_m).sum()
    }

    /// KA5 codes of the profile from top to bottom, e.g. `"Sl2|Ls3|Ts4"`.
    ///
    /// Consecutive layers cut from the same horizon share a texture and appear once.
    pub fn texture_summary(&self) -> String {
        let mut codes: Vec<&str> = Vec::new();
        for layer in &self.layers {
            let code = layer.texture.map(|t| t.code()).unwrap_or("?");
            if codes.last() != Some(&code) {
                codes.push(code);
            }
        }
        codes.join("|")
    }

    /// Plant-available water capacity of the whole profile [mm].
    pub fn available_water_mm(&self) -> f64 {
        self.layers
            .iter()
            .filter_map(|l| {
                let fc = l.field_capacity?;
                let pwp = l.permanent_wilting_point?;
                Some((fc - pwp) * l.thickness_m * 1000.0)
            })
            .sum()
    }

    pub fn to_json(&self, with_units: bool) -> Value {
        Value::Array(self.layers.iter().map(|l| l.to_json(with_units)).collect())
    }
}
