//! Water characteristics of soil layers.

mod capillary;
pub mod ka5;
mod reference;
pub mod van_genuchten;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SoilError;

pub use capillary::CapillaryRiseRates;
pub use reference::{
    ModifierTable, PrincipalTable, ReferenceEntry, ReferenceTableStore, ReferenceTables,
};

/// Saturation, field capacity and permanent wilting point, all in [m3 m-3].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hydraulics {
    pub saturation: f64,
    pub field_capacity: f64,
    pub permanent_wilting_point: f64,
}

impl Hydraulics {
    /// Plant-available water [m3 m-3].
    pub fn available_water(&self) -> f64 {
        self.field_capacity - self.permanent_wilting_point
    }
}

/// How layer hydraulics are derived when none were measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HydraulicMethod {
    /// Interpolation in the KA5 reference tables
    #[default]
    Ka5,
    /// Van Genuchten pedotransfer functions from sand, clay, carbon and density
    VanGenuchten,
}

impl fmt::Display for HydraulicMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HydraulicMethod::Ka5 => write!(f, "ka5"),
            HydraulicMethod::VanGenuchten => write!(f, "van_genuchten"),
        }
    }
}

impl FromStr for HydraulicMethod {
    type Err = SoilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ka5" => Ok(HydraulicMethod::Ka5),
            "van_genuchten" | "van-genuchten" | "vg" => Ok(HydraulicMethod::VanGenuchten),
            other => Err(SoilError::Parse(format!(
                "unknown hydraulic method '{other}', expected ka5 or van_genuchten"
            ))),
        }
    }
}
