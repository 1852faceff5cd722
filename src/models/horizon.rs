use serde::{Deserialize, Serialize};

use super::conversion::{
    bulk_to_raw_density, organic_carbon_to_matter, organic_matter_to_carbon, raw_to_bulk_density,
};

/// Identifier of a soil profile within a data source.
pub type ProfileId = i64;

/// Organic content of a horizon; whichever quantity was measured is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OrganicContent {
    /// Soil organic carbon [kg C kg-1]
    Carbon(f64),
    /// Soil organic matter [kg OM kg-1]
    Matter(f64),
}

impl OrganicContent {
    pub fn carbon(&self) -> f64 {
        match *self {
            OrganicContent::Carbon(c) => c,
            OrganicContent::Matter(m) => organic_matter_to_carbon(m),
        }
    }

    pub fn matter(&self) -> f64 {
        match *self {
            OrganicContent::Carbon(c) => organic_carbon_to_matter(c),
            OrganicContent::Matter(m) => m,
        }
    }
}

/// Soil density of a horizon; whichever quantity was measured is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Density {
    /// Raw density [kg m-3]
    Raw(f64),
    /// Bulk density [kg m-3]
    Bulk(f64),
}

impl Density {
    pub fn raw(&self, clay: f64) -> f64 {
        match *self {
            Density::Raw(r) => r,
            Density::Bulk(b) => bulk_to_raw_density(b, clay),
        }
    }

    pub fn bulk(&self, clay: f64) -> f64 {
        match *self {
            Density::Raw(r) => raw_to_bulk_density(r, clay),
            Density::Bulk(b) => b,
        }
    }
}

/// Hydraulic values measured in the field or lab; they take precedence over derivation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasuredHydraulics {
    /// [m3 m-3]
    pub saturation: f64,
    /// [m3 m-3]
    pub field_capacity: f64,
    /// [m3 m-3]
    pub permanent_wilting_point: f64,
    pub lambda: Option<f64>,
}

/// One recorded soil horizon as delivered by a data source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HorizonRecord {
    /// Upper depth [cm], informational
    pub upper_depth_cm: Option<f64>,
    /// Lower depth [cm]; `None` for an open-ended last horizon
    pub lower_depth_cm: Option<f64>,
    /// KA5 texture code as stored in the source
    pub texture: Option<String>,
    /// Sand content [kg kg-1]
    pub sand: Option<f64>,
    /// Clay content [kg kg-1]
    pub clay: Option<f64>,
    pub organic: Option<OrganicContent>,
    pub density: Option<Density>,
    pub ph: Option<f64>,
    /// Stone content [m3 m-3]
    pub stone_content: Option<f64>,
    pub hydraulics: Option<MeasuredHydraulics>,
}

impl HorizonRecord {
    /// Horizon that reaches down to `lower_depth_cm` with the given texture code.
    pub fn with_texture(lower_depth_cm: Option<f64>, texture: impl Into<String>) -> Self {
        Self {
            lower_depth_cm,
            texture: Some(texture.into()),
            ..Self::default()
        }
    }
}
