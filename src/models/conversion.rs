use crate::error::SoilError;

/// Converts soil organic matter to organic carbon [kg C kg-1 OM].
pub const SOM_TO_C: f64 = 0.57;

/// Bulk density offset per unit clay fraction [kg m-3].
const BULK_DENSITY_CLAY_OFFSET: f64 = 900.0;

pub fn organic_matter_to_carbon(organic_matter: f64) -> f64 {
    organic_matter * SOM_TO_C
}

pub fn organic_carbon_to_matter(organic_carbon: f64) -> f64 {
    organic_carbon / SOM_TO_C
}

/// Raw density [kg m-3] to bulk density [kg m-3] for a clay mass fraction.
pub fn raw_to_bulk_density(raw_density: f64, clay: f64) -> f64 {
    raw_density + BULK_DENSITY_CLAY_OFFSET * clay
}

/// Bulk density [kg m-3] to raw density [kg m-3] for a clay mass fraction.
pub fn bulk_to_raw_density(bulk_density: f64, clay: f64) -> f64 {
    bulk_density - BULK_DENSITY_CLAY_OFFSET * clay
}

/// Rough soil water conductivity coefficient from texture.
pub fn sand_and_clay_to_lambda(sand: f64, clay: f64) -> f64 {
    (2.0 * (sand * sand * 0.575)) + (clay * 0.1) + ((1.0 - sand - clay) * 0.35)
}

/// Organic carbon [mass %] for a KA5 humus class (h0..h7).
pub fn humus_class_to_organic_carbon(humus_class: u8) -> Result<f64, SoilError> {
    let corg = match humus_class {
        0 => 0.0,
        1 => 0.5 / 1.72,
        2 => 1.5 / 1.72,
        3 => 3.0 / 1.72,
        4 => 6.0 / 1.72,
        5 => 11.5 / 2.0,
        6 => 17.5 / 2.0,
        7 => 30.0 / 2.0,
        other => {
            return Err(SoilError::Parse(format!(
                "Unknown humus class: {other}"
            )))
        }
    };
    Ok(corg)
}

/// Approximate raw density [kg m-3] for a KA5 effective bulk density class (Ld1..Ld5).
pub fn bulk_density_class_to_raw_density(class: u8, clay: f64) -> Result<f64, SoilError> {
    let effective = match class {
        1 => 1.3,
        2 => 1.5,
        3 => 1.7,
        4 => 1.9,
        5 => 2.1,
        other => {
            return Err(SoilError::Parse(format!(
                "Unknown bulk density class: {other}"
            )))
        }
    };
    // g cm-3 -> kg m-3
    Ok((effective - 0.9 * clay) * 1000.0)
}
