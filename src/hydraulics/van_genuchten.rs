//! Pedotransfer functions for layers without a usable KA5 texture.

use super::Hydraulics;

/// pF at field capacity as defined by KA5, shifted for sandy and clayey soils.
pub fn field_capacity_pf(sand: f64, clay: f64) -> f64 {
    if sand > 0.48 && sand <= 0.9 && clay <= 0.12 {
        2.1 - 0.476 * (sand - 0.48)
    } else if sand > 0.9 && clay <= 0.05 {
        1.9
    } else if clay > 0.45 {
        2.5
    } else if clay > 0.30 && sand < 0.2 {
        2.4
    } else if clay > 0.35 || (clay > 0.25 && sand < 0.1) {
        2.3
    } else if (clay > 0.17 && (sand > 0.68 || sand < 0.33))
        || (clay > 0.08 && sand < 0.27)
        || (clay > 0.25 && sand < 0.25)
    {
        2.2
    } else {
        2.1
    }
}

/// Derive hydraulics [m3 m-3] from sand, clay and organic carbon [kg kg-1],
/// stone content [m3 m-3] and bulk density [kg m-3].
///
/// The wilting point and saturation bound the retention curve; field capacity
/// is read off the curve at the KA5 field capacity pF.
pub fn derive(
    sand: f64,
    clay: f64,
    stone_content: f64,
    bulk_density_kg_m3: f64,
    organic_carbon: f64,
) -> Hydraulics {
    let stone_factor = 1.0 - stone_content;
    let bulk_density = bulk_density_kg_m3 / 1000.0;

    let theta_r = (0.015 + 0.5 * clay + 1.4 * organic_carbon) * stone_factor;
    let theta_s = (0.81 - 0.283 * bulk_density + 0.1 * clay) * stone_factor;

    let alpha = (-2.486 + 2.5 * sand - 35.1 * organic_carbon - 2.617 * bulk_density
        - 2.3 * clay)
        .exp();
    let n = (0.053 - 0.9 * sand - 1.3 * clay + 1.5 * sand.powi(2)).exp();
    let m = 1.0;

    let matric_head = 10f64.powf(field_capacity_pf(sand, clay));
    let field_capacity = (theta_r
        + (theta_s - theta_r) / (1.0 + (alpha * matric_head).powf(n)).powf(m))
        * stone_factor;

    Hydraulics {
        saturation: theta_s,
        field_capacity,
        permanent_wilting_point: theta_r,
    }
}
