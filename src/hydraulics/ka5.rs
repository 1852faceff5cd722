//! Field capacity, saturation and wilting point from the KA5 tables.
//!
//! Boundaries follow Wessolek, Kaupenjohann & Renger (2009), Bodenphysikalische
//! Kennwerte und Berechnungsverfahren für die Praxis, Tab. 4 and Tab. 5.

use tracing::{debug, warn};

use super::reference::{ReferenceEntry, ReferenceTables};
use super::Hydraulics;
use crate::error::SoilError;
use crate::models::TextureClass;

/// Lower and upper interpolation bound on one table axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket<T> {
    pub lower: T,
    pub upper: T,
}

impl<T: Copy> Bracket<T> {
    fn flat(value: T) -> Self {
        Self {
            lower: value,
            upper: value,
        }
    }
}

/// Raw density bounds [g cm-3]; peat has none.
pub fn density_bracket(texture: TextureClass, raw_density_g_cm3: f64) -> Bracket<Option<f64>> {
    if texture.is_peat() {
        return Bracket::flat(None);
    }
    let (lower, upper) = match raw_density_g_cm3 {
        d if d < 1.1 => (1.1, 1.1),
        d if d < 1.3 => (1.1, 1.3),
        d if d < 1.5 => (1.3, 1.5),
        d if d < 1.7 => (1.5, 1.7),
        d if d < 1.9 => (1.7, 1.9),
        _ => (1.9, 1.9),
    };
    Bracket {
        lower: Some(lower),
        upper: Some(upper),
    }
}

/// Organic matter bounds [%]. Modifiers are tabulated from 1.5 % upwards.
pub fn organic_matter_bracket(texture: TextureClass, organic_matter_percent: f64) -> Bracket<f64> {
    if texture.is_peat() {
        return Bracket::flat(0.0);
    }
    let (lower, upper) = match organic_matter_percent {
        om if om < 1.0 => (0.0, 0.0),
        om if om < 1.5 => (0.0, 1.5),
        om if om < 3.0 => (1.5, 3.0),
        om if om < 6.0 => (3.0, 6.0),
        om if om < 11.5 => (6.0, 11.5),
        _ => (11.5, 11.5),
    };
    Bracket { lower, upper }
}

/// Linear interpolation between two tabulated values.
///
/// A near-zero value on one side paired with a real value on the other is not
/// interpolated; the real value is taken instead.
fn interpolate(x: f64, axis: Bracket<f64>, lower: f64, upper: f64) -> f64 {
    if upper < 0.5 && lower >= 1.0 {
        lower
    } else if lower < 0.5 && upper >= 1.0 {
        upper
    } else if axis.upper != axis.lower {
        (x - axis.lower) / (axis.upper - axis.lower) * (upper - lower) + lower
    } else {
        lower
    }
}

fn interpolate_entry(
    x: f64,
    axis: Bracket<f64>,
    lower: ReferenceEntry,
    upper: ReferenceEntry,
) -> ReferenceEntry {
    ReferenceEntry {
        saturation: interpolate(x, axis, lower.saturation, upper.saturation),
        field_capacity: interpolate(x, axis, lower.field_capacity, upper.field_capacity),
        permanent_wilting_point: interpolate(
            x,
            axis,
            lower.permanent_wilting_point,
            upper.permanent_wilting_point,
        ),
    }
}

const ZERO: ReferenceEntry = ReferenceEntry {
    saturation: 0.0,
    field_capacity: 0.0,
    permanent_wilting_point: 0.0,
};

fn principal_at(
    tables: &ReferenceTables,
    texture: TextureClass,
    raw_density: Option<f64>,
) -> Result<ReferenceEntry, SoilError> {
    tables
        .principal(texture, raw_density)?
        .ok_or_else(|| SoilError::ReferenceDataMissing {
            texture: texture.to_string(),
            axis: "raw density",
            value: raw_density.map_or_else(|| "n/a".to_string(), |d| format!("{d} g cm-3")),
        })
}

fn modifier_at(
    tables: &ReferenceTables,
    texture: TextureClass,
    organic_matter_percent: f64,
) -> Result<ReferenceEntry, SoilError> {
    if organic_matter_percent == 0.0 {
        return Ok(ZERO);
    }
    match tables.modifier(texture, organic_matter_percent)? {
        Some(entry) => Ok(entry),
        None => {
            warn!(%texture, organic_matter_percent, "no organic matter modifier, assuming zero");
            Ok(ZERO)
        }
    }
}

/// Derive layer hydraulics [m3 m-3] for a texture at a raw density [g cm-3]
/// and organic matter content [%], reduced by the stone content [m3 m-3].
pub fn derive(
    tables: &ReferenceTables,
    texture: TextureClass,
    stone_content: f64,
    raw_density_g_cm3: f64,
    organic_matter_percent: f64,
) -> Result<Hydraulics, SoilError> {
    let density = density_bracket(texture, raw_density_g_cm3);
    let lower = principal_at(tables, texture, density.lower)?;
    let upper = principal_at(tables, texture, density.upper)?;
    let principal = match (density.lower, density.upper) {
        (Some(lb), Some(ub)) => interpolate_entry(
            raw_density_g_cm3,
            Bracket {
                lower: lb,
                upper: ub,
            },
            lower,
            upper,
        ),
        _ => lower,
    };

    let organic = organic_matter_bracket(texture, organic_matter_percent);
    let modifier = interpolate_entry(
        organic_matter_percent,
        organic,
        modifier_at(tables, texture, organic.lower)?,
        modifier_at(tables, texture, organic.upper)?,
    );

    let stone_factor = 1.0 - stone_content;
    let hydraulics = Hydraulics {
        saturation: (principal.saturation + modifier.saturation) / 100.0 * stone_factor,
        field_capacity: (principal.field_capacity + modifier.field_capacity) / 100.0 * stone_factor,
        permanent_wilting_point: (principal.permanent_wilting_point
            + modifier.permanent_wilting_point)
            / 100.0
            * stone_factor,
    };
    debug!(
        %texture,
        raw_density_g_cm3,
        organic_matter_percent,
        stone_content,
        saturation = hydraulics.saturation,
        field_capacity = hydraulics.field_capacity,
        permanent_wilting_point = hydraulics.permanent_wilting_point,
        "derived KA5 characteristics"
    );
    Ok(hydraulics)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::hydraulics::ReferenceTableStore;
    use crate::io::memory::fixtures;
    use crate::io::{MemorySource, ReferenceRow};
    use assert_approx_eq::assert_approx_eq;
    use proptest::prelude::*;

    fn fixture_tables() -> ReferenceTables {
        ReferenceTableStore::new().tables(Arc::new(fixtures::ka5_source("ka5")))
    }

    // --- Brackets ---

    #[test]
    fn test_density_brackets() {
        let b = |d| density_bracket(TextureClass::Ls3, d);
        assert_eq!(b(0.9), Bracket::flat(Some(1.1)));
        assert_eq!(b(1.1).lower, Some(1.1));
        assert_eq!(b(1.1).upper, Some(1.3));
        assert_eq!(b(1.4).lower, Some(1.3));
        assert_eq!(b(1.89).upper, Some(1.9));
        assert_eq!(b(1.9), Bracket::flat(Some(1.9)));
        assert_eq!(b(2.4), Bracket::flat(Some(1.9)));
    }

    #[test]
    fn test_peat_has_no_density_bounds() {
        assert_eq!(density_bracket(TextureClass::Hh, 0.3), Bracket::flat(None));
        assert_eq!(density_bracket(TextureClass::Hn, 1.4), Bracket::flat(None));
        assert_eq!(organic_matter_bracket(TextureClass::Hh, 40.0), Bracket::flat(0.0));
    }

    #[test]
    fn test_organic_matter_brackets() {
        let b = |om| organic_matter_bracket(TextureClass::Ls3, om);
        assert_eq!(b(0.5), Bracket::flat(0.0));
        assert_eq!(b(1.2), Bracket { lower: 0.0, upper: 1.5 });
        assert_eq!(b(2.0), Bracket { lower: 1.5, upper: 3.0 });
        assert_eq!(b(7.0), Bracket { lower: 6.0, upper: 11.5 });
        assert_eq!(b(20.0), Bracket::flat(11.5));
    }

    // --- Interpolation guard ---

    #[test]
    fn test_interpolate_midpoint() {
        let axis = Bracket { lower: 1.3, upper: 1.5 };
        assert_approx_eq!(interpolate(1.4, axis, 43.0, 37.0), 40.0, 1e-9);
    }

    #[test]
    fn test_guard_prefers_real_value() {
        let axis = Bracket { lower: 1.3, upper: 1.5 };
        assert_eq!(interpolate(1.4, axis, 20.0, 0.2), 20.0);
        assert_eq!(interpolate(1.4, axis, 0.2, 20.0), 20.0);
        assert_eq!(interpolate(1.4, Bracket::flat(1.9), 12.0, 12.0), 12.0);
    }

    // --- Derivation ---

    #[test]
    fn test_golden_ls3() {
        let h = derive(&fixture_tables(), TextureClass::Ls3, 0.1, 1.4, 2.0).unwrap();
        assert_approx_eq!(h.saturation, 0.39, 1e-6);
        assert_approx_eq!(h.field_capacity, 0.3015, 1e-6);
        assert_approx_eq!(h.permanent_wilting_point, 0.1455, 1e-6);
    }

    #[test]
    fn test_exact_grid_point_without_organic_matter() {
        let h = derive(&fixture_tables(), TextureClass::Ls3, 0.0, 1.3, 0.5).unwrap();
        assert_approx_eq!(h.saturation, 0.43, 1e-12);
        assert_approx_eq!(h.field_capacity, 0.33, 1e-12);
        assert_approx_eq!(h.permanent_wilting_point, 0.16, 1e-12);
    }

    #[test]
    fn test_low_density_clamps_to_first_row() {
        let h = derive(&fixture_tables(), TextureClass::Ls3, 0.0, 0.8, 0.0).unwrap();
        assert_approx_eq!(h.field_capacity, 0.36, 1e-12);
    }

    #[test]
    fn test_high_organic_matter_uses_last_modifier() {
        let h = derive(&fixture_tables(), TextureClass::Ls3, 0.0, 1.3, 15.0).unwrap();
        // 33 + 11
        assert_approx_eq!(h.field_capacity, 0.44, 1e-12);
    }

    #[test]
    fn test_stone_content_scales_linearly() {
        let tables = fixture_tables();
        let none = derive(&tables, TextureClass::Ls3, 0.0, 1.4, 2.0).unwrap();
        let half = derive(&tables, TextureClass::Ls3, 0.5, 1.4, 2.0).unwrap();
        assert_approx_eq!(half.saturation, none.saturation * 0.5, 1e-12);
        assert_approx_eq!(half.field_capacity, none.field_capacity * 0.5, 1e-12);
        assert_approx_eq!(
            half.permanent_wilting_point,
            none.permanent_wilting_point * 0.5,
            1e-12
        );
    }

    #[test]
    fn test_peat_uses_density_free_row() {
        let h = derive(&fixture_tables(), TextureClass::Hh, 0.0, 0.2, 60.0).unwrap();
        assert_approx_eq!(h.saturation, 0.70, 1e-12);
        assert_approx_eq!(h.field_capacity, 0.60, 1e-12);
        assert_approx_eq!(h.permanent_wilting_point, 0.25, 1e-12);
    }

    #[test]
    fn test_missing_modifier_counts_as_zero() {
        // Ts4 has principal rows but no modifier rows
        let h = derive(&fixture_tables(), TextureClass::Ts4, 0.0, 1.5, 4.0).unwrap();
        assert_approx_eq!(h.field_capacity, 0.24, 1e-12);
    }

    #[test]
    fn test_missing_principal_is_an_error() {
        let err = derive(&fixture_tables(), TextureClass::Tt, 0.0, 1.4, 2.0).unwrap_err();
        match err {
            SoilError::ReferenceDataMissing { texture, axis, .. } => {
                assert_eq!(texture, "Tt");
                assert_eq!(axis, "raw density");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_near_zero_row_is_skipped_by_guard() {
        let row = |axis, ac, fc, nfc| ReferenceRow {
            texture: "Ss".to_string(),
            axis: Some(axis),
            air_capacity: ac,
            field_capacity: fc,
            n_field_capacity: nfc,
        };
        let source = MemorySource::new("guard")
            .with_principal_rows(vec![row(1.3, 0.1, 0.3, 0.1), row(1.5, 5.0, 20.0, 10.0)]);
        let tables = ReferenceTableStore::new().tables(Arc::new(source));
        let h = derive(&tables, TextureClass::Ss, 0.0, 1.31, 0.0).unwrap();
        assert_approx_eq!(h.saturation, 0.25, 1e-12);
        assert_approx_eq!(h.field_capacity, 0.20, 1e-12);
        assert_approx_eq!(h.permanent_wilting_point, 0.10, 1e-12);
    }

    #[test]
    fn test_source_failure_propagates() {
        let tables =
            ReferenceTableStore::new().tables(Arc::new(MemorySource::new("x").failing("gone")));
        let err = derive(&tables, TextureClass::Ls3, 0.0, 1.4, 2.0).unwrap_err();
        assert!(matches!(err, SoilError::DataSource { .. }));
    }

    proptest! {
        #[test]
        fn prop_ordered_fractions(
            density in 0.8f64..2.3,
            organic_matter in 0.0f64..20.0,
            stone in 0.0f64..0.9,
        ) {
            let h = derive(&fixture_tables(), TextureClass::Ls3, stone, density, organic_matter).unwrap();
            prop_assert!(h.permanent_wilting_point >= 0.0);
            prop_assert!(h.permanent_wilting_point <= h.field_capacity);
            prop_assert!(h.field_capacity <= h.saturation);
            prop_assert!(h.saturation <= 1.0);
        }

        #[test]
        fn prop_field_capacity_linear_within_density_bracket(
            lower in prop::sample::select(vec![1.1, 1.3, 1.5, 1.7]),
            t1 in 0.0f64..1.0,
            t2 in 0.0f64..1.0,
        ) {
            let tables = fixture_tables();
            let upper = lower + 0.2;
            let endpoint = |d: f64| {
                tables
                    .principal(TextureClass::Ls3, Some(d))
                    .unwrap()
                    .unwrap()
                    .field_capacity
                    / 100.0
            };
            let (at_lower, at_upper) = (endpoint(lower), endpoint(upper));
            let fc = |d: f64| {
                derive(&tables, TextureClass::Ls3, 0.0, d, 0.5)
                    .unwrap()
                    .field_capacity
            };

            let (d1, d2) = if t1 <= t2 {
                (lower + t1 * 0.2, lower + t2 * 0.2)
            } else {
                (lower + t2 * 0.2, lower + t1 * 0.2)
            };
            let (fc1, fc2) = (fc(d1), fc(d2));
            let (min, max) = (at_lower.min(at_upper), at_lower.max(at_upper));
            for value in [fc1, fc2] {
                prop_assert!(value >= min - 1e-12 && value <= max + 1e-12);
            }
            if at_upper < at_lower {
                prop_assert!(fc2 <= fc1 + 1e-12);
            } else {
                prop_assert!(fc2 >= fc1 - 1e-12);
            }
            prop_assert!((fc(lower + 0.1) - (at_lower + at_upper) / 2.0).abs() < 1e-9);
        }

        #[test]
        fn prop_deterministic(density in 1.0f64..2.0, organic_matter in 0.0f64..12.0) {
            let tables = fixture_tables();
            let a = derive(&tables, TextureClass::Sl2, 0.0, density, organic_matter).unwrap();
            let b = derive(&tables, TextureClass::Sl2, 0.0, density, organic_matter).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
