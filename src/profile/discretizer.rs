use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SoilError;
use crate::hydraulics::{ka5, van_genuchten, HydraulicMethod, Hydraulics, ReferenceTables};
use crate::io::HorizonSource;
use crate::models::conversion::sand_and_clay_to_lambda;
use crate::models::{
    classify, declassify, HorizonRecord, ProfileId, SoilLayer, SoilProfile, TextureClass,
};

const DEFAULT_PH: f64 = 6.9;

/// How horizons are cut into layers and how their hydraulics are derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerSettings {
    pub layer_thickness_cm: u32,
    pub max_depth_cm: u32,
    #[serde(default)]
    pub method: HydraulicMethod,
}

impl Default for LayerSettings {
    fn default() -> Self {
        Self {
            layer_thickness_cm: 10,
            max_depth_cm: 200,
            method: HydraulicMethod::Ka5,
        }
    }
}

impl LayerSettings {
    pub fn validate(&self) -> Result<(), SoilError> {
        if self.layer_thickness_cm == 0 {
            return Err(SoilError::Config(
                "layer_thickness_cm must be greater than zero".to_string(),
            ));
        }
        if self.max_depth_cm < self.layer_thickness_cm {
            return Err(SoilError::Config(format!(
                "max_depth_cm ({}) must be at least layer_thickness_cm ({})",
                self.max_depth_cm, self.layer_thickness_cm
            )));
        }
        Ok(())
    }

    /// Number of layers in every discretized profile.
    pub fn max_layers(&self) -> usize {
        (self.max_depth_cm / self.layer_thickness_cm) as usize
    }

    pub fn layer_thickness_m(&self) -> f64 {
        f64::from(self.layer_thickness_cm) / 100.0
    }
}

fn resolve_texture(horizon: &HorizonRecord) -> Result<Option<TextureClass>, SoilError> {
    match (&horizon.texture, horizon.sand, horizon.clay) {
        (Some(code), _, _) => Ok(Some(code.parse()?)),
        (None, Some(sand), Some(clay)) => Ok(Some(classify(sand, clay)?)),
        _ => Ok(None),
    }
}

fn derive_hydraulics(
    layer: &SoilLayer,
    method: HydraulicMethod,
    tables: &ReferenceTables,
) -> Result<Option<Hydraulics>, SoilError> {
    let (Some(organic), Some(raw_density), Some(bulk_density)) =
        (layer.organic, layer.raw_density(), layer.bulk_density())
    else {
        return Ok(None);
    };

    match method {
        HydraulicMethod::Ka5 => {
            let Some(texture) = layer.texture else {
                return Ok(None);
            };
            ka5::derive(
                tables,
                texture,
                layer.stone_content,
                raw_density / 1000.0,
                organic.matter() * 100.0,
            )
            .map(Some)
        }
        HydraulicMethod::VanGenuchten => {
            let (Some(sand), Some(clay)) = (layer.sand, layer.clay) else {
                return Ok(None);
            };
            Ok(Some(van_genuchten::derive(
                sand,
                clay,
                layer.stone_content,
                bulk_density,
                organic.carbon(),
            )))
        }
    }
}

/// Build one validated layer from a horizon.
///
/// Measured hydraulics win over derived ones. A texture code that does not
/// parse, or a sand/clay pair that cannot be classified, fails the layer.
pub fn build_layer(
    horizon: &HorizonRecord,
    thickness_m: f64,
    settings: &LayerSettings,
    tables: &ReferenceTables,
) -> Result<SoilLayer, SoilError> {
    let texture = resolve_texture(horizon)?;
    let representative = texture.map(declassify);

    let mut layer = SoilLayer {
        thickness_m,
        texture,
        sand: horizon.sand.or(representative.map(|r| r.sand)),
        clay: horizon.clay.or(representative.map(|r| r.clay)),
        organic: horizon.organic,
        density: horizon.density,
        stone_content: horizon.stone_content.unwrap_or(0.0),
        ph: horizon.ph.unwrap_or(DEFAULT_PH),
        ..SoilLayer::default()
    };

    let measured_lambda = horizon.hydraulics.and_then(|m| m.lambda);
    let hydraulics = match horizon.hydraulics {
        Some(measured) => Some(Hydraulics {
            saturation: measured.saturation,
            field_capacity: measured.field_capacity,
            permanent_wilting_point: measured.permanent_wilting_point,
        }),
        None => derive_hydraulics(&layer, settings.method, tables)?,
    };
    if let Some(h) = hydraulics {
        layer.saturation = Some(h.saturation);
        layer.field_capacity = Some(h.field_capacity);
        layer.permanent_wilting_point = Some(h.permanent_wilting_point);
    }
    layer.lambda = measured_lambda.or_else(|| match (layer.sand, layer.clay) {
        (Some(sand), Some(clay)) => Some(sand_and_clay_to_lambda(sand, clay)),
        _ => None,
    });

    layer.validate()?;
    Ok(layer)
}

/// Cut ordered horizons into layers of the configured thickness.
///
/// Every horizon covers the layers down to its lower depth; the last one is
/// extended to the maximum depth and nothing is emitted below it.
pub fn discretize(
    horizons: &[HorizonRecord],
    settings: &LayerSettings,
    tables: &ReferenceTables,
) -> Result<Vec<SoilLayer>, SoilError> {
    settings.validate()?;
    let max_layers = settings.max_layers();
    let thickness_cm = f64::from(settings.layer_thickness_cm);
    let mut layers: Vec<SoilLayer> = Vec::with_capacity(max_layers);

    for (index, horizon) in horizons.iter().enumerate() {
        if layers.len() >= max_layers {
            break;
        }
        let top = layers.len() as f64 * thickness_cm;
        let lower = horizon
            .lower_depth_cm
            .unwrap_or(f64::from(settings.max_depth_cm));
        let size = (lower - top).max(0.0);
        let mut count = (size / thickness_cm).round() as usize;
        if index + 1 == horizons.len() && count < max_layers - layers.len() {
            count = max_layers - layers.len();
        }
        count = count.min(max_layers - layers.len());
        if count == 0 {
            debug!(horizon = index, lower, "horizon covers no layer");
            continue;
        }

        let layer = build_layer(horizon, settings.layer_thickness_m(), settings, tables)?;
        debug!(
            horizon = index,
            count,
            texture = ?layer.texture,
            field_capacity = ?layer.field_capacity,
            "emitting layers"
        );
        layers.extend(std::iter::repeat(layer).take(count));
    }

    Ok(layers)
}

/// Load and discretize a single profile directly from a source, bypassing any cache.
pub fn load_profile(
    source: &dyn HorizonSource,
    id: ProfileId,
    settings: &LayerSettings,
    tables: &ReferenceTables,
) -> Result<SoilProfile, SoilError> {
    let horizons = source.load_profile(id)?;
    if horizons.is_empty() {
        return Err(SoilError::ProfileNotFound {
            source_id: source.identity(),
            profile_id: id,
        });
    }
    let layers = discretize(&horizons, settings, tables)?;
    Ok(SoilProfile::new(id, settings.layer_thickness_cm, layers))
}
