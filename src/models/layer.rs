use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::horizon::{Density, OrganicContent};
use super::texture::TextureClass;
use crate::error::SoilError;

/// One fixed-thickness layer of a discretized soil profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilLayer {
    /// Layer thickness [m]
    pub thickness_m: f64,
    pub texture: Option<TextureClass>,
    /// Sand content [kg kg-1]
    pub sand: Option<f64>,
    /// Clay content [kg kg-1]
    pub clay: Option<f64>,
    pub organic: Option<OrganicContent>,
    pub density: Option<Density>,
    /// Stone content [m3 m-3]
    pub stone_content: f64,
    pub ph: f64,
    /// Saturation / pore volume [m3 m-3]
    pub saturation: Option<f64>,
    /// [m3 m-3]
    pub field_capacity: Option<f64>,
    /// [m3 m-3]
    pub permanent_wilting_point: Option<f64>,
    /// Soil water conductivity coefficient
    pub lambda: Option<f64>,
    /// [kg NH4-N m-3]
    pub ammonium: f64,
    /// [kg NO3-N m-3]
    pub nitrate: f64,
    pub cn_ratio: f64,
    /// Initial soil moisture [% of field capacity]
    pub moisture_percent_fc: f64,
}

impl Default for SoilLayer {
    fn default() -> Self {
        Self {
            thickness_m: 0.1,
            texture: None,
            sand: None,
            clay: None,
            organic: None,
            density: None,
            stone_content: 0.0,
            ph: 6.9,
            saturation: None,
            field_capacity: None,
            permanent_wilting_point: None,
            lambda: None,
            ammonium: 0.0005,
            nitrate: 0.005,
            cn_ratio: 10.0,
            moisture_percent_fc: 100.0,
        }
    }
}

fn is_fraction(x: f64) -> bool {
    (0.0..=1.0).contains(&x)
}

impl SoilLayer {
    /// Silt content [kg kg-1], `1 - sand - clay`.
    pub fn silt(&self) -> Option<f64> {
        Some(1.0 - self.sand? - self.clay?)
    }

    /// [kg C kg-1]
    pub fn organic_carbon(&self) -> Option<f64> {
        self.organic.map(|o| o.carbon())
    }

    /// [kg OM kg-1]
    pub fn organic_matter(&self) -> Option<f64> {
        self.organic.map(|o| o.matter())
    }

    /// [kg m-3]
    pub fn raw_density(&self) -> Option<f64> {
        self.density.map(|d| d.raw(self.clay.unwrap_or(0.0)))
    }

    /// [kg m-3]
    pub fn bulk_density(&self) -> Option<f64> {
        self.density.map(|d| d.bulk(self.clay.unwrap_or(0.0)))
    }

    /// Names of every field that makes this layer unusable for a water balance.
    pub fn invalid_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        let mut check = |name: &'static str, ok: bool| {
            if !ok {
                fields.push(name);
            }
        };

        check("field_capacity", self.field_capacity.is_some_and(is_fraction));
        check("saturation", self.saturation.is_some_and(is_fraction));
        check(
            "permanent_wilting_point",
            self.permanent_wilting_point.is_some_and(is_fraction),
        );
        check("sand", self.sand.is_some_and(is_fraction));
        check("clay", self.clay.is_some_and(is_fraction));
        check("ph", self.ph >= 0.0);
        check("stone_content", is_fraction(self.stone_content));
        check("organic_carbon", self.organic_carbon().is_some_and(is_fraction));
        check("raw_density", self.raw_density().is_some_and(|d| d >= 0.0));

        fields
    }

    pub fn is_valid(&self) -> bool {
        self.invalid_fields().is_empty()
    }

    /// Check the layer, reporting all failing fields at once.
    pub fn validate(&self) -> Result<(), SoilError> {
        let fields = self.invalid_fields();
        if fields.is_empty() {
            return Ok(());
        }
        Err(SoilError::InvalidLayer {
            fields,
            context: self.describe(),
        })
    }

    fn describe(&self) -> String {
        let texture = self
            .texture
            .map(|t| t.to_string())
            .unwrap_or_else(|| "none".to_string());
        let density = self
            .raw_density()
            .map(|d| format!("{d} kg m-3"))
            .unwrap_or_else(|| "none".to_string());
        format!("texture {texture}, raw density {density}")
    }

    /// Exchange representation keyed like the MONICA soil parameter objects.
    ///
    /// With `with_units`, every dimensioned value becomes a `[value, "unit"]` pair.
    pub fn to_json(&self, with_units: bool) -> Value {
        let tag = |value: f64, unit: &str| -> Value {
            if with_units {
                json!([value, unit])
            } else {
                json!(value)
            }
        };

        let mut obj = Map::new();
        obj.insert("type".into(), json!("SoilParameters"));
        obj.insert("Thickness".into(), tag(self.thickness_m, "m"));
        if let Some(texture) = self.texture {
            obj.insert("KA5TextureClass".into(), json!(texture.code()));
        }
        if let Some(sand) = self.sand {
            obj.insert("Sand".into(), tag(sand, "% [0-1]"));
        }
        if let Some(clay) = self.clay {
            obj.insert("Clay".into(), tag(clay, "% [0-1]"));
        }
        if let Some(silt) = self.silt() {
            obj.insert("Silt".into(), tag(silt, "% [0-1]"));
        }
        obj.insert("pH".into(), json!(self.ph));
        obj.insert("Sceleton".into(), tag(self.stone_content, "vol% [0-1]"));
        if let Some(soc) = self.organic_carbon() {
            obj.insert("SoilOrganicCarbon".into(), tag(soc, "mass% [0-1]"));
        }
        if let Some(som) = self.organic_matter() {
            obj.insert("SoilOrganicMatter".into(), tag(som, "mass% [0-1]"));
        }
        if let Some(raw) = self.raw_density() {
            obj.insert("SoilRawDensity".into(), tag(raw, "kg m-3"));
        }
        if let Some(bulk) = self.bulk_density() {
            obj.insert("SoilBulkDensity".into(), tag(bulk, "kg m-3"));
        }
        if let Some(fc) = self.field_capacity {
            obj.insert("FieldCapacity".into(), tag(fc, "vol% [0-1]"));
        }
        if let Some(sat) = self.saturation {
            obj.insert("PoreVolume".into(), tag(sat, "vol% [0-1]"));
        }
        if let Some(pwp) = self.permanent_wilting_point {
            obj.insert("PermanentWiltingPoint".into(), tag(pwp, "vol% [0-1]"));
        }
        if let Some(lambda) = self.lambda {
            obj.insert("Lambda".into(), json!(lambda));
        }
        obj.insert("SoilAmmonium".into(), tag(self.ammonium, "kg NH4-N m-3"));
        obj.insert("SoilNitrate".into(), tag(self.nitrate, "kg NO3-N m-3"));
        obj.insert("CN".into(), json!(self.cn_ratio));
        obj.insert(
            "SoilMoisturePercentFC".into(),
            tag(self.moisture_percent_fc, "% [0-100]"),
        );
        Value::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_layer() -> SoilLayer {
        SoilLayer {
            texture: Some(TextureClass::Ls3),
            sand: Some(0.44),
            clay: Some(0.21),
            organic: Some(OrganicContent::Carbon(0.0114)),
            density: Some(Density::Raw(1400.0)),
            saturation: Some(0.39),
            field_capacity: Some(0.3015),
            permanent_wilting_point: Some(0.1455),
            lambda: Some(0.3),
            ..SoilLayer::default()
        }
    }

    #[test]
    fn test_valid_layer_passes() {
        let layer = valid_layer();
        assert!(layer.is_valid());
        assert!(layer.validate().is_ok());
    }

    #[test]
    fn test_silt_is_remainder() {
        let layer = valid_layer();
        assert!((layer.silt().unwrap() - 0.35).abs() < 1e-12);
        let no_clay = SoilLayer {
            clay: None,
            ..valid_layer()
        };
        assert!(no_clay.silt().is_none());
    }

    #[test]
    fn test_missing_hydraulics_reported_together() {
        let layer = SoilLayer {
            saturation: None,
            field_capacity: None,
            permanent_wilting_point: None,
            ..valid_layer()
        };
        assert_eq!(
            layer.invalid_fields(),
            vec!["field_capacity", "saturation", "permanent_wilting_point"]
        );
    }

    #[test]
    fn test_missing_organic_and_density() {
        let layer = SoilLayer {
            organic: None,
            density: None,
            ..valid_layer()
        };
        let err = layer.validate().unwrap_err();
        match err {
            SoilError::InvalidLayer { fields, context } => {
                assert_eq!(fields, vec!["organic_carbon", "raw_density"]);
                assert!(context.contains("Ls3"));
                assert!(context.contains("raw density none"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_negative_values_are_not_clamped() {
        let layer = SoilLayer {
            ph: -1.0,
            stone_content: -0.1,
            ..valid_layer()
        };
        assert_eq!(layer.invalid_fields(), vec!["ph", "stone_content"]);
        assert_eq!(layer.ph, -1.0);
    }

    #[test]
    fn test_fractions_above_one_are_invalid() {
        let layer = SoilLayer {
            saturation: Some(1.2),
            ..valid_layer()
        };
        assert_eq!(layer.invalid_fields(), vec!["saturation"]);
    }

    #[test]
    fn test_json_with_units() {
        let json = valid_layer().to_json(true);
        assert_eq!(json["KA5TextureClass"], "Ls3");
        assert_eq!(json["Thickness"][1], "m");
        assert_eq!(json["SoilRawDensity"][0], 1400.0);
        assert_eq!(json["SoilRawDensity"][1], "kg m-3");
        assert_eq!(json["FieldCapacity"][1], "vol% [0-1]");
        assert_eq!(json["pH"], 6.9);
    }

    #[test]
    fn test_json_without_units() {
        let json = valid_layer().to_json(false);
        assert_eq!(json["Thickness"], 0.1);
        assert_eq!(json["Sand"], 0.44);
        assert!(json.get("Lambda").is_some());
    }

    #[test]
    fn test_json_omits_unset_values() {
        let json = SoilLayer::default().to_json(true);
        assert!(json.get("FieldCapacity").is_none());
        assert!(json.get("KA5TextureClass").is_none());
        assert!(json.get("SoilAmmonium").is_some());
    }
}
