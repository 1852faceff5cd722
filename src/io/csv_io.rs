use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::SoilError;
use crate::models::conversion::{bulk_density_class_to_raw_density, humus_class_to_organic_carbon};
use crate::models::{
    Density, HorizonRecord, MeasuredHydraulics, OrganicContent, ProfileId, SoilProfile,
};

use super::{group_by_profile, CapillaryRow, HorizonSource, ReferenceRow, ReferenceSource};

/// CSV row structure for horizon data, values in percent as stored by soil databases.
#[derive(Debug, serde::Deserialize)]
struct HorizonRow {
    id: ProfileId,
    upper_depth_cm: Option<f64>,
    layer_depth_cm: Option<f64>,
    soil_type: Option<String>,
    sand_content_percent: Option<f64>,
    clay_content_percent: Option<f64>,
    soil_organic_carbon_percent: Option<f64>,
    soil_organic_matter_percent: Option<f64>,
    soil_raw_density_kg_per_m3: Option<f64>,
    soil_bulk_density_kg_per_m3: Option<f64>,
    ph_value: Option<f64>,
    stone_content_percent: Option<f64>,
    field_capacity_percent: Option<f64>,
    saturation_percent: Option<f64>,
    permanent_wilting_point_percent: Option<f64>,
    lambda: Option<f64>,
    humus_class: Option<u8>,
    bulk_density_class: Option<u8>,
}

fn percent(value: Option<f64>) -> Option<f64> {
    value.map(|v| v / 100.0)
}

impl HorizonRow {
    /// Unknown humus or density classes leave the value unset, so only the
    /// affected profile fails once its layers are validated.
    fn into_horizon(self) -> (ProfileId, HorizonRecord) {
        let sand = percent(self.sand_content_percent);
        let clay = percent(self.clay_content_percent);

        let organic = match (
            self.soil_organic_carbon_percent,
            self.soil_organic_matter_percent,
            self.humus_class,
        ) {
            (Some(c), _, _) => Some(OrganicContent::Carbon(c / 100.0)),
            (None, Some(m), _) => Some(OrganicContent::Matter(m / 100.0)),
            (None, None, Some(class)) => humus_class_to_organic_carbon(class)
                .map_err(|e| warn!(profile = self.id, error = %e, "ignoring humus class"))
                .ok()
                .map(|c| OrganicContent::Carbon(c / 100.0)),
            (None, None, None) => None,
        };

        let density = match (
            self.soil_raw_density_kg_per_m3,
            self.soil_bulk_density_kg_per_m3,
            self.bulk_density_class,
        ) {
            (Some(raw), _, _) => Some(Density::Raw(raw)),
            (None, Some(bulk), _) => Some(Density::Bulk(bulk)),
            (None, None, Some(class)) => {
                bulk_density_class_to_raw_density(class, clay.unwrap_or(0.0))
                    .map_err(|e| warn!(profile = self.id, error = %e, "ignoring bulk density class"))
                    .ok()
                    .map(Density::Raw)
            }
            (None, None, None) => None,
        };

        let hydraulics = match (
            self.saturation_percent,
            self.field_capacity_percent,
            self.permanent_wilting_point_percent,
        ) {
            (Some(sat), Some(fc), Some(pwp)) => Some(MeasuredHydraulics {
                saturation: sat / 100.0,
                field_capacity: fc / 100.0,
                permanent_wilting_point: pwp / 100.0,
                lambda: self.lambda,
            }),
            (None, None, None) => None,
            _ => {
                warn!(
                    profile = self.id,
                    "ignoring incomplete measured hydraulics, all of saturation, field capacity and wilting point are needed"
                );
                None
            }
        };

        let horizon = HorizonRecord {
            upper_depth_cm: self.upper_depth_cm,
            lower_depth_cm: self.layer_depth_cm,
            texture: self.soil_type.filter(|t| !t.is_empty()),
            sand,
            clay,
            organic,
            density,
            ph: self.ph_value,
            stone_content: percent(self.stone_content_percent),
            hydraulics,
        };
        (self.id, horizon)
    }
}

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.has_headers(true).flexible(true).trim(csv::Trim::All);
    builder
}

/// Horizons ordered by lower depth, an open-ended horizon last.
fn sort_by_depth(horizons: &mut [HorizonRecord]) {
    horizons.sort_by(|a, b| match (a.lower_depth_cm, b.lower_depth_cm) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

fn parse_horizons<R: Read>(
    rdr: &mut csv::Reader<R>,
) -> Result<BTreeMap<ProfileId, Vec<HorizonRecord>>, SoilError> {
    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: HorizonRow = result?;
        rows.push(row.into_horizon());
    }
    let mut profiles = group_by_profile(rows);
    for horizons in profiles.values_mut() {
        sort_by_depth(horizons);
    }
    Ok(profiles)
}

/// Read the horizons of every profile in a CSV file.
pub fn read_horizons_csv(
    path: impl AsRef<Path>,
) -> Result<BTreeMap<ProfileId, Vec<HorizonRecord>>, SoilError> {
    let mut rdr = reader_builder().from_path(path.as_ref())?;
    parse_horizons(&mut rdr)
}

/// Read horizons from CSV bytes.
pub fn read_horizons_csv_from_bytes(
    data: &[u8],
) -> Result<BTreeMap<ProfileId, Vec<HorizonRecord>>, SoilError> {
    let mut rdr = reader_builder().from_reader(data);
    parse_horizons(&mut rdr)
}

/// Horizon data kept in a CSV file, one row per horizon.
#[derive(Debug, Clone)]
pub struct CsvHorizonSource {
    path: PathBuf,
}

impl CsvHorizonSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HorizonSource for CsvHorizonSource {
    fn identity(&self) -> String {
        format!("csv:{}", self.path.display())
    }

    fn load_profile(&self, id: ProfileId) -> Result<Vec<HorizonRecord>, SoilError> {
        let mut profiles = read_horizons_csv(&self.path)?;
        Ok(profiles.remove(&id).unwrap_or_default())
    }

    fn load_all_horizons(&self) -> Result<BTreeMap<ProfileId, Vec<HorizonRecord>>, SoilError> {
        let profiles = read_horizons_csv(&self.path)?;
        debug!(path = %self.path.display(), profiles = profiles.len(), "read horizon csv");
        Ok(profiles)
    }
}

#[derive(Debug, serde::Deserialize)]
struct PrincipalRow {
    soil_type: String,
    soil_raw_density: Option<f64>,
    air_capacity: f64,
    field_capacity: f64,
    n_field_capacity: f64,
}

#[derive(Debug, serde::Deserialize)]
struct ModifierRow {
    soil_type: String,
    organic_matter: Option<f64>,
    air_capacity: f64,
    field_capacity: f64,
    n_field_capacity: f64,
}

#[derive(Debug, serde::Deserialize)]
struct CapillaryRateRow {
    soil_type: String,
    distance: u32,
    capillary_rate: f64,
}

/// KA5 reference tables kept as CSV files.
#[derive(Debug, Clone)]
pub struct CsvReferenceSource {
    principal: PathBuf,
    modifier: PathBuf,
    capillary: Option<PathBuf>,
}

impl CsvReferenceSource {
    pub fn new(principal: impl Into<PathBuf>, modifier: impl Into<PathBuf>) -> Self {
        Self {
            principal: principal.into(),
            modifier: modifier.into(),
            capillary: None,
        }
    }

    pub fn with_capillary(mut self, capillary: impl Into<PathBuf>) -> Self {
        self.capillary = Some(capillary.into());
        self
    }
}

impl ReferenceSource for CsvReferenceSource {
    fn identity(&self) -> String {
        format!(
            "csv:{}+{}",
            self.principal.display(),
            self.modifier.display()
        )
    }

    fn principal_rows(&self) -> Result<Vec<ReferenceRow>, SoilError> {
        let mut rdr = reader_builder().from_path(&self.principal)?;
        let mut rows = Vec::new();
        for result in rdr.deserialize() {
            let row: PrincipalRow = result?;
            rows.push(ReferenceRow {
                texture: row.soil_type,
                axis: row.soil_raw_density,
                air_capacity: row.air_capacity,
                field_capacity: row.field_capacity,
                n_field_capacity: row.n_field_capacity,
            });
        }
        Ok(rows)
    }

    fn modifier_rows(&self) -> Result<Vec<ReferenceRow>, SoilError> {
        let mut rdr = reader_builder().from_path(&self.modifier)?;
        let mut rows = Vec::new();
        for result in rdr.deserialize() {
            let row: ModifierRow = result?;
            rows.push(ReferenceRow {
                texture: row.soil_type,
                axis: row.organic_matter,
                air_capacity: row.air_capacity,
                field_capacity: row.field_capacity,
                n_field_capacity: row.n_field_capacity,
            });
        }
        Ok(rows)
    }

    fn capillary_rows(&self) -> Result<Vec<CapillaryRow>, SoilError> {
        let Some(path) = &self.capillary else {
            return Ok(Vec::new());
        };
        let mut rdr = reader_builder().from_path(path)?;
        let mut rows = Vec::new();
        for result in rdr.deserialize() {
            let row: CapillaryRateRow = result?;
            rows.push(CapillaryRow {
                texture: row.soil_type,
                distance: row.distance,
                rate: row.capillary_rate,
            });
        }
        Ok(rows)
    }
}

/// CSV row structure for exported layers.
#[derive(Debug, serde::Serialize)]
struct LayerRow {
    profile_id: ProfileId,
    layer: usize,
    upper_depth_cm: u32,
    thickness_m: f64,
    texture: Option<&'static str>,
    sand: Option<f64>,
    clay: Option<f64>,
    silt: Option<f64>,
    organic_carbon: Option<f64>,
    organic_matter: Option<f64>,
    raw_density_kg_m3: Option<f64>,
    bulk_density_kg_m3: Option<f64>,
    ph: f64,
    stone_content: f64,
    saturation: Option<f64>,
    field_capacity: Option<f64>,
    permanent_wilting_point: Option<f64>,
    lambda: Option<f64>,
}

/// Write every layer of the given profiles as one flat CSV table.
pub fn write_layers_csv<'a>(
    profiles: impl IntoIterator<Item = &'a SoilProfile>,
    path: impl AsRef<Path>,
) -> Result<(), SoilError> {
    let mut wtr = csv::Writer::from_path(path.as_ref())?;

    for profile in profiles {
        for (index, layer) in profile.layers.iter().enumerate() {
            let row = LayerRow {
                profile_id: profile.id,
                layer: index + 1,
                upper_depth_cm: index as u32 * profile.layer_thickness_cm,
                thickness_m: layer.thickness_m,
                texture: layer.texture.map(|t| t.code()),
                sand: layer.sand,
                clay: layer.clay,
                silt: layer.silt(),
                organic_carbon: layer.organic_carbon(),
                organic_matter: layer.organic_matter(),
                raw_density_kg_m3: layer.raw_density(),
                bulk_density_kg_m3: layer.bulk_density(),
                ph: layer.ph,
                stone_content: layer.stone_content,
                saturation: layer.saturation,
                field_capacity: layer.field_capacity,
                permanent_wilting_point: layer.permanent_wilting_point,
                lambda: layer.lambda,
            };
            wtr.serialize(&row)?;
        }
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SoilLayer, TextureClass};
    use assert_approx_eq::assert_approx_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const HORIZONS: &str = "\
id,layer_depth_cm,soil_type,sand_content_percent,clay_content_percent,soil_organic_carbon_percent,soil_raw_density_kg_per_m3,ph_value
1,30,Sl2,70,7,1.14,1400,6.2
1,,Ls3,44,21,0.3,1600,
2,60,Ls3,44,21,0.5,1500,7.0
1,80,Ts4,65,30,0.2,1700,
";

    // --- Horizons ---

    #[test]
    fn test_read_horizons_converts_percent() {
        let profiles = read_horizons_csv_from_bytes(HORIZONS.as_bytes()).unwrap();
        assert_eq!(profiles.len(), 2);
        let first = &profiles[&1][0];
        assert_eq!(first.lower_depth_cm, Some(30.0));
        assert_eq!(first.texture.as_deref(), Some("Sl2"));
        assert_approx_eq!(first.sand.unwrap(), 0.70, 1e-12);
        assert_approx_eq!(first.clay.unwrap(), 0.07, 1e-12);
        match first.organic {
            Some(OrganicContent::Carbon(c)) => assert_approx_eq!(c, 0.0114, 1e-12),
            other => panic!("expected organic carbon, got {other:?}"),
        }
        assert_eq!(first.density, Some(Density::Raw(1400.0)));
        assert_eq!(first.ph, Some(6.2));
        assert!(first.hydraulics.is_none());
    }

    #[test]
    fn test_open_ended_horizon_sorted_last() {
        let profiles = read_horizons_csv_from_bytes(HORIZONS.as_bytes()).unwrap();
        let depths: Vec<Option<f64>> = profiles[&1].iter().map(|h| h.lower_depth_cm).collect();
        assert_eq!(depths, vec![Some(30.0), Some(80.0), None]);
        assert!(profiles[&1][2].ph.is_none());
    }

    #[test]
    fn test_class_fallback_columns() {
        let data = "\
id,layer_depth_cm,soil_type,clay_content_percent,humus_class,bulk_density_class
5,30,Ls3,20,2,3
";
        let profiles = read_horizons_csv_from_bytes(data.as_bytes()).unwrap();
        let horizon = &profiles[&5][0];
        assert_approx_eq!(horizon.organic.unwrap().carbon(), 1.5 / 1.72 / 100.0, 1e-12);
        assert_approx_eq!(horizon.density.unwrap().raw(0.2), 1520.0, 1e-9);
    }

    #[test]
    fn test_unknown_classes_leave_values_unset() {
        let data = "\
id,layer_depth_cm,soil_type,humus_class,bulk_density_class
5,30,Ls3,9,1
5,,Ls3,2,8
6,,Ls3,2,3
";
        let profiles = read_horizons_csv_from_bytes(data.as_bytes()).unwrap();
        assert_eq!(profiles.len(), 2);
        assert!(profiles[&5][0].organic.is_none());
        assert!(profiles[&5][0].density.is_some());
        assert!(profiles[&5][1].organic.is_some());
        assert!(profiles[&5][1].density.is_none());
        assert!(profiles[&6][0].organic.is_some());
    }

    #[test]
    fn test_measured_hydraulics() {
        let data = "\
id,layer_depth_cm,soil_type,field_capacity_percent,saturation_percent,permanent_wilting_point_percent,lambda
3,20,Sl2,25,40,10,0.4
3,40,Sl2,25,,10,
";
        let profiles = read_horizons_csv_from_bytes(data.as_bytes()).unwrap();
        let measured = profiles[&3][0].hydraulics.unwrap();
        assert_approx_eq!(measured.field_capacity, 0.25, 1e-12);
        assert_approx_eq!(measured.saturation, 0.40, 1e-12);
        assert_eq!(measured.lambda, Some(0.4));
        // incomplete set is ignored
        assert!(profiles[&3][1].hydraulics.is_none());
    }

    #[test]
    fn test_bulk_density_and_organic_matter_columns() {
        let data = "\
id,layer_depth_cm,soil_type,soil_organic_matter_percent,soil_bulk_density_kg_per_m3
4,30,Ls3,2.0,1589
";
        let profiles = read_horizons_csv_from_bytes(data.as_bytes()).unwrap();
        let horizon = &profiles[&4][0];
        assert_eq!(horizon.organic, Some(OrganicContent::Matter(0.02)));
        assert_eq!(horizon.density, Some(Density::Bulk(1589.0)));
    }

    #[test]
    fn test_malformed_row_is_csv_error() {
        let data = "id,layer_depth_cm\nnot-a-number,30\n";
        let err = read_horizons_csv_from_bytes(data.as_bytes()).unwrap_err();
        assert!(matches!(err, SoilError::Csv(_)));
    }

    #[test]
    fn test_csv_horizon_source() {
        let file = csv_file(HORIZONS);
        let source = CsvHorizonSource::new(file.path());
        assert!(source.identity().starts_with("csv:"));
        assert_eq!(source.load_profile(2).unwrap().len(), 1);
        assert!(source.load_profile(99).unwrap().is_empty());
        assert_eq!(source.load_all_horizons().unwrap().len(), 2);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let source = CsvHorizonSource::new("/nonexistent/horizons.csv");
        let err = source.load_all_horizons().unwrap_err();
        assert!(matches!(err, SoilError::Csv(_) | SoilError::Io(_)));
    }

    // --- Reference tables ---

    #[test]
    fn test_reference_source_rows() {
        let principal = csv_file(
            "soil_type,soil_raw_density,air_capacity,field_capacity,n_field_capacity\n\
             Ls3,1.3,10,33,17\n\
             Hh,,10,60,35\n",
        );
        let modifier = csv_file(
            "soil_type,organic_matter,air_capacity,field_capacity,n_field_capacity\n\
             Ls3,1.5,1,1.5,1\n",
        );
        let capillary = csv_file("soil_type,distance,capillary_rate\nLs3,1,5.0\n");

        let source = CsvReferenceSource::new(principal.path(), modifier.path())
            .with_capillary(capillary.path());
        let rows = source.principal_rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].axis, Some(1.3));
        assert_eq!(rows[1].axis, None);
        assert_eq!(source.modifier_rows().unwrap()[0].field_capacity, 1.5);
        assert_eq!(source.capillary_rows().unwrap()[0].rate, 5.0);
    }

    #[test]
    fn test_capillary_table_is_optional() {
        let source = CsvReferenceSource::new("p.csv", "m.csv");
        assert!(source.capillary_rows().unwrap().is_empty());
    }

    // --- Export ---

    #[test]
    fn test_write_layers_csv() {
        let layer = SoilLayer {
            texture: Some(TextureClass::Ls3),
            sand: Some(0.44),
            clay: Some(0.21),
            field_capacity: Some(0.3),
            ..SoilLayer::default()
        };
        let profile = SoilProfile::new(7, 10, vec![layer.clone(), layer]);
        let out = NamedTempFile::new().unwrap();
        write_layers_csv([&profile], out.path()).unwrap();

        let content = std::fs::read_to_string(out.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("profile_id,layer,upper_depth_cm"));
        assert!(lines[2].starts_with("7,2,10,0.1,Ls3"));
    }
}
