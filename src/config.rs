//! TOML configuration for the soil loader.
//!
//! ```toml
//! layer_thickness_cm = 10
//! max_depth_cm = 200
//! method = "ka5"
//!
//! [source]
//! kind = "csv"
//! profiles = "profiles.csv"
//! principal = "principal.csv"
//! modifier = "modifier.csv"
//! capillary = "capillary.csv"
//! ```
//!
//! Relative paths are resolved against the directory of the config file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::error::SoilError;
use crate::hydraulics::HydraulicMethod;
use crate::io::{CsvHorizonSource, CsvReferenceSource, HorizonSource, ReferenceSource};
use crate::profile::LayerSettings;

fn default_layer_thickness_cm() -> u32 {
    10
}

fn default_max_depth_cm() -> u32 {
    200
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoaderConfig {
    #[serde(default = "default_layer_thickness_cm")]
    pub layer_thickness_cm: u32,
    #[serde(default = "default_max_depth_cm")]
    pub max_depth_cm: u32,
    #[serde(default)]
    pub method: HydraulicMethod,
    pub source: SourceConfig,
}

/// Where profiles and reference tables come from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Csv {
        profiles: PathBuf,
        principal: PathBuf,
        modifier: PathBuf,
        #[serde(default)]
        capillary: Option<PathBuf>,
    },
    /// One database holding profiles and reference tables
    Sqlite { path: PathBuf },
}

fn resolve(base: &Path, path: &mut PathBuf) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

impl SourceConfig {
    fn resolve_paths(&mut self, base: &Path) {
        match self {
            SourceConfig::Csv {
                profiles,
                principal,
                modifier,
                capillary,
            } => {
                resolve(base, profiles);
                resolve(base, principal);
                resolve(base, modifier);
                if let Some(capillary) = capillary {
                    resolve(base, capillary);
                }
            }
            SourceConfig::Sqlite { path } => resolve(base, path),
        }
    }
}

impl LoaderConfig {
    /// Read a config file, resolving relative paths next to it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SoilError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SoilError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let mut config = Self::from_toml_str(&content)?;
        if let Some(base) = path.parent() {
            config.source.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, SoilError> {
        let config: LoaderConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SoilError> {
        self.settings().validate()?;
        #[cfg(not(feature = "sqlite"))]
        if matches!(self.source, SourceConfig::Sqlite { .. }) {
            return Err(SoilError::Config(
                "sqlite sources need the `sqlite` feature".to_string(),
            ));
        }
        Ok(())
    }

    pub fn settings(&self) -> LayerSettings {
        LayerSettings {
            layer_thickness_cm: self.layer_thickness_cm,
            max_depth_cm: self.max_depth_cm,
            method: self.method,
        }
    }

    pub fn horizon_source(&self) -> Result<Arc<dyn HorizonSource>, SoilError> {
        match &self.source {
            SourceConfig::Csv { profiles, .. } => Ok(Arc::new(CsvHorizonSource::new(profiles))),
            #[cfg(feature = "sqlite")]
            SourceConfig::Sqlite { path } => Ok(Arc::new(crate::io::SqliteSource::new(path))),
            #[cfg(not(feature = "sqlite"))]
            SourceConfig::Sqlite { .. } => Err(SoilError::Config(
                "sqlite sources need the `sqlite` feature".to_string(),
            )),
        }
    }

    pub fn reference_source(&self) -> Result<Arc<dyn ReferenceSource>, SoilError> {
        match &self.source {
            SourceConfig::Csv {
                principal,
                modifier,
                capillary,
                ..
            } => {
                let mut source = CsvReferenceSource::new(principal, modifier);
                if let Some(capillary) = capillary {
                    source = source.with_capillary(capillary);
                }
                Ok(Arc::new(source))
            }
            #[cfg(feature = "sqlite")]
            SourceConfig::Sqlite { path } => Ok(Arc::new(crate::io::SqliteSource::new(path))),
            #[cfg(not(feature = "sqlite"))]
            SourceConfig::Sqlite { .. } => Err(SoilError::Config(
                "sqlite sources need the `sqlite` feature".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const CSV_CONFIG: &str = r#"
layer_thickness_cm = 20
method = "van_genuchten"

[source]
kind = "csv"
profiles = "profiles.csv"
principal = "/tables/principal.csv"
modifier = "modifier.csv"
"#;

    #[test]
    fn test_defaults() {
        let config = LoaderConfig::from_toml_str(
            "[source]\nkind = \"sqlite\"\npath = \"soil.sqlite\"\n",
        );
        #[cfg(feature = "sqlite")]
        {
            let config = config.unwrap();
            assert_eq!(config.settings(), LayerSettings::default());
        }
        #[cfg(not(feature = "sqlite"))]
        assert!(config.is_err());
    }

    #[test]
    fn test_csv_source_config() {
        let config = LoaderConfig::from_toml_str(CSV_CONFIG).unwrap();
        assert_eq!(config.layer_thickness_cm, 20);
        assert_eq!(config.max_depth_cm, 200);
        assert_eq!(config.method, HydraulicMethod::VanGenuchten);
        assert_eq!(config.settings().max_layers(), 10);
        match &config.source {
            SourceConfig::Csv { capillary, .. } => assert!(capillary.is_none()),
            other => panic!("unexpected source: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let err = LoaderConfig::from_toml_str(
            "layer_thickness_cm = 50\nmax_depth_cm = 20\n[source]\nkind = \"csv\"\n\
             profiles = \"p\"\nprincipal = \"a\"\nmodifier = \"b\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, SoilError::Config(_)));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = LoaderConfig::from_toml_str(&format!("layers = 3\n{CSV_CONFIG}")).unwrap_err();
        assert!(matches!(err, SoilError::Config(_)));
    }

    #[test]
    fn test_unknown_method_rejected() {
        let err = LoaderConfig::from_toml_str(&CSV_CONFIG.replace("van_genuchten", "rosetta"))
            .unwrap_err();
        assert!(err.to_string().contains("Config error"));
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("soil.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(CSV_CONFIG.as_bytes()).unwrap();

        let config = LoaderConfig::load(&path).unwrap();
        match &config.source {
            SourceConfig::Csv {
                profiles,
                principal,
                ..
            } => {
                assert_eq!(profiles, &dir.path().join("profiles.csv"));
                assert_eq!(principal, &PathBuf::from("/tables/principal.csv"));
            }
            other => panic!("unexpected source: {other:?}"),
        }
        let horizons = config.horizon_source().unwrap();
        assert!(horizons.identity().ends_with("profiles.csv"));
        assert!(config.reference_source().unwrap().identity().starts_with("csv:"));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = LoaderConfig::load("/nonexistent/soil.toml").unwrap_err();
        assert!(matches!(err, SoilError::Config(_)));
    }
}
