use thiserror::Error;

use crate::models::SandClay;

/// Errors that can occur while loading soil profiles and deriving layer parameters.
#[derive(Error, Debug)]
pub enum SoilError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Undefined combination of sand ({sand}) and clay ({clay})")]
    Classification { sand: f64, clay: f64 },

    #[error("Unknown KA5 texture class: '{code}'")]
    UnknownTexture {
        code: String,
        /// Representative pair usable for degraded-mode continuation.
        fallback: SandClay,
    },

    #[error("No reference data for texture {texture} at {axis} {value}")]
    ReferenceDataMissing {
        texture: String,
        axis: &'static str,
        value: String,
    },

    #[error("Invalid soil layer ({context}): {}", .fields.join(", "))]
    InvalidLayer {
        fields: Vec<&'static str>,
        context: String,
    },

    #[error("Soil profile {profile_id} not found in data source '{source_id}'")]
    ProfileNotFound { source_id: String, profile_id: i64 },

    #[error("Soil profile {profile_id} was rejected while loading: {reason}")]
    ProfileRejected { profile_id: i64, reason: String },

    #[error("Data source '{source_id}' failed: {message}")]
    DataSource { source_id: String, message: String },
}

impl From<toml::de::Error> for SoilError {
    fn from(e: toml::de::Error) -> Self {
        SoilError::Config(e.to_string())
    }
}

impl SoilError {
    /// True for the non-fatal "profile id is not part of the source" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SoilError::ProfileNotFound { .. })
    }

    /// Message to remember for a failed load, without a nested source prefix.
    pub(crate) fn into_message(self) -> String {
        match self {
            SoilError::DataSource { message, .. } => message,
            other => other.to_string(),
        }
    }
}
