use std::path::Path;

use serde_json::{Map, Value};

use crate::error::SoilError;
use crate::models::SoilProfile;

/// JSON object mapping each profile id to its array of layer parameters.
pub fn profiles_to_json<'a>(
    profiles: impl IntoIterator<Item = &'a SoilProfile>,
    with_units: bool,
) -> Value {
    let mut obj = Map::new();
    for profile in profiles {
        obj.insert(profile.id.to_string(), profile.to_json(with_units));
    }
    Value::Object(obj)
}

/// Write soil profiles to a JSON file.
pub fn write_profiles_json<'a>(
    profiles: impl IntoIterator<Item = &'a SoilProfile>,
    path: impl AsRef<Path>,
    pretty: bool,
    with_units: bool,
) -> Result<(), SoilError> {
    let value = profiles_to_json(profiles, with_units);
    let content = if pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    std::fs::write(path.as_ref(), content)?;
    Ok(())
}
