//! Export every profile of the sample data set as JSON and CSV.
//!
//! Run from the project root:
//!   cargo run --example export_profiles

use soil_profile_loader::io::{write_layers_csv, write_profiles_json};
use soil_profile_loader::{LoaderConfig, ProfileCache};

fn main() {
    let config = LoaderConfig::load("data/soil.toml").expect("Failed to read config");
    let cache = ProfileCache::new(
        config.settings(),
        config.reference_source().expect("Failed to open reference tables"),
    )
    .expect("Invalid layer settings");
    let source = config.horizon_source().expect("Failed to open profile source");
    let loaded = cache.profiles(source.as_ref()).expect("Failed to load profiles");

    let out_dir = std::env::temp_dir();
    let json_path = out_dir.join("soil_profiles.json");
    let csv_path = out_dir.join("soil_layers.csv");

    write_profiles_json(loaded.profiles(), &json_path, true, true).expect("Failed to write JSON");
    write_layers_csv(loaded.profiles(), &csv_path).expect("Failed to write CSV");

    println!("Wrote {} profiles to {}", loaded.len(), json_path.display());
    println!("Wrote layer table to {}", csv_path.display());
    for (id, reason) in loaded.rejected() {
        println!("  rejected {id}: {reason}");
    }
}
