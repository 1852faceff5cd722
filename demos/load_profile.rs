//! Load one soil profile through the shared cache and print its layers.
//!
//! Run from the project root:
//!   cargo run --example load_profile

use soil_profile_loader::{visualization::print_profile_table, LoaderConfig, ProfileCache};

fn main() {
    let config = LoaderConfig::load("data/soil.toml").expect("Failed to read config");
    let cache = ProfileCache::new(
        config.settings(),
        config.reference_source().expect("Failed to open reference tables"),
    )
    .expect("Invalid layer settings");
    let source = config.horizon_source().expect("Failed to open profile source");

    match cache.get_profile(source.as_ref(), 1) {
        Ok(profile) => print_profile_table(&profile),
        Err(e) => eprintln!("Could not load profile 1: {e}"),
    }

    // Second request is served from the cache
    let again = cache.get_profile(source.as_ref(), 2);
    println!("Profile 2 cached: {}", again.is_ok());
}
