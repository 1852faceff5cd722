//! Derive KA5 hydraulic characteristics for a few textures.
//!
//! Run from the project root:
//!   cargo run --example derive_characteristics

use std::sync::Arc;

use soil_profile_loader::hydraulics::{ka5, van_genuchten};
use soil_profile_loader::io::CsvReferenceSource;
use soil_profile_loader::models::{classify, declassify, TextureClass};
use soil_profile_loader::visualization::print_hydraulics;
use soil_profile_loader::ReferenceTableStore;

fn main() {
    let store = ReferenceTableStore::new();
    let tables = store.tables(Arc::new(CsvReferenceSource::new(
        "data/principal.csv",
        "data/modifier.csv",
    )));

    for (texture, density, organic_matter) in [
        (TextureClass::Ls3, 1.4, 2.0),
        (TextureClass::Sl2, 1.6, 1.5),
        (TextureClass::Hh, 0.2, 30.0),
    ] {
        match ka5::derive(&tables, texture, 0.0, density, organic_matter) {
            Ok(h) => print_hydraulics(texture, &h),
            Err(e) => eprintln!("{texture}: {e}"),
        }
    }

    // Same loam through the van Genuchten pedotransfer functions
    let loam = declassify(TextureClass::Ls3);
    let h = van_genuchten::derive(loam.sand, loam.clay, 0.0, 1450.0, 0.0116);
    print_hydraulics(TextureClass::Ls3, &h);

    let code = classify(loam.sand, loam.clay).expect("Representative pair classifies");
    println!("Representative Ls3 pair classifies as {code}");
}
