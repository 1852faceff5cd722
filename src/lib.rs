pub mod config;
pub mod error;
pub mod hydraulics;
pub mod io;
pub mod models;
pub mod profile;
pub mod visualization;

pub use config::LoaderConfig;
pub use error::SoilError;
pub use hydraulics::{HydraulicMethod, Hydraulics, ReferenceTableStore, ReferenceTables};
pub use io::{HorizonSource, ReferenceSource};
pub use models::{HorizonRecord, SoilLayer, SoilProfile, TextureClass};
pub use profile::{LayerSettings, ProfileCache};
