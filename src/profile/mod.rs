mod cache;
mod discretizer;

pub use cache::{ProfileCache, SourceProfiles};
pub use discretizer::{build_layer, discretize, load_profile, LayerSettings};
