pub mod conversion;
mod horizon;
mod layer;
mod profile;
mod texture;

pub use horizon::{Density, HorizonRecord, MeasuredHydraulics, OrganicContent, ProfileId};
pub use layer::SoilLayer;
pub use profile::SoilProfile;
pub use texture::{classify, declassify, declassify_code, SandClay, TextureClass, FALLBACK_SAND_CLAY};
