mod bicgstab;
mod rototranslation;
mod sparse;
mod tridiag;
mod vec3;

pub use bicgstab::*;
pub use rototranslation::*;
pub use sparse::*;
pub use tridiag::*;
pub use vec3::*;
