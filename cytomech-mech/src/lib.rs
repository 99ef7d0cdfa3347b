mod bead;
mod error;
mod fiber;
mod fiber_project;
mod meca;
mod mecable;
mod point_array;
mod solid;
mod sphere;

pub use bead::*;
pub use error::*;
pub use fiber::*;
pub use meca::*;
pub use mecable::*;
pub use point_array::*;
pub use solid::*;
pub use sphere::*;
