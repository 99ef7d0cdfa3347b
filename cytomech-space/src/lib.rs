mod modulo;
mod space;

pub use modulo::*;
pub use space::*;
