mod arena;
mod inventory;
mod shuffle_list;

pub use arena::*;
pub use inventory::*;
pub use shuffle_list::*;
