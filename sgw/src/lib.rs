mod data;
mod sgw;
pub mod userplane;

pub use data::*;
pub use sgw::Sgw;
