mod config;
mod session;
mod tft;
mod tunnel;

pub use config::*;
pub use session::*;
pub use tft::*;
pub use tunnel::*;
