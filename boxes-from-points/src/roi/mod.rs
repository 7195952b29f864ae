//! Region-of-interest sizing, placement and pixel extraction.

mod estimate;
mod extract;
mod pixels;

pub use estimate::*;
pub use extract::*;
pub use pixels::*;
