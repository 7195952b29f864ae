//! Pixel-space rectangles, points and sizes.

mod common;

pub use transform::*;
mod transform;

pub use rect::*;
pub mod rect;

pub use xywh::*;
pub mod xywh;

pub use hw::*;
pub mod hw;

pub use point::*;
pub mod point;

pub mod prelude {
    pub use crate::rect::{Rect, RectNum};
}
