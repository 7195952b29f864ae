//! Annotated image datasets and their file codec.

mod codec;
mod coco_;
mod dataset_;
mod sample;

pub use codec::*;
pub use coco_::*;
pub use dataset_::*;
pub use sample::*;
