//! Dataset validators.
//!
//! Hard violations return a [`ValidationError`](crate::error::ValidationError) right away.
//! Soft violations drop the offending annotations, are recorded in a [`DiscardLog`] and
//! turn into a hard failure once the discarded fraction exceeds the configured ceiling.

mod discard;
mod validators;

pub use discard::*;
pub use validators::*;
