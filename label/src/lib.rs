//! Labelled shapes and label category tables.

mod categories;
pub use categories::*;

use bbox::{Transform, XYWH};
use num_traits::Num;
use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// A shape tagged with a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label<G, C> {
    pub shape: G,
    pub class: C,
}

impl<G, C> Label<G, C> {
    pub fn new(shape: G, class: C) -> Self {
        Self { shape, class }
    }
}

impl<'a, T, C> Mul<&'a Label<XYWH<T>, C>> for &'a Transform<T>
where
    T: Copy + Num,
    C: Copy,
{
    type Output = Label<XYWH<T>, C>;

    fn mul(self, rhs: &'a Label<XYWH<T>, C>) -> Self::Output {
        Label {
            shape: self * &rhs.shape,
            class: rhs.class,
        }
    }
}
