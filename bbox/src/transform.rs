use super::{Point, XYWH};
use crate::common::*;

/// A translation by `(tx, ty)`, e.g. from image coordinates into a crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Transform<T> {
    pub tx: T,
    pub ty: T,
}

impl<T> Transform<T>
where
    T: Copy + Num + Neg<Output = T>,
{
    pub fn translation(tx: T, ty: T) -> Self {
        Self { tx, ty }
    }

    /// Maps image coordinates into the local frame of a crop whose top-left corner is `origin`.
    pub fn to_local_frame(origin: &Point<T>) -> Self {
        Self::translation(-origin.x, -origin.y)
    }

    pub fn inverse(&self) -> Self {
        Self::translation(-self.tx, -self.ty)
    }
}

impl<T> Mul<&XYWH<T>> for &Transform<T>
where
    T: Copy + Num,
{
    type Output = XYWH<T>;

    fn mul(self, rhs: &XYWH<T>) -> Self::Output {
        XYWH {
            x: rhs.x + self.tx,
            y: rhs.y + self.ty,
            ..*rhs
        }
    }
}

impl<T> Mul<&Point<T>> for &Transform<T>
where
    T: Copy + Num,
{
    type Output = Point<T>;

    fn mul(self, rhs: &Point<T>) -> Self::Output {
        Point {
            x: rhs.x + self.tx,
            y: rhs.y + self.ty,
        }
    }
}

impl<T> Mul<&Transform<T>> for &Transform<T>
where
    T: Copy + Num,
{
    type Output = Transform<T>;

    fn mul(self, rhs: &Transform<T>) -> Self::Output {
        Transform {
            tx: self.tx + rhs.tx,
            ty: self.ty + rhs.ty,
        }
    }
}
