use super::{Point, HW};
use crate::common::*;

/// A rectangle given by its top, left, bottom and right borders.
pub trait Rect {
    type Type;

    fn t(&self) -> Self::Type;
    fn l(&self) -> Self::Type;
    fn b(&self) -> Self::Type;
    fn r(&self) -> Self::Type;
    fn h(&self) -> Self::Type;
    fn w(&self) -> Self::Type;

    fn try_from_xywh(xywh: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized;
}

pub trait RectNum: Rect
where
    Self::Type: Num + PartialOrd + Copy,
{
    /// Panics on a negative size. Use [`Rect::try_from_xywh`] for unchecked input.
    fn from_xywh(xywh: [Self::Type; 4]) -> Self
    where
        Self: Sized,
    {
        Self::try_from_xywh(xywh).unwrap()
    }

    fn xywh(&self) -> [Self::Type; 4] {
        [self.l(), self.t(), self.w(), self.h()]
    }

    fn area(&self) -> Self::Type {
        self.w() * self.h()
    }

    /// Checks whether the point lies in the rectangle. All four borders are inclusive.
    fn contains_point(&self, point: &Point<Self::Type>) -> bool {
        let Point { x, y } = *point;
        (self.l()..=self.r()).contains(&x) && (self.t()..=self.b()).contains(&y)
    }

    /// Checks whether the rectangle lies in the `[0, w] x [0, h]` frame.
    fn is_within(&self, size: &HW<Self::Type>) -> bool {
        let frame = size.frame();
        frame.l() <= self.l()
            && self.r() <= frame.r()
            && frame.t() <= self.t()
            && self.b() <= frame.b()
    }
}

impl<T> RectNum for T
where
    T: Rect,
    T::Type: Num + PartialOrd + Copy,
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::XYWH;

    #[test]
    fn point_on_border_is_contained() {
        let rect = XYWH::from_xywh([10.0, 10.0, 20.0, 20.0]);
        assert!(rect.contains_point(&Point::new(10.0, 10.0)));
        assert!(rect.contains_point(&Point::new(30.0, 30.0)));
        assert!(rect.contains_point(&Point::new(15.0, 30.0)));
        assert!(!rect.contains_point(&Point::new(30.5, 15.0)));
        assert!(!rect.contains_point(&Point::new(15.0, 9.9)));
    }

    #[test]
    fn rect_within_frame() {
        let size = HW::from_hw([100.0, 50.0]);
        assert!(XYWH::from_xywh([0.0, 0.0, 50.0, 100.0]).is_within(&size));
        assert!(!XYWH::from_xywh([1.0, 0.0, 50.0, 100.0]).is_within(&size));
        assert!(!XYWH::from_xywh([-1.0, 0.0, 10.0, 10.0]).is_within(&size));
    }
}
