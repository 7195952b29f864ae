use crate::{common::*, XYWH};

/// A size as height and width, e.g. of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HW<T> {
    h: T,
    w: T,
}

impl<T> HW<T> {
    pub fn try_cast<U>(self) -> Option<HW<U>>
    where
        T: ToPrimitive,
        U: NumCast,
    {
        let Self { h, w } = self;
        Some(HW {
            h: U::from(h)?,
            w: U::from(w)?,
        })
    }
}

impl<T> HW<T>
where
    T: Num + PartialOrd + Copy + Debug,
{
    /// Builds a size from `[h, w]`, rejecting negative sides.
    pub fn try_from_hw([h, w]: [T; 2]) -> Result<Self> {
        ensure!(
            h >= T::zero() && w >= T::zero(),
            "negative size (h={:?}, w={:?})",
            h,
            w
        );
        Ok(Self { h, w })
    }

    pub fn from_hw(hw: [T; 2]) -> Self {
        Self::try_from_hw(hw).unwrap()
    }
}

impl<T> HW<T>
where
    T: Num + Copy,
{
    pub fn hw(&self) -> [T; 2] {
        [self.h, self.w]
    }

    pub fn h(&self) -> T {
        self.h
    }

    pub fn w(&self) -> T {
        self.w
    }

    pub fn area(&self) -> T {
        self.h * self.w
    }

    /// The `[0, w] x [0, h]` rectangle anchored at the origin.
    pub fn frame(&self) -> XYWH<T> {
        XYWH {
            x: T::zero(),
            y: T::zero(),
            w: self.w,
            h: self.h,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RectNum;
    use approx::assert_abs_diff_eq;

    #[test]
    fn image_size_frame() {
        let size = HW::from_hw([48.0, 64.0]);
        assert_abs_diff_eq!(size.area(), 3072.0);
        assert_eq!(size.frame().xywh(), [0.0, 0.0, 64.0, 48.0]);
    }

    #[test]
    fn negative_size_is_rejected() {
        assert!(HW::try_from_hw([-1, 2]).is_err());
        assert_eq!(HW::<u32>::from_hw([3, 4]).try_cast::<f64>(), Some(HW::from_hw([3.0, 4.0])));
    }
}
