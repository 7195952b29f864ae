use super::Rect;
use crate::common::*;

/// Bounding box in the pixel-space XYWH format, where (x, y) is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct XYWH<T> {
    pub(crate) x: T,
    pub(crate) y: T,
    pub(crate) w: T,
    pub(crate) h: T,
}

impl<T> XYWH<T>
where
    T: Copy,
{
    pub fn x(&self) -> T {
        self.x
    }

    pub fn y(&self) -> T {
        self.y
    }

    pub fn try_cast<V>(self) -> Option<XYWH<V>>
    where
        T: ToPrimitive,
        V: NumCast,
    {
        let [x, y, w, h] = [self.x, self.y, self.w, self.h].map(<V as NumCast>::from);
        Some(XYWH {
            x: x?,
            y: y?,
            w: w?,
            h: h?,
        })
    }
}

impl<T> Rect for XYWH<T>
where
    T: Copy + Num + PartialOrd,
{
    type Type = T;

    fn t(&self) -> T {
        self.y
    }

    fn l(&self) -> T {
        self.x
    }

    fn b(&self) -> T {
        self.y + self.h
    }

    fn r(&self) -> T {
        self.x + self.w
    }

    fn h(&self) -> T {
        self.h
    }

    fn w(&self) -> T {
        self.w
    }

    fn try_from_xywh([x, y, w, h]: [T; 4]) -> Result<Self> {
        ensure!(
            w >= T::zero() && h >= T::zero(),
            "box width and height must be non-negative"
        );
        Ok(Self { x, y, w, h })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RectNum;

    #[test]
    fn borders_and_cast() {
        let rect = XYWH::from_xywh([2.0, 3.0, 10.0, 4.0]);
        assert_eq!([rect.t(), rect.l(), rect.b(), rect.r()], [3.0, 2.0, 7.0, 12.0]);
        assert_eq!(rect.try_cast::<u32>().map(|rect| rect.xywh()), Some([2, 3, 10, 4]));
        assert!(XYWH::try_from_xywh([0.0, 0.0, -1.0, 1.0]).is_err());
    }
}
