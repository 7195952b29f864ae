use super::RoiInfo;
use crate::{
    common::*,
    error::{ValidationError, ValidationResult},
};
use image::{imageops, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;

/// The circle drawn over the point in ROI images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorMarker {
    pub enabled: bool,
    /// Preferred radius in pixels.
    pub radius: u32,
    /// Radius bounds as fractions of the half crop diagonal.
    pub min_radius_fraction: f64,
    pub max_radius_fraction: f64,
    /// Fill color, RGB.
    pub color: [u8; 3],
}

impl Default for LocatorMarker {
    fn default() -> Self {
        Self {
            enabled: true,
            radius: 15,
            min_radius_fraction: 0.005,
            max_radius_fraction: 0.01,
            color: [255, 255, 0],
        }
    }
}

impl LocatorMarker {
    /// The fill radius for a crop of the given size.
    pub fn radius_for(&self, roi_w: u32, roi_h: u32) -> i32 {
        let half_diagonal = (roi_w as f64).hypot(roi_h as f64) / 2.0;
        let radius = (self.max_radius_fraction * half_diagonal)
            .min((self.radius as f64).max(self.min_radius_fraction * half_diagonal));
        radius as i32
    }

    /// Draws a white-outlined filled circle centered at the crop-local point.
    pub fn render(&self, pixels: &mut RgbImage, point_x: u32, point_y: u32, roi_w: u32, roi_h: u32) {
        let center = (point_x as i32, point_y as i32);
        let radius = self.radius_for(roi_w, roi_h);
        draw_filled_circle_mut(pixels, center, radius + 1, Rgb([255, 255, 255]));
        draw_filled_circle_mut(pixels, center, radius, Rgb(self.color));
    }
}

/// Draws the default locator marker.
pub fn render_locator_marker(
    mut pixels: RgbImage,
    point_x: u32,
    point_y: u32,
    roi_w: u32,
    roi_h: u32,
) -> RgbImage {
    LocatorMarker::default().render(&mut pixels, point_x, point_y, roi_w, roi_h);
    pixels
}

pub fn decode_image(data: &[u8]) -> Result<RgbImage> {
    let image = image::load_from_memory(data).context("failed to decode image")?;
    Ok(image.to_rgb8())
}

/// Checks the decoded image against the size recorded in the annotations.
pub fn check_image_size(
    filename: &str,
    expected: ImageSize,
    image: &RgbImage,
) -> ValidationResult<()> {
    let (width, height) = image.dimensions();
    if [height, width] != expected.hw() {
        return Err(ValidationError::InvalidImageInfo(format!(
            "Sample '{}': invalid size provided in the point annotations \
             (annotated {}x{}, actual {}x{})",
            filename,
            expected.w(),
            expected.h(),
            width,
            height
        )));
    }
    Ok(())
}

/// Copies the crop out of the source image.
pub fn extract_roi(image: &RgbImage, roi: &RoiInfo) -> RgbImage {
    imageops::crop_imm(image, roi.roi_x, roi.roi_y, roi.roi_w, roi.roi_h).to_image()
}

/// Encodes the image in the format of the file extension.
pub fn encode_image(image: &RgbImage, extension: &str) -> Result<Vec<u8>> {
    let extension = extension.trim_start_matches('.');
    let format = ImageFormat::from_extension(extension)
        .ok_or_else(|| format_err!("unsupported image extension '{}'", extension))?;
    let mut buf = Cursor::new(vec![]);
    image
        .write_to(&mut buf, format)
        .with_context(|| format!("failed to encode image as '{}'", extension))?;
    Ok(buf.into_inner())
}

/// Crops, marks and encodes the ROI images of one source image.
///
/// Returns the encoded images in the order of `rois`.
pub fn render_rois(
    image: &RgbImage,
    rois: &[RoiInfo],
    marker: &LocatorMarker,
    extension: &str,
) -> Result<Vec<Vec<u8>>> {
    rois.iter()
        .map(|roi| {
            let mut pixels = extract_roi(image, roi);
            if marker.enabled {
                marker.render(&mut pixels, roi.point_x, roi.point_y, roi.roi_w, roi.roi_h);
            }
            encode_image(&pixels, extension)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 0]))
    }

    fn roi(x: u32, y: u32, w: u32, h: u32, px: u32, py: u32) -> RoiInfo {
        RoiInfo {
            point_id: 1,
            original_image_key: 1,
            point_x: px,
            point_y: py,
            roi_x: x,
            roi_y: y,
            roi_w: w,
            roi_h: h,
        }
    }

    #[test]
    fn marker_radius_is_bounded() {
        let marker = LocatorMarker::default();
        // small crops are capped by the max fraction
        assert_eq!(marker.radius_for(300, 400), 2);
        // large crops prefer the configured radius
        assert_eq!(marker.radius_for(3000, 4000), 15);
        // huge crops grow past it
        assert_eq!(marker.radius_for(60000, 80000), 250);
    }

    #[test]
    fn crop_takes_source_pixels() {
        let image = gradient(64, 32);
        let crop = extract_roi(&image, &roi(10, 5, 20, 8, 0, 0));
        assert_eq!(crop.dimensions(), (20, 8));
        assert_eq!(crop.get_pixel(0, 0), &Rgb([10, 5, 0]));
        assert_eq!(crop.get_pixel(19, 7), &Rgb([29, 12, 0]));
    }

    #[test]
    fn marker_is_drawn_at_point() {
        let pixels = RgbImage::new(2000, 2000);
        let pixels = render_locator_marker(pixels, 1000, 1000, 2000, 2000);
        assert_eq!(pixels.get_pixel(1000, 1000), &Rgb([255, 255, 0]));
        assert_eq!(pixels.get_pixel(1000, 1015), &Rgb([255, 255, 255]));
        assert_eq!(pixels.get_pixel(0, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn size_mismatch_is_reported() {
        let image = gradient(40, 30);
        assert!(check_image_size("a.jpg", ImageSize::from_hw([30, 40]), &image).is_ok());
        let err = check_image_size("a.jpg", ImageSize::from_hw([40, 30]), &image).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidImageInfo);
    }

    #[test]
    fn encoded_roi_decodes_back() {
        let image = gradient(50, 50);
        let rois = [roi(0, 0, 10, 12, 5, 6)];
        let marker = LocatorMarker {
            enabled: false,
            ..Default::default()
        };
        let encoded = render_rois(&image, &rois, &marker, ".png").unwrap();
        let decoded = decode_image(&encoded[0]).unwrap();
        assert_eq!(decoded, extract_roi(&image, &rois[0]));
    }
}
