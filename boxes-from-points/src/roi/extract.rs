use super::{RelativeSize, RoiSizeEstimations};
use crate::{
    common::*,
    dataset::{AnnotationId, Dataset, PointAnnotation},
};

/// The crop of one point.
///
/// `point_x`/`point_y` are relative to the crop. `roi_*` locate the crop in the source
/// image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoiInfo {
    pub point_id: AnnotationId,
    pub original_image_key: u64,
    pub point_x: u32,
    pub point_y: u32,
    pub roi_x: u32,
    pub roi_y: u32,
    pub roi_w: u32,
    pub roi_h: u32,
}

impl RoiInfo {
    pub fn rect(&self) -> XYWH<u32> {
        XYWH::from_xywh([self.roi_x, self.roi_y, self.roi_w, self.roi_h])
    }

    /// Maps source image coordinates into the crop.
    pub fn to_local(&self) -> Transform<f64> {
        Transform::to_local_frame(&Point::new(self.roi_x as f64, self.roi_y as f64))
    }
}

/// Point id to the opaque ROI image filename.
pub type RoiFilenameMap = IndexMap<AnnotationId, String>;

/// Crop placement around points.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RoiExtractor {
    /// Minimum absolute crop size, `[w, h]`, applied before centering.
    pub min_roi_size: [u32; 2],
}

impl RoiExtractor {
    /// Centers a crop of the estimated label size on the point.
    ///
    /// The point is truncated to integer pixels. The crop is clamped to the image and is
    /// never empty.
    pub fn compute(
        &self,
        point: &PointAnnotation,
        original_image_key: u64,
        image_size: ImageSize,
        estimations: &RoiSizeEstimations,
    ) -> Result<RoiInfo> {
        let rel_size: RelativeSize = estimations
            .get(&point.label_id())
            .copied()
            .ok_or_else(|| format_err!("no RoI size estimated for label {}", point.label_id()))?;
        let [min_w, min_h] = self.min_roi_size;

        let (roi_x, roi_w, point_x) = place_span(
            point.shape().x,
            rel_size.w() * image_size.w() as f64,
            min_w,
            image_size.w(),
        );
        let (roi_y, roi_h, point_y) = place_span(
            point.shape().y,
            rel_size.h() * image_size.h() as f64,
            min_h,
            image_size.h(),
        );

        Ok(RoiInfo {
            point_id: point.id,
            original_image_key,
            point_x,
            point_y,
            roi_x,
            roi_y,
            roi_w,
            roi_h,
        })
    }

    /// Computes the crops of all points of the dataset, in dataset order.
    pub fn prepare_rois(
        &self,
        points: &Dataset,
        estimations: &RoiSizeEstimations,
    ) -> Result<Vec<RoiInfo>> {
        let mut rois = vec![];
        for sample in points {
            let image_size = sample.image_size()?;
            for skeleton in sample.skeletons() {
                let point = skeleton.as_point().ok_or_else(|| {
                    format_err!(
                        "Sample '{}': point #{} must have exactly one element",
                        sample.id,
                        skeleton.id
                    )
                })?;
                let roi = self
                    .compute(&point, sample.original_key, image_size, estimations)
                    .with_context(|| format!("Sample '{}': point #{}", sample.id, point.id))?;
                rois.push(roi);
            }
        }
        Ok(rois)
    }
}

/// Places a span of the estimated size around `coord` on the `[0, limit]` axis.
///
/// Returns the span start, its length and the coordinate relative to the start.
fn place_span(coord: f64, estimate: f64, min_size: u32, limit: u32) -> (u32, u32, u32) {
    let limit = limit as i64;
    let pos = (coord.floor() as i64).clamp(0, limit);
    let size = estimate.max(min_size as f64).max(1.0);

    let mut start = (pos - (size / 2.0).floor() as i64).max(0);
    let end = (pos + (size / 2.0).ceil() as i64).min(limit);
    if end <= start {
        start = (end - 1).max(0);
    }

    (start as u32, (end - start) as u32, (pos - start) as u32)
}

/// Computes the crop of a point without a minimum crop size.
pub fn compute_roi(
    point: &PointAnnotation,
    original_image_key: u64,
    image_size: ImageSize,
    estimations: &RoiSizeEstimations,
) -> Result<RoiInfo> {
    RoiExtractor::default().compute(point, original_image_key, image_size, estimations)
}

/// Assigns a fresh random name with the given extension to every point.
///
/// The names carry nothing of the source sample, label or subset, and never repeat
/// across runs.
pub fn anonymize_filenames(
    point_ids: impl IntoIterator<Item = AnnotationId>,
    extension: &str,
) -> RoiFilenameMap {
    let extension = extension.trim_start_matches('.');
    point_ids
        .into_iter()
        .map(|point_id| (point_id, format!("{}.{}", Uuid::new_v4(), extension)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimations(rel_w: f64, rel_h: f64) -> RoiSizeEstimations {
        let mut map = RoiSizeEstimations::new();
        map.insert(0, HW::from_hw([rel_h, rel_w]));
        map
    }

    fn point(x: f64, y: f64) -> PointAnnotation {
        PointAnnotation::new(5, Point::new(x, y), 0)
    }

    #[test]
    fn crop_is_centered_on_point() {
        let roi = compute_roi(
            &point(100.4, 50.0),
            9,
            ImageSize::from_hw([100, 200]),
            &estimations(0.2, 0.3),
        )
        .unwrap();

        assert_eq!(roi.point_id, 5);
        assert_eq!(roi.original_image_key, 9);
        assert_eq!((roi.roi_x, roi.roi_w, roi.point_x), (80, 40, 20));
        assert_eq!((roi.roi_y, roi.roi_h, roi.point_y), (35, 30, 15));
    }

    #[test]
    fn full_image_sentinel_covers_image() {
        let image_size = ImageSize::from_hw([60, 80]);
        for (x, y) in [(0.0, 0.0), (40.0, 30.0), (80.0, 60.0), (13.7, 59.2)] {
            let roi = compute_roi(&point(x, y), 0, image_size, &estimations(2.0, 2.0)).unwrap();
            assert_eq!((roi.roi_x, roi.roi_y), (0, 0));
            assert_eq!((roi.roi_w, roi.roi_h), (80, 60));
        }
    }

    #[test]
    fn min_size_is_applied() {
        let extractor = RoiExtractor {
            min_roi_size: [20, 10],
        };
        let roi = extractor
            .compute(
                &point(50.0, 50.0),
                0,
                ImageSize::from_hw([100, 100]),
                &estimations(0.01, 0.01),
            )
            .unwrap();
        assert_eq!((roi.roi_w, roi.roi_h), (20, 10));
    }

    #[test]
    fn missing_estimation_is_an_error() {
        let unknown = PointAnnotation::new(1, Point::new(1.0, 1.0), 3);
        assert!(compute_roi(
            &unknown,
            0,
            ImageSize::from_hw([10, 10]),
            &estimations(0.5, 0.5)
        )
        .is_err());
    }

    #[test]
    fn crops_stay_in_image_and_round_trip() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..500 {
            let w = rng.gen_range(1..300u32);
            let h = rng.gen_range(1..300u32);
            let image_size = ImageSize::from_hw([h, w]);
            let x = rng.gen_range(0.0..=w as f64);
            let y = rng.gen_range(0.0..=h as f64);
            let est = estimations(rng.gen_range(0.0..2.5), rng.gen_range(0.0..2.5));
            let extractor = RoiExtractor {
                min_roi_size: [rng.gen_range(0..50), rng.gen_range(0..50)],
            };

            let roi = extractor.compute(&point(x, y), 0, image_size, &est).unwrap();

            assert!(roi.roi_w >= 1 && roi.roi_h >= 1);
            assert!(roi.roi_x + roi.roi_w <= w);
            assert!(roi.roi_y + roi.roi_h <= h);
            assert_eq!(roi.roi_x + roi.point_x, x.floor() as u32);
            assert_eq!(roi.roi_y + roi.point_y, y.floor() as u32);
        }
    }

    #[test]
    fn filenames_are_unique_and_opaque() {
        let names = anonymize_filenames(0..100, ".png");
        assert_eq!(names.len(), 100);
        let unique: HashSet<_> = names.values().collect();
        assert_eq!(unique.len(), 100);
        assert!(names.values().all(|name| name.ends_with(".png") && !name.contains("..")));

        assert!(names
            .values()
            .all(|name| Uuid::parse_str(name.trim_end_matches(".png")).is_ok()));
    }

    #[test]
    fn filenames_differ_between_runs() {
        let first = anonymize_filenames(1..=3, "png");
        let second = anonymize_filenames(900..=902, "png");
        let again = anonymize_filenames(1..=3, "png");

        let names: HashSet<_> = first
            .values()
            .chain(second.values())
            .chain(again.values())
            .collect();
        assert_eq!(names.len(), 9);
        assert_eq!(first.keys().collect::<Vec<_>>(), again.keys().collect::<Vec<_>>());
    }
}
