use crate::{
    common::*,
    dataset::{Dataset, LabelId},
    utils::format_sequence,
};

/// Relative ROI size of a label, as fractions of the image height and width.
pub type RelativeSize = HW<f64>;

/// Estimated ROI sizes keyed by label id.
pub type RoiSizeEstimations = IndexMap<LabelId, RelativeSize>;

/// The full-image ROI. Halved during extraction, it covers the whole image from any point.
pub const DEFAULT_ROI_SIZE: [f64; 2] = [2.0, 2.0];

pub fn default_roi_size() -> RelativeSize {
    HW::from_hw(DEFAULT_ROI_SIZE)
}

/// Why a label uses the full-image ROI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FallbackReason {
    NoGt,
    TooFewGt,
    Unreliable,
}

impl Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NoGt => "no GT provided",
            Self::TooFewGt => "too few GT provided",
            Self::Unreliable => "estimated RoI is unreliable",
        };
        f.write_str(text)
    }
}

/// Per-label ROI sizing from matched GT boxes.
#[derive(Debug, Clone, PartialEq)]
pub struct RoiEstimator {
    pub min_class_samples: usize,
    pub size_multiplier: f64,
    /// The largest relative box side accepted before falling back to the full image.
    pub max_class_roi_image_side: Option<f64>,
}

impl Default for RoiEstimator {
    fn default() -> Self {
        Self {
            min_class_samples: 25,
            size_multiplier: 1.1,
            max_class_roi_image_side: Some(0.5),
        }
    }
}

/// Estimated sizes together with the labels that fell back to the default size.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoiEstimation {
    pub sizes: RoiSizeEstimations,
    pub fallbacks: IndexMap<LabelId, FallbackReason>,
}

impl RoiEstimation {
    /// The fallback labels grouped by reason, listing at most `max_items` names per
    /// reason.
    pub fn fallback_summary(&self, labels: &LabelCategories, max_items: usize) -> String {
        self.fallbacks
            .iter()
            .map(|(&label_id, &reason)| (reason, labels.name_of(label_id)))
            .into_group_map()
            .into_iter()
            .sorted_by_key(|(reason, _)| *reason)
            .map(|(reason, names)| {
                format!("{}: {}", reason, format_sequence(names, max_items, ", "))
            })
            .join("; ")
    }
}

impl RoiEstimator {
    /// Estimates the sizes from `(label, box, image size)` triples.
    pub fn estimate_boxes<I>(&self, boxes: I) -> RoiEstimation
    where
        I: IntoIterator<Item = (LabelId, XYWH<f64>, ImageSize)>,
    {
        let relative_sizes = boxes
            .into_iter()
            .map(|(label_id, rect, image_size)| {
                let rel_w = rect.w() / image_size.w() as f64;
                let rel_h = rect.h() / image_size.h() as f64;
                (label_id, [rel_h, rel_w])
            })
            .into_group_map();

        let mut estimation = RoiEstimation::default();
        for (label_id, sizes) in relative_sizes.into_iter().sorted_by_key(|(id, _)| *id) {
            if sizes.len() < self.min_class_samples {
                estimation.sizes.insert(label_id, default_roi_size());
                estimation
                    .fallbacks
                    .insert(label_id, FallbackReason::TooFewGt);
                continue;
            }

            let [max_h, max_w] = sizes.iter().fold([0.0f64, 0.0f64], |[mh, mw], &[h, w]| {
                [mh.max(h), mw.max(w)]
            });

            let unreliable = self
                .max_class_roi_image_side
                .map(|limit| max_h > limit || max_w > limit)
                .unwrap_or(false);
            if unreliable {
                estimation.sizes.insert(label_id, default_roi_size());
                estimation
                    .fallbacks
                    .insert(label_id, FallbackReason::Unreliable);
                continue;
            }

            let size = HW::from_hw([max_h * self.size_multiplier, max_w * self.size_multiplier]);
            estimation.sizes.insert(label_id, size);
        }

        estimation
    }

    /// Estimates the sizes of every top-level label of the matched GT.
    ///
    /// Image sizes are taken from the points dataset. Labels without matched boxes use
    /// the default size. Fallbacks are logged grouped by reason, with at most `max_items`
    /// label names per reason.
    pub fn estimate(
        &self,
        matched_gt: &Dataset,
        points: &Dataset,
        max_items: usize,
    ) -> Result<RoiSizeEstimations> {
        let mut boxes = vec![];
        for sample in matched_gt {
            let image_size = points
                .get(&sample.id, &sample.subset)
                .unwrap_or(sample)
                .image_size()?;
            boxes.extend(
                sample
                    .boxes()
                    .map(|bbox| (bbox.label_id(), *bbox.shape(), image_size)),
            );
        }

        let mut estimation = self.estimate_boxes(boxes);

        for (label_id, _) in matched_gt.labels().top_level() {
            if !estimation.sizes.contains_key(&label_id) {
                estimation.sizes.insert(label_id, default_roi_size());
                estimation.fallbacks.insert(label_id, FallbackReason::NoGt);
            }
        }
        estimation.sizes.sort_keys();

        if !estimation.fallbacks.is_empty() {
            warn!(
                "Some classes will use the full image instead of RoI - {}",
                estimation.fallback_summary(matched_gt.labels(), max_items)
            );
        }

        let RoiEstimation { sizes, .. } = estimation;

        for (label_id, size) in &sizes {
            debug!(
                label = matched_gt.labels().name_of(*label_id),
                rel_w = size.w(),
                rel_h = size.h(),
                "estimated RoI size"
            );
        }

        Ok(sizes)
    }
}

/// Estimates the ROI size of every label seen in `boxes`.
///
/// Labels with fewer than `min_samples_for_estimation` boxes get [`DEFAULT_ROI_SIZE`].
/// Otherwise the per-axis maximum of the relative box sides is scaled by
/// `size_multiplier`.
pub fn estimate_roi_sizes<I>(
    boxes: I,
    min_samples_for_estimation: usize,
    size_multiplier: f64,
) -> RoiSizeEstimations
where
    I: IntoIterator<Item = (LabelId, XYWH<f64>, ImageSize)>,
{
    RoiEstimator {
        min_class_samples: min_samples_for_estimation,
        size_multiplier,
        max_class_roi_image_side: None,
    }
    .estimate_boxes(boxes)
    .sizes
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn image_size() -> ImageSize {
        ImageSize::from_hw([100, 200])
    }

    #[test]
    fn few_samples_use_full_image() {
        let boxes = (0..10).map(|i| {
            let rect = XYWH::from_xywh([0.0, 0.0, 10.0 + i as f64, 5.0]);
            (1, rect, image_size())
        });
        let sizes = estimate_roi_sizes(boxes, 50, 1.1);
        assert_eq!(sizes[&1].hw(), DEFAULT_ROI_SIZE);
    }

    #[test]
    fn per_axis_maximum_is_scaled() {
        let boxes = vec![
            (0, XYWH::from_xywh([0.0, 0.0, 40.0, 10.0]), image_size()),
            (0, XYWH::from_xywh([5.0, 5.0, 20.0, 30.0]), image_size()),
            (0, XYWH::from_xywh([1.0, 1.0, 10.0, 10.0]), image_size()),
        ];
        let sizes = estimate_roi_sizes(boxes, 3, 1.1);
        assert_abs_diff_eq!(sizes[&0].w(), 0.2 * 1.1, epsilon = 1e-9);
        assert_abs_diff_eq!(sizes[&0].h(), 0.3 * 1.1, epsilon = 1e-9);
    }

    #[test]
    fn large_boxes_are_unreliable() {
        let estimator = RoiEstimator {
            min_class_samples: 1,
            size_multiplier: 1.1,
            max_class_roi_image_side: Some(0.5),
        };
        let estimation = estimator.estimate_boxes(vec![
            (0, XYWH::from_xywh([0.0, 0.0, 150.0, 10.0]), image_size()),
            (1, XYWH::from_xywh([0.0, 0.0, 20.0, 10.0]), image_size()),
        ]);
        assert_eq!(estimation.sizes[&0].hw(), DEFAULT_ROI_SIZE);
        assert_eq!(estimation.fallbacks.get(&0), Some(&FallbackReason::Unreliable));
        assert_abs_diff_eq!(estimation.sizes[&1].w(), 0.11, epsilon = 1e-9);
        assert!(estimation.fallbacks.get(&1).is_none());
    }

    #[test]
    fn fallback_summary_is_bounded() {
        let labels = LabelCategories::from_names(["cat", "dog", "fox", "owl"]).unwrap();
        let estimation = RoiEstimation {
            sizes: Default::default(),
            fallbacks: [
                (0, FallbackReason::NoGt),
                (1, FallbackReason::NoGt),
                (2, FallbackReason::NoGt),
                (3, FallbackReason::Unreliable),
            ]
            .into_iter()
            .collect(),
        };

        assert_eq!(
            estimation.fallback_summary(&labels, 1),
            "no GT provided: cat (and 2 more); estimated RoI is unreliable: owl"
        );
        assert_eq!(
            estimation.fallback_summary(&labels, 5),
            "no GT provided: cat, dog, fox; estimated RoI is unreliable: owl"
        );
    }
}
