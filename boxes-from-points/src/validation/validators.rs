use super::DiscardLog;
use crate::{
    common::*,
    dataset::{Annotation, Dataset, DatasetCategories},
    error::{ValidationError, ValidationResult},
    utils::format_sequence,
};

/// Checks that the top-level dataset labels are known task labels, then reorders the
/// dataset labels to follow `manifest_labels`.
///
/// Task labels missing from the dataset are kept with zero instances.
pub fn validate_label_set(
    dataset: &mut Dataset,
    manifest_labels: &[String],
    max_items: usize,
) -> ValidationResult<()> {
    let manifest: HashSet<_> = manifest_labels.iter().map(String::as_str).collect();
    let unknown: Vec<_> = dataset
        .labels()
        .top_level()
        .map(|(_, label)| label.name.as_str())
        .filter(|name| !manifest.contains(name))
        .collect();

    if !unknown.is_empty() {
        return Err(ValidationError::InvalidCategories(format!(
            "dataset labels do not match task labels. Unknown labels: {}",
            format_sequence(unknown, max_items, ", ")
        )));
    }

    dataset
        .project_labels(manifest_labels)
        .map_err(|err| ValidationError::InvalidCategories(format!("{:#}", err)))
}

/// Checks that every skeleton category defines exactly one point.
pub fn validate_point_categories(
    categories: &DatasetCategories,
    max_items: usize,
) -> ValidationResult<()> {
    let invalid: Vec<_> = categories
        .points
        .iter()
        .filter(|(_, category)| category.labels.len() != 1)
        .map(|(label_id, category)| {
            format!(
                "Category '{}' (#{}): too many skeleton points ({}), only 1 expected",
                categories.labels.name_of(label_id),
                label_id,
                category.labels.len()
            )
        })
        .collect();

    if !invalid.is_empty() {
        return Err(ValidationError::InvalidCategories(format!(
            "invalid categories in the input point annotations: {}",
            format_sequence(invalid, max_items, "; ")
        )));
    }
    Ok(())
}

/// Checks that every annotated file in `found` exists among the `expected` data files
/// and that at least `min_count` of them do.
pub fn validate_filenames(
    expected: &HashSet<String>,
    found: &HashSet<String>,
    min_count: usize,
    max_items: usize,
) -> ValidationResult<()> {
    let matched: HashSet<_> = found.intersection(expected).collect();

    if matched.len() < found.len() {
        let missing: Vec<_> = found
            .iter()
            .filter(|name| !matched.contains(name))
            .sorted()
            .map(|name| {
                Path::new(name)
                    .file_name()
                    .map(|base| base.to_string_lossy().into_owned())
                    .unwrap_or_else(|| name.clone())
            })
            .collect();
        return Err(ValidationError::MismatchingAnnotations(format!(
            "failed to find several samples in the dataset files: {}",
            format_sequence(missing, max_items, ", ")
        )));
    }

    if matched.len() < min_count {
        return Err(ValidationError::TooFewSamples(format!(
            "too few samples provided ({}), at least {} required",
            matched.len(),
            min_count
        )));
    }

    Ok(())
}

/// Drops GT boxes with repeated annotation ids.
///
/// Bounds are checked per sample during matching, where an out-of-bounds box discards
/// the whole sample.
pub fn validate_gt_annotations(
    dataset: &mut Dataset,
    max_discard_fraction: f64,
    max_items: usize,
) -> ValidationResult<DiscardLog> {
    let mut log = DiscardLog::default();
    let mut visited_ids = HashSet::new();
    let mut updates = vec![];

    for sample in dataset.iter() {
        let mut valid = vec![];
        let mut total = 0;

        for bbox in sample.boxes() {
            total += 1;
            if !visited_ids.insert(bbox.id) {
                log.add(
                    sample.key(),
                    format!(
                        "Sample '{}': GT bbox #{} ({}) skipped - repeated annotation id",
                        sample.id,
                        bbox.id,
                        dataset.labels().name_of(bbox.label_id())
                    ),
                );
                continue;
            }
            valid.push(Annotation::Bbox(bbox.clone()));
        }

        log.total_count += total;
        log.excluded_count += total - valid.len();
        if valid.len() != total {
            updates.push(sample.wrap(valid));
        }
    }

    apply_updates(dataset, updates);
    log.log("Some GT boxes", max_items);

    if log.exceeds(max_discard_fraction) {
        return Err(ValidationError::TooFewSamples(format!(
            "too many GT boxes discarded, canceling job creation. Errors: {}",
            log.summary(max_items, "; ")
        )));
    }

    Ok(log)
}

/// Excludes point annotations that lie outside `[0, image_width] x [0, image_height]`,
/// repeat an annotation id, or do not hold exactly one point.
///
/// Fails when the excluded fraction exceeds `max_discard_fraction`. Otherwise the
/// excluded points are removed, along with samples left without points.
pub fn validate_point_bounds(
    dataset: &mut Dataset,
    max_discard_fraction: f64,
    max_items: usize,
) -> ValidationResult<DiscardLog> {
    let mut log = DiscardLog::default();
    let mut visited_ids = HashSet::new();
    let mut updates = vec![];

    for sample in dataset.iter() {
        let image_size = sample
            .image_size()
            .map_err(|err| ValidationError::InvalidImageInfo(err.to_string()))?
            .try_cast::<f64>()
            .ok_or_else(|| {
                ValidationError::InvalidImageInfo(format!("sample '{}': bad image size", sample.id))
            })?;
        let frame = image_size.frame();

        let mut valid = vec![];
        let mut total = 0;

        for skeleton in sample.skeletons() {
            total += 1;
            let label_name = dataset.labels().name_of(skeleton.label_id());

            let problem = if !visited_ids.insert(skeleton.id) {
                Some(format!("repeated annotation id ({})", skeleton.id))
            } else {
                match skeleton.as_point() {
                    None => Some(format!(
                        "invalid points count ({}), expected 1",
                        skeleton.shape().len()
                    )),
                    Some(point) if !frame.contains_point(point.shape()) => {
                        Some("coordinates are outside image".to_string())
                    }
                    Some(_) => None,
                }
            };

            match problem {
                Some(problem) => log.add(
                    sample.key(),
                    format!(
                        "Sample '{}': point #{} ({}) skipped - {}",
                        sample.id, skeleton.id, label_name, problem
                    ),
                ),
                None => valid.push(Annotation::Skeleton(skeleton.clone())),
            }
        }

        log.total_count += total;
        log.excluded_count += total - valid.len();
        if valid.len() != total {
            updates.push(sample.wrap(valid));
        }
    }

    if log.exceeds(max_discard_fraction) {
        return Err(ValidationError::InvalidDataset(format!(
            "too many points discarded ({} out of {}), canceling job creation. Errors: {}",
            log.excluded_count,
            log.total_count,
            log.summary(max_items, "; ")
        )));
    }

    apply_updates(dataset, updates);
    log.log("Some points", max_items);

    Ok(log)
}

/// Puts the updated samples back, removing those left without annotations.
fn apply_updates(dataset: &mut Dataset, updates: Vec<crate::dataset::Sample>) {
    for sample in updates {
        if sample.annotations.is_empty() {
            dataset.remove(&sample.id, &sample.subset);
        } else {
            dataset.put(sample);
        }
    }
}
