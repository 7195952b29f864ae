//! Partitioning of the ROI images into annotation jobs.

use crate::{common::*, error::ValidationError};

/// Ordered jobs, each an ordered list of ROI filenames.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobLayout {
    pub jobs: Vec<Vec<String>>,
}

impl JobLayout {
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[String]> {
        self.jobs.iter().map(Vec::as_slice)
    }
}

/// Splits the data filenames into shuffled jobs of `job_size` items, adding `val_size`
/// GT filenames drawn at random to every job.
///
/// Data filenames that are also GT filenames are not annotated. Every data filename
/// lands in exactly one job; GT filenames can repeat across jobs.
pub fn build_job_layout<R>(
    data_filenames: &[String],
    gt_filenames: &[String],
    job_size: NonZeroUsize,
    val_size: usize,
    rng: &mut R,
) -> Result<JobLayout>
where
    R: Rng,
{
    let gt_set: IndexSet<&String> = gt_filenames.iter().collect();
    if val_size > gt_set.len() {
        return Err(ValidationError::InsufficientGroundTruth(format!(
            "too few GT samples to seed every job ({} available, {} required per job)",
            gt_set.len(),
            val_size
        ))
        .into());
    }

    let mut data_pool: Vec<&String> = data_filenames
        .iter()
        .filter(|name| !gt_set.contains(name))
        .collect();
    data_pool.shuffle(rng);

    let gt_pool: Vec<&String> = gt_set.into_iter().collect();

    let jobs = data_pool
        .chunks(job_size.get())
        .map(|chunk| {
            let mut job: Vec<String> = chunk
                .iter()
                .copied()
                .chain(gt_pool.choose_multiple(&mut *rng, val_size).copied())
                .cloned()
                .collect();
            job.shuffle(&mut *rng);
            job
        })
        .collect();

    Ok(JobLayout { jobs })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(prefix: &str, count: usize) -> Vec<String> {
        (0..count).map(|i| format!("{}{}.png", prefix, i)).collect()
    }

    #[test]
    fn jobs_are_filled_with_decoys() {
        let data = names("d", 23);
        let gt = names("g", 5);
        let mut rng = StdRng::seed_from_u64(42);

        let layout =
            build_job_layout(&data, &gt, NonZeroUsize::new(10).unwrap(), 2, &mut rng).unwrap();

        let sizes: Vec<_> = layout.iter().map(|job| job.len()).collect();
        assert_eq!(sizes, vec![12, 12, 5]);

        let mut seen_data = vec![];
        for job in layout.iter() {
            let decoys: Vec<_> = job.iter().filter(|name| gt.contains(name)).collect();
            assert_eq!(decoys.len(), 2);
            assert_eq!(decoys.iter().unique().count(), 2);
            seen_data.extend(job.iter().filter(|name| data.contains(name)).cloned());
        }
        seen_data.sort();
        let mut expected = data.clone();
        expected.sort();
        assert_eq!(seen_data, expected);
    }

    #[test]
    fn gt_names_are_not_annotated() {
        let mut data = names("d", 4);
        data.push("g0.png".into());
        let gt = names("g", 2);
        let mut rng = StdRng::seed_from_u64(1);

        let layout =
            build_job_layout(&data, &gt, NonZeroUsize::new(10).unwrap(), 1, &mut rng).unwrap();
        assert_eq!(layout.len(), 1);
        assert_eq!(layout.jobs[0].len(), 5);
    }

    #[test]
    fn repeated_gt_names_are_one_decoy() {
        let gt: Vec<String> = ["g0.png", "g1.png", "g0.png", "g1.png", "g0.png"]
            .iter()
            .map(|name| name.to_string())
            .collect();
        let mut data = names("d", 50);
        data.extend(gt.iter().cloned());
        let mut rng = StdRng::seed_from_u64(9);

        let layout =
            build_job_layout(&data, &gt, NonZeroUsize::new(8).unwrap(), 2, &mut rng).unwrap();

        assert_eq!(layout.len(), 7);
        for job in layout.iter() {
            let mut decoys: Vec<_> = job.iter().filter(|name| gt.contains(name)).collect();
            decoys.sort();
            assert_eq!(decoys, vec!["g0.png", "g1.png"]);
        }
        assert_eq!(layout.iter().map(|job| job.len()).sum::<usize>(), 50 + 7 * 2);
    }

    #[test]
    fn too_few_gt_fails() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = build_job_layout(
            &names("d", 3),
            &names("g", 1),
            NonZeroUsize::new(2).unwrap(),
            2,
            &mut rng,
        )
        .unwrap_err();
        let err = err.downcast::<ValidationError>().unwrap();
        assert_eq!(err.kind(), crate::error::ErrorKind::InsufficientGroundTruth);
    }

    #[test]
    fn layout_is_reproducible_with_seed() {
        let data = names("d", 30);
        let gt = names("g", 6);
        let build = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            build_job_layout(&data, &gt, NonZeroUsize::new(7).unwrap(), 3, &mut rng).unwrap()
        };
        assert_eq!(build(5), build(5));
    }
}
