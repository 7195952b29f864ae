//! Pipeline configuration format.

use crate::{
    common::*,
    dataset::DatasetFormat,
    roi::{LocatorMarker, RoiEstimator, RoiExtractor},
    utils::LIST_DISPLAY_THRESHOLD,
};

/// The main pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The key prefix of all files produced by the run.
    pub run_id: String,
    pub manifest: ManifestConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub roi: RoiConfig,
    #[serde(default)]
    pub marker: LocatorMarker,
    /// Seed of the job layout shuffling. Drawn from entropy if absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Config {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let config: Self = json5::from_str(&text)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        ensure!(!self.run_id.trim().is_empty(), "run_id must not be empty");
        ensure!(
            !self.manifest.labels.is_empty(),
            "the manifest must define at least one label"
        );
        if let Some(dup) = self.manifest.labels.iter().duplicates().next() {
            bail!("duplicated manifest label '{}'", dup);
        }
        let threshold = self.validation.max_discarded_threshold.raw();
        ensure!(
            (0.0..=1.0).contains(&threshold),
            "max_discarded_threshold must be in [0, 1], but get {}",
            threshold
        );
        ensure!(
            self.roi.roi_size_multiplier.raw() > 0.0,
            "roi_size_multiplier must be positive"
        );
        Ok(())
    }

    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// The task manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestConfig {
    /// Task labels in order.
    pub labels: Vec<String>,
    /// The number of data images per job.
    pub job_size: NonZeroUsize,
    /// The number of GT images added to every job.
    pub val_size: usize,
    /// The prefix of data images in the source bucket.
    pub data_prefix: String,
    /// The key of the GT annotation file in the source bucket.
    pub gt_key: String,
    /// The key of the points annotation file in the source bucket.
    pub points_key: String,
    #[serde(default = "default_gt_format")]
    pub gt_format: DatasetFormat,
    #[serde(default = "default_points_format")]
    pub points_format: DatasetFormat,
}

fn default_gt_format() -> DatasetFormat {
    DatasetFormat::CocoInstances
}

fn default_points_format() -> DatasetFormat {
    DatasetFormat::CocoPersonKeypoints
}

/// Local directories standing for the storage buckets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub source_dir: PathBuf,
    pub oracle_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// The largest tolerated fraction of discarded GT boxes or points.
    pub max_discarded_threshold: R64,
    /// The maximum number of items listed in a message.
    pub list_display_threshold: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_discarded_threshold: r64(0.5),
            list_display_threshold: LIST_DISPLAY_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoiConfig {
    pub min_class_samples_for_roi_estimation: usize,
    pub roi_size_multiplier: R64,
    pub max_class_roi_image_side: Option<R64>,
    /// Minimum ROI size in pixels, `[w, h]`.
    pub min_roi_size: [u32; 2],
    pub file_extension: String,
}

impl Default for RoiConfig {
    fn default() -> Self {
        Self {
            min_class_samples_for_roi_estimation: 25,
            roi_size_multiplier: r64(1.1),
            max_class_roi_image_side: Some(r64(0.5)),
            min_roi_size: [0, 0],
            file_extension: "png".into(),
        }
    }
}

impl RoiConfig {
    pub fn estimator(&self) -> RoiEstimator {
        RoiEstimator {
            min_class_samples: self.min_class_samples_for_roi_estimation,
            size_multiplier: self.roi_size_multiplier.raw(),
            max_class_roi_image_side: self.max_class_roi_image_side.map(|side| side.raw()),
        }
    }

    pub fn extractor(&self) -> RoiExtractor {
        RoiExtractor {
            min_roi_size: self.min_roi_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        // only the required sections
        run_id: "run-1",
        manifest: {
            labels: ["cat", "dog"],
            job_size: 10,
            val_size: 2,
            data_prefix: "data/",
            gt_key: "annotations/gt.json",
            points_key: "annotations/points.json",
        },
        storage: {
            source_dir: "/tmp/source",
            oracle_dir: "/tmp/oracle",
        },
    }"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: Config = json5::from_str(MINIMAL).unwrap();
        config.check().unwrap();

        assert_eq!(config.manifest.job_size.get(), 10);
        assert_eq!(config.manifest.gt_format, DatasetFormat::CocoInstances);
        assert_eq!(config.validation.max_discarded_threshold, r64(0.5));
        assert_eq!(config.validation.list_display_threshold, 5);
        assert_eq!(config.roi.estimator(), RoiEstimator::default());
        assert_eq!(config.roi.file_extension, "png");
        assert_eq!(config.marker, LocatorMarker::default());
        assert!(config.seed.is_none());
    }

    #[test]
    fn zero_job_size_is_rejected() {
        let text = MINIMAL.replace("job_size: 10", "job_size: 0");
        assert!(json5::from_str::<Config>(&text).is_err());
    }

    #[test]
    fn duplicated_labels_are_rejected() {
        let text = MINIMAL.replace(r#"["cat", "dog"]"#, r#"["cat", "cat"]"#);
        let config: Config = json5::from_str(&text).unwrap();
        assert!(config.check().is_err());
    }

    #[test]
    fn open_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json5");
        std::fs::write(&path, MINIMAL.replace("run-1", "run-2")).unwrap();
        assert_eq!(Config::open(&path).unwrap().run_id, "run-2");
    }
}
