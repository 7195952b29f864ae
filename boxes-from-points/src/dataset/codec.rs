use super::*;
use crate::common::*;

/// Annotation file formats understood by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetFormat {
    /// COCO instances, carrying boxes.
    CocoInstances,
    /// COCO person keypoints, carrying skeletons.
    CocoPersonKeypoints,
}

/// Reads and writes datasets in a concrete annotation file format.
pub trait DatasetCodec {
    fn parse(&self, data: &[u8], format: DatasetFormat) -> Result<Dataset>;

    fn export(&self, dataset: &Dataset, format: DatasetFormat) -> Result<Vec<u8>>;

    fn import_from(&self, path: &Path, format: DatasetFormat) -> Result<Dataset> {
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read annotation file '{}'", path.display()))?;
        self.parse(&data, format)
            .with_context(|| format!("failed to parse annotation file '{}'", path.display()))
    }

    fn export_to(&self, dataset: &Dataset, path: &Path, format: DatasetFormat) -> Result<()> {
        let data = self.export(dataset, format)?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write annotation file '{}'", path.display()))
    }
}
