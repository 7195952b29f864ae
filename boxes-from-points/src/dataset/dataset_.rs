use super::*;
use crate::common::*;

/// Label and skeleton tables shared by all samples of a dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetCategories {
    pub labels: LabelCategories,
    pub points: PointsCategories,
}

/// An in-memory dataset keyed by `(id, subset)`, preserving insertion order.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    categories: DatasetCategories,
    samples: IndexMap<SampleKey, Sample>,
}

impl Dataset {
    pub fn new(categories: DatasetCategories) -> Self {
        Self {
            categories,
            samples: IndexMap::new(),
        }
    }

    /// An empty dataset with the same categories.
    pub fn empty_like(&self) -> Self {
        Self::new(self.categories.clone())
    }

    pub fn categories(&self) -> &DatasetCategories {
        &self.categories
    }

    pub fn labels(&self) -> &LabelCategories {
        &self.categories.labels
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.values()
    }

    pub fn get(&self, id: &str, subset: &str) -> Option<&Sample> {
        self.samples.get(&SampleKey::new(id, subset))
    }

    /// Inserts the sample, replacing the one with the same identity in place.
    pub fn put(&mut self, sample: Sample) {
        self.samples.insert(sample.key(), sample);
    }

    pub fn remove(&mut self, id: &str, subset: &str) -> Option<Sample> {
        self.samples.shift_remove(&SampleKey::new(id, subset))
    }

    /// Reorders the labels to follow `dst_labels`.
    ///
    /// Annotations of labels that are not kept are removed from their samples.
    pub fn project_labels(&mut self, dst_labels: &[String]) -> Result<()> {
        let projection = self.categories.labels.project(dst_labels)?;

        for sample in self.samples.values_mut() {
            sample.annotations = std::mem::take(&mut sample.annotations)
                .into_iter()
                .filter_map(|mut ann| {
                    let new_id = projection.map_id(ann.label_id())?;
                    ann.set_label_id(new_id);
                    Some(ann)
                })
                .collect();
        }

        self.categories = DatasetCategories {
            points: self.categories.points.remap(&projection),
            labels: projection.categories,
        };
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Sample;
    type IntoIter = indexmap::map::Values<'a, SampleKey, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.values()
    }
}
