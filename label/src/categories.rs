use anyhow::{ensure, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A named label, optionally nested under a parent label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelDef {
    pub name: String,
    pub parent: Option<String>,
}

impl LabelDef {
    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }
}

/// The ordered label table of a dataset. Label ids are indices into the table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCategories {
    items: Vec<LabelDef>,
}

impl LabelCategories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table of top-level labels.
    pub fn from_names<S>(names: impl IntoIterator<Item = S>) -> Result<Self>
    where
        S: Into<String>,
    {
        let mut categories = Self::new();
        for name in names {
            categories.add(name, None)?;
        }
        Ok(categories)
    }

    /// Appends a label and returns its id.
    pub fn add(&mut self, name: impl Into<String>, parent: Option<String>) -> Result<usize> {
        let name = name.into();
        ensure!(
            self.find(&name, parent.as_deref()).is_none(),
            "duplicated label '{}'",
            name
        );
        if let Some(parent) = &parent {
            ensure!(
                self.find(parent, None).is_some(),
                "parent label '{}' of '{}' is not defined",
                parent,
                name
            );
        }
        self.items.push(LabelDef { name, parent });
        Ok(self.items.len() - 1)
    }

    pub fn find(&self, name: &str, parent: Option<&str>) -> Option<usize> {
        self.items
            .iter()
            .position(|label| label.name == name && label.parent.as_deref() == parent)
    }

    pub fn get(&self, id: usize) -> Option<&LabelDef> {
        self.items.get(id)
    }

    /// The label name, or a placeholder for an unknown id.
    pub fn name_of(&self, id: usize) -> &str {
        self.items
            .get(id)
            .map(|label| label.name.as_str())
            .unwrap_or("<unknown>")
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &LabelDef)> {
        self.items.iter().enumerate()
    }

    pub fn top_level(&self) -> impl Iterator<Item = (usize, &LabelDef)> {
        self.iter().filter(|(_, label)| label.is_top_level())
    }

    /// Reorders the table to follow `dst_labels`.
    ///
    /// Top-level labels take the order of `dst_labels`, including names unknown to this
    /// table. Top-level labels absent from `dst_labels` are dropped together with their
    /// children. Children of kept labels follow in their original order.
    pub fn project(&self, dst_labels: &[String]) -> Result<LabelProjection> {
        let mut categories = LabelCategories::new();
        for name in dst_labels {
            categories.add(name.as_str(), None)?;
        }

        let kept_children: Vec<_> = self
            .items
            .iter()
            .filter_map(|label| {
                let parent = label.parent.as_ref()?;
                dst_labels.contains(parent).then(|| label.clone())
            })
            .collect();
        for child in kept_children {
            categories.add(child.name, child.parent)?;
        }

        let mapping = self
            .items
            .iter()
            .map(|label| categories.find(&label.name, label.parent.as_deref()))
            .collect();

        Ok(LabelProjection {
            categories,
            mapping,
        })
    }
}

/// The outcome of [`LabelCategories::project`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelProjection {
    pub categories: LabelCategories,
    /// Old label id to new label id, `None` for dropped labels.
    pub mapping: Vec<Option<usize>>,
}

impl LabelProjection {
    pub fn map_id(&self, id: usize) -> Option<usize> {
        self.mapping.get(id).copied().flatten()
    }
}

/// The keypoint names of a skeleton label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsCategory {
    pub labels: Vec<String>,
}

/// Skeleton layouts keyed by the id of the top-level label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PointsCategories {
    pub items: IndexMap<usize, PointsCategory>,
}

impl PointsCategories {
    pub fn insert(&mut self, label_id: usize, labels: Vec<String>) {
        self.items.insert(label_id, PointsCategory { labels });
    }

    pub fn get(&self, label_id: usize) -> Option<&PointsCategory> {
        self.items.get(&label_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &PointsCategory)> {
        self.items.iter().map(|(&id, category)| (id, category))
    }

    /// Rewrites the label ids after a projection, dropping entries of removed labels.
    pub fn remap(&self, projection: &LabelProjection) -> Self {
        let items = self
            .items
            .iter()
            .filter_map(|(&id, category)| Some((projection.map_id(id)?, category.clone())))
            .collect();
        Self { items }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn projection_follows_destination_order() {
        let mut cats = LabelCategories::new();
        cats.add("dog", None).unwrap();
        cats.add("cat", None).unwrap();
        cats.add("nose", Some("dog".into())).unwrap();
        cats.add("nose", Some("cat".into())).unwrap();

        let projection = cats.project(&names(&["cat", "bird", "dog"])).unwrap();
        let projected: Vec<_> = projection
            .categories
            .iter()
            .map(|(_, label)| (label.name.as_str(), label.parent.as_deref()))
            .collect();
        assert_eq!(
            projected,
            vec![
                ("cat", None),
                ("bird", None),
                ("dog", None),
                ("nose", Some("dog")),
                ("nose", Some("cat")),
            ]
        );
        assert_eq!(projection.mapping, vec![Some(2), Some(0), Some(3), Some(4)]);
    }

    #[test]
    fn projection_drops_unlisted_labels() {
        let mut cats = LabelCategories::new();
        cats.add("dog", None).unwrap();
        cats.add("nose", Some("dog".into())).unwrap();
        cats.add("cat", None).unwrap();

        let projection = cats.project(&names(&["cat"])).unwrap();
        assert_eq!(projection.categories.len(), 1);
        assert_eq!(projection.mapping, vec![None, None, Some(0)]);

        let mut points = PointsCategories::default();
        points.insert(0, vec!["nose".into()]);
        points.insert(2, vec!["tail".into()]);
        let remapped = points.remap(&projection);
        assert_eq!(remapped.items.len(), 1);
        assert_eq!(remapped.get(0).unwrap().labels, vec!["tail".to_string()]);
    }

    #[test]
    fn duplicated_label_is_rejected() {
        let mut cats = LabelCategories::from_names(["cat"]).unwrap();
        assert!(cats.add("cat", None).is_err());
        assert!(cats.add("paw", Some("dog".into())).is_err());
    }
}
