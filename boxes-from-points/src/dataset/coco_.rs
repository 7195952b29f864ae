use super::*;
use crate::common::*;

/// Codec of the Microsoft COCO annotation format.
#[derive(Debug, Clone)]
pub struct CocoCodec {
    /// The subset assigned to parsed samples.
    pub subset: String,
}

impl Default for CocoCodec {
    fn default() -> Self {
        Self {
            subset: "default".into(),
        }
    }
}

impl DatasetCodec for CocoCodec {
    fn parse(&self, data: &[u8], format: DatasetFormat) -> Result<Dataset> {
        let file: CocoFile = serde_json::from_slice(data)?;

        let mut categories = DatasetCategories::default();
        let mut category_id_to_label = HashMap::new();
        let coco_categories: Vec<_> = file
            .categories
            .iter()
            .sorted_by_key(|cat| cat.id)
            .collect();

        for cat in &coco_categories {
            let label_id = categories.labels.add(cat.name.as_str(), None)?;
            category_id_to_label.insert(cat.id, label_id);
        }
        if format == DatasetFormat::CocoPersonKeypoints {
            for cat in &coco_categories {
                let keypoints = cat.keypoints.clone().unwrap_or_default();
                for keypoint in &keypoints {
                    categories
                        .labels
                        .add(keypoint.as_str(), Some(cat.name.clone()))?;
                }
                categories
                    .points
                    .insert(category_id_to_label[&cat.id], keypoints);
            }
        }

        let mut annotations_per_image: HashMap<u64, Vec<Annotation>> = HashMap::new();
        for ann in &file.annotations {
            let label_id = *category_id_to_label.get(&ann.category_id).ok_or_else(|| {
                format_err!(
                    "annotation #{} refers to unknown category {}",
                    ann.id,
                    ann.category_id
                )
            })?;

            let annotation = match format {
                DatasetFormat::CocoInstances => {
                    let [x, y, w, h] = ann
                        .bbox
                        .ok_or_else(|| format_err!("annotation #{} has no bbox", ann.id))?;
                    let rect = XYWH::try_from_xywh([x, y, w, h])
                        .with_context(|| format!("invalid bbox in annotation #{}", ann.id))?;
                    Annotation::Bbox(BoxAnnotation::new(ann.id, rect, label_id))
                }
                DatasetFormat::CocoPersonKeypoints => {
                    let keypoints = ann.keypoints.as_deref().unwrap_or_default();
                    ensure!(
                        keypoints.len() % 3 == 0,
                        "annotation #{} has a malformed keypoint list",
                        ann.id
                    );
                    let points = keypoints
                        .chunks_exact(3)
                        .map(|triple| Point::new(triple[0], triple[1]))
                        .collect();
                    Annotation::Skeleton(SkeletonAnnotation::new(ann.id, points, label_id))
                }
            };

            annotations_per_image
                .entry(ann.image_id)
                .or_default()
                .push(annotation);
        }

        let known_images: HashSet<_> = file.images.iter().map(|img| img.id).collect();
        if let Some(image_id) = annotations_per_image
            .keys()
            .find(|image_id| !known_images.contains(image_id))
        {
            bail!("annotations refer to unknown image {}", image_id);
        }

        let mut dataset = Dataset::new(categories);
        for image in file.images {
            let CocoImage {
                id,
                file_name,
                width,
                height,
            } = image;
            let sample = Sample {
                id: strip_extension(&file_name),
                subset: self.subset.clone(),
                image: ImageInfo {
                    path: file_name,
                    size: Some(ImageSize::try_from_hw([height, width])?),
                },
                original_key: id,
                annotations: annotations_per_image.remove(&id).unwrap_or_default(),
            };
            ensure!(
                dataset.get(&sample.id, &sample.subset).is_none(),
                "duplicated image '{}'",
                sample.image.path
            );
            dataset.put(sample);
        }

        Ok(dataset)
    }

    fn export(&self, dataset: &Dataset, format: DatasetFormat) -> Result<Vec<u8>> {
        let labels = dataset.labels();
        let top_level: Vec<_> = labels.top_level().collect();
        let label_to_category: HashMap<_, _> = top_level
            .iter()
            .enumerate()
            .map(|(index, (label_id, _))| (*label_id, index as u64 + 1))
            .collect();

        let categories = top_level
            .iter()
            .map(|(label_id, label)| {
                let keypoints = (format == DatasetFormat::CocoPersonKeypoints).then(|| {
                    dataset
                        .categories()
                        .points
                        .get(*label_id)
                        .map(|cat| cat.labels.clone())
                        .unwrap_or_default()
                });
                CocoCategory {
                    id: label_to_category[label_id],
                    name: label.name.clone(),
                    supercategory: String::new(),
                    keypoints,
                }
            })
            .collect();

        let images = dataset
            .iter()
            .map(|sample| -> Result<_> {
                let [height, width] = sample.image_size()?.hw();
                Ok(CocoImage {
                    id: sample.original_key,
                    file_name: sample.image.path.clone(),
                    width,
                    height,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let annotations = dataset
            .iter()
            .flat_map(|sample| {
                sample
                    .annotations
                    .iter()
                    .map(move |ann| (sample.original_key, ann))
            })
            .filter_map(|(image_id, ann)| {
                let category_id = *label_to_category.get(&ann.label_id())?;
                let coco_ann = match (format, ann) {
                    (DatasetFormat::CocoInstances, Annotation::Bbox(bbox)) => {
                        let rect = bbox.shape();
                        CocoAnnotation {
                            id: bbox.id,
                            image_id,
                            category_id,
                            bbox: Some(rect.xywh()),
                            area: Some(rect.area()),
                            iscrowd: Some(0),
                            keypoints: None,
                            num_keypoints: None,
                        }
                    }
                    (DatasetFormat::CocoPersonKeypoints, Annotation::Skeleton(skeleton)) => {
                        let keypoints = skeleton
                            .shape()
                            .iter()
                            .flat_map(|point| [point.x, point.y, 2.0])
                            .collect();
                        CocoAnnotation {
                            id: skeleton.id,
                            image_id,
                            category_id,
                            bbox: None,
                            area: None,
                            iscrowd: Some(0),
                            keypoints: Some(keypoints),
                            num_keypoints: Some(skeleton.shape().len()),
                        }
                    }
                    _ => return None,
                };
                Some(coco_ann)
            })
            .collect();

        let file = CocoFile {
            images,
            annotations,
            categories,
        };
        Ok(serde_json::to_vec(&file)?)
    }
}

fn strip_extension(file_name: &str) -> String {
    let path = Path::new(file_name);
    match path.extension() {
        Some(ext) => file_name[..file_name.len() - ext.len() - 1].to_string(),
        None => file_name.to_string(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CocoFile {
    images: Vec<CocoImage>,
    #[serde(default)]
    annotations: Vec<CocoAnnotation>,
    categories: Vec<CocoCategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CocoImage {
    id: u64,
    file_name: String,
    width: u32,
    height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CocoCategory {
    id: u64,
    name: String,
    #[serde(default)]
    supercategory: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    keypoints: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CocoAnnotation {
    id: u64,
    image_id: u64,
    category_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bbox: Option<[f64; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    area: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iscrowd: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    keypoints: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    num_keypoints: Option<usize>,
}
