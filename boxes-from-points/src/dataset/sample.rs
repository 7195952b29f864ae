use crate::common::*;

pub type AnnotationId = u64;
pub type LabelId = usize;

/// An annotation with a stable per-dataset id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotated<G> {
    pub id: AnnotationId,
    pub label: Label<G, LabelId>,
}

impl<G> Annotated<G> {
    pub fn new(id: AnnotationId, shape: G, class: LabelId) -> Self {
        Self {
            id,
            label: Label::new(shape, class),
        }
    }

    pub fn label_id(&self) -> LabelId {
        self.label.class
    }

    pub fn shape(&self) -> &G {
        &self.label.shape
    }
}

/// A GT box in pixel space.
pub type BoxAnnotation = Annotated<XYWH<f64>>;

/// A single point hint in pixel space.
pub type PointAnnotation = Annotated<Point<f64>>;

/// A skeleton as stored in point datasets. Valid point annotations have exactly one element.
pub type SkeletonAnnotation = Annotated<Vec<Point<f64>>>;

impl SkeletonAnnotation {
    /// The point of a single-element skeleton.
    pub fn as_point(&self) -> Option<PointAnnotation> {
        match self.shape().as_slice() {
            [point] => Some(PointAnnotation::new(self.id, *point, self.label_id())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Annotation {
    Bbox(BoxAnnotation),
    Skeleton(SkeletonAnnotation),
}

impl Annotation {
    pub fn id(&self) -> AnnotationId {
        match self {
            Self::Bbox(ann) => ann.id,
            Self::Skeleton(ann) => ann.id,
        }
    }

    pub fn label_id(&self) -> LabelId {
        match self {
            Self::Bbox(ann) => ann.label_id(),
            Self::Skeleton(ann) => ann.label_id(),
        }
    }

    pub fn set_label_id(&mut self, label_id: LabelId) {
        match self {
            Self::Bbox(ann) => ann.label.class = label_id,
            Self::Skeleton(ann) => ann.label.class = label_id,
        }
    }
}

/// The image a sample refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// The file name relative to the data bucket prefix.
    pub path: String,
    pub size: Option<ImageSize>,
}

/// One source image with its annotations. Identity is `(id, subset)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: String,
    pub subset: String,
    pub image: ImageInfo,
    /// The image id in the source annotation file.
    pub original_key: u64,
    pub annotations: Vec<Annotation>,
}

impl Sample {
    pub fn key(&self) -> SampleKey {
        SampleKey {
            id: self.id.clone(),
            subset: self.subset.clone(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.image.path
    }

    pub fn image_size(&self) -> Result<ImageSize> {
        self.image
            .size
            .ok_or_else(|| format_err!("sample '{}' has no image size", self.id))
    }

    pub fn boxes(&self) -> impl Iterator<Item = &BoxAnnotation> {
        self.annotations.iter().filter_map(|ann| match ann {
            Annotation::Bbox(bbox) => Some(bbox),
            _ => None,
        })
    }

    pub fn skeletons(&self) -> impl Iterator<Item = &SkeletonAnnotation> {
        self.annotations.iter().filter_map(|ann| match ann {
            Annotation::Skeleton(skeleton) => Some(skeleton),
            _ => None,
        })
    }

    /// Copies the sample with a new annotation list.
    pub fn wrap(&self, annotations: Vec<Annotation>) -> Self {
        Self {
            annotations,
            ..self.clone()
        }
    }
}

/// The `(id, subset)` identity of a sample.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SampleKey {
    pub id: String,
    pub subset: String,
}

impl SampleKey {
    pub fn new(id: impl Into<String>, subset: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            subset: subset.into(),
        }
    }
}

impl Display for SampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.subset, self.id)
    }
}
