//! Common imports from external crates.

pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use bbox::{prelude::*, Point, Transform, HW, XYWH};
pub use indexmap::{IndexMap, IndexSet};
pub use itertools::{izip, Itertools as _};
pub use label::{Label, LabelCategories, PointsCategories};
pub use noisy_float::prelude::*;
pub use rand::{prelude::*, rngs::StdRng, seq::SliceRandom};
pub use serde::{de::DeserializeOwned, Deserialize, Serialize};
pub use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt::{self, Debug, Display},
    io::Cursor,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};
pub use tracing::{debug, info, info_span, warn};
pub use uuid::Uuid;

/// Image size in pixels.
pub type ImageSize = HW<u32>;
