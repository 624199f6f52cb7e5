//! COCO data model and split bookkeeping types

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Dataset partition an image is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    /// All splits in output order.
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }
}

impl std::fmt::Display for Split {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per split, addressed by [`Split`] rather than by position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerSplit<T> {
    pub train: T,
    pub val: T,
    pub test: T,
}

impl<T> PerSplit<T> {
    pub fn new(train: T, val: T, test: T) -> Self {
        Self { train, val, test }
    }

    /// Build each split's value from the split tag.
    pub fn from_fn(mut f: impl FnMut(Split) -> T) -> Self {
        Self {
            train: f(Split::Train),
            val: f(Split::Val),
            test: f(Split::Test),
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(Split, T) -> U) -> PerSplit<U> {
        PerSplit {
            train: f(Split::Train, self.train),
            val: f(Split::Val, self.val),
            test: f(Split::Test, self.test),
        }
    }

    pub fn as_ref(&self) -> PerSplit<&T> {
        PerSplit {
            train: &self.train,
            val: &self.val,
            test: &self.test,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Split, &T)> {
        Split::ALL.into_iter().map(move |split| (split, &self[split]))
    }
}

impl<T> Index<Split> for PerSplit<T> {
    type Output = T;

    fn index(&self, split: Split) -> &T {
        match split {
            Split::Train => &self.train,
            Split::Val => &self.val,
            Split::Test => &self.test,
        }
    }
}

impl<T> IndexMut<Split> for PerSplit<T> {
    fn index_mut(&mut self, split: Split) -> &mut T {
        match split {
            Split::Train => &mut self.train,
            Split::Val => &mut self.val,
            Split::Test => &mut self.test,
        }
    }
}

/// COCO dataset information block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Info {
    pub description: String,
    pub url: String,
    pub version: String,
    pub year: i32,
    pub contributor: String,
    pub date_created: String,
}

impl Default for Info {
    fn default() -> Self {
        let now = chrono::Utc::now();
        Self {
            description: "Open Images segmentation subset".to_string(),
            url: String::new(),
            version: "0.1.0".to_string(),
            year: chrono::Datelike::year(&now),
            contributor: String::new(),
            date_created: now.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct License {
    pub id: u32,
    pub name: String,
    pub url: String,
}

impl Default for License {
    fn default() -> Self {
        Self {
            id: 1,
            name: "Attribution-NonCommercial-ShareAlike License".to_string(),
            url: "http://creativecommons.org/licenses/by-nc-sa/2.0/".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: u32,
    pub name: String,
    pub supercategory: String,
}

impl Category {
    pub fn new(id: u32, name: impl Into<String>, supercategory: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            supercategory: supercategory.into(),
        }
    }
}

/// One entry of the COCO `images` list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: u64,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    pub date_captured: String,
    pub license: u32,
    pub coco_url: String,
    pub flickr_url: String,
}

impl ImageRecord {
    pub fn new(id: u64, file_name: String, width: u32, height: u32) -> Self {
        Self {
            id,
            file_name,
            width,
            height,
            date_captured: chrono::Utc::now()
                .format("%Y-%m-%d %H:%M:%S%.6f")
                .to_string(),
            license: 1,
            coco_url: String::new(),
            flickr_url: String::new(),
        }
    }
}

/// Uncompressed run-length encoding, column-major, counts start with background.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rle {
    pub counts: Vec<u32>,
    /// `[height, width]`
    pub size: [u32; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segmentation {
    Polygons(Vec<Vec<f64>>),
    Rle(Rle),
}

/// One entry of the COCO `annotations` list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub id: u64,
    pub image_id: u64,
    pub category_id: u32,
    pub iscrowd: u8,
    pub area: u64,
    /// `[x, y, width, height]`
    pub bbox: [f64; 4],
    pub segmentation: Segmentation,
    pub width: u32,
    pub height: u32,
}

/// A complete COCO document for one split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CocoDataset {
    pub info: Info,
    pub licenses: Vec<License>,
    pub categories: Vec<Category>,
    pub images: Vec<ImageRecord>,
    pub annotations: Vec<AnnotationRecord>,
}

impl CocoDataset {
    /// Empty payload sharing the given header blocks.
    pub fn new(info: Info, licenses: Vec<License>, categories: Vec<Category>) -> Self {
        Self {
            info,
            licenses,
            categories,
            images: Vec::new(),
            annotations: Vec::new(),
        }
    }
}
