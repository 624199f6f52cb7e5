//! Class-sorted images and segmentation masks to COCO train/val/test files
//!
//! Images live under `<image_dir>/<category>/images/` and masks under
//! `<mask_dir>/<category>/`. Each category's images are shuffled into three
//! splits, every image is paired with its masks by file name, and the masks
//! are encoded into COCO annotations.

pub mod assembler;
pub mod config;
pub mod coverage;
pub mod encoder;
pub mod error;
pub mod fetch;
pub mod ids;
pub mod mask;
pub mod matcher;
pub mod models;
pub mod report;
pub mod sorter;
pub mod split;
pub mod subset;
pub mod writer;

pub use assembler::{Assembly, DatasetAssembler};
pub use config::{ConvertOptions, DatasetConfig};
pub use coverage::CoverageReport;
pub use encoder::{AnnotationEncoder, CategoryInfo, CocoMaskEncoder, FsImageSource, ImageSource};
pub use error::{Error, Result};
pub use mask::BinaryMask;
pub use models::{AnnotationRecord, Category, CocoDataset, ImageRecord, PerSplit, Split};
pub use split::SplitRatios;
pub use writer::write_splits;
