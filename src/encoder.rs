//! Mask-to-annotation encoding and image decoding collaborators

use std::path::Path;

use crate::error::{Error, Result};
use crate::mask::BinaryMask;
use crate::models::{AnnotationRecord, Segmentation};

/// Category data handed to the encoder for one mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryInfo {
    pub id: u32,
    pub is_crowd: bool,
}

/// Turns a decoded mask into a COCO annotation.
pub trait AnnotationEncoder {
    /// Returns `None` when the mask is degenerate and no record should be kept.
    fn encode(
        &self,
        annotation_id: u64,
        image_id: u64,
        category: CategoryInfo,
        mask: &BinaryMask,
        image_size: (u32, u32),
        tolerance: f64,
    ) -> Option<AnnotationRecord>;
}

/// Default encoder: polygons for regular instances, uncompressed RLE for crowds.
#[derive(Debug, Clone, Copy, Default)]
pub struct CocoMaskEncoder;

impl AnnotationEncoder for CocoMaskEncoder {
    fn encode(
        &self,
        annotation_id: u64,
        image_id: u64,
        category: CategoryInfo,
        mask: &BinaryMask,
        image_size: (u32, u32),
        tolerance: f64,
    ) -> Option<AnnotationRecord> {
        let mask = mask.resized(image_size.0, image_size.1);

        let area = mask.area();
        if area < 1 {
            return None;
        }

        let segmentation = if category.is_crowd {
            Segmentation::Rle(mask.to_rle())
        } else {
            let polygons = mask.polygons(tolerance);
            if polygons.is_empty() {
                return None;
            }
            Segmentation::Polygons(polygons)
        };

        Some(AnnotationRecord {
            id: annotation_id,
            image_id,
            category_id: category.id,
            iscrowd: u8::from(category.is_crowd),
            area,
            bbox: mask.bbox(),
            segmentation,
            width: mask.width(),
            height: mask.height(),
        })
    }
}

/// Pixel access for source images and masks.
pub trait ImageSource {
    /// `(width, height)` of the image at `path`.
    fn dimensions(&self, path: &Path) -> Result<(u32, u32)>;

    fn load_mask(&self, path: &Path) -> Result<BinaryMask>;
}

/// Decodes files from disk with the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsImageSource;

impl ImageSource for FsImageSource {
    fn dimensions(&self, path: &Path) -> Result<(u32, u32)> {
        image::image_dimensions(path).map_err(|e| Error::decode(path, e))
    }

    fn load_mask(&self, path: &Path) -> Result<BinaryMask> {
        let image = image::open(path).map_err(|e| Error::decode(path, e))?;
        Ok(BinaryMask::from_luma(&image.to_luma8()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob() -> BinaryMask {
        BinaryMask::from_rows(&[
            &[0, 0, 0, 0],
            &[0, 1, 1, 0],
            &[0, 1, 1, 0],
            &[0, 0, 0, 0],
        ])
    }

    #[test]
    fn test_encode_polygon() {
        let category = CategoryInfo {
            id: 92,
            is_crowd: false,
        };
        let record = CocoMaskEncoder
            .encode(5, 3, category, &blob(), (4, 4), 0.0)
            .unwrap();

        assert_eq!(record.id, 5);
        assert_eq!(record.image_id, 3);
        assert_eq!(record.category_id, 92);
        assert_eq!(record.iscrowd, 0);
        assert_eq!(record.area, 4);
        assert_eq!(record.bbox, [1.0, 1.0, 2.0, 2.0]);
        assert!(matches!(record.segmentation, Segmentation::Polygons(ref p) if p.len() == 1));
    }

    #[test]
    fn test_encode_crowd_uses_rle() {
        let category = CategoryInfo {
            id: 1,
            is_crowd: true,
        };
        let record = CocoMaskEncoder
            .encode(1, 1, category, &blob(), (4, 4), 2.0)
            .unwrap();

        assert_eq!(record.iscrowd, 1);
        match record.segmentation {
            Segmentation::Rle(rle) => {
                assert_eq!(rle.size, [4, 4]);
                assert_eq!(rle.counts.iter().sum::<u32>(), 16);
            }
            other => panic!("expected RLE, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_resizes_to_image() {
        let category = CategoryInfo {
            id: 1,
            is_crowd: false,
        };
        let record = CocoMaskEncoder
            .encode(1, 1, category, &blob(), (8, 8), 0.0)
            .unwrap();
        assert_eq!((record.width, record.height), (8, 8));
        assert_eq!(record.area, 16);
    }

    #[test]
    fn test_empty_mask_rejected() {
        let category = CategoryInfo {
            id: 1,
            is_crowd: false,
        };
        assert!(CocoMaskEncoder
            .encode(1, 1, category, &BinaryMask::new(4, 4), (4, 4), 2.0)
            .is_none());
    }
}
