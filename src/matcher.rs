//! Image discovery and image-to-mask filename correspondence
//!
//! Masks are paired with images purely by name: a mask `<stem>_<suffix>.png`
//! belongs to the image `<stem>.jpg`. The separator is required, so `img1`
//! never claims `img10_0.png`. Image stems that themselves contain the
//! separator still work (`a_b.jpg` claims `a_b_0.png`), but an image named
//! `a.jpg` in the same category would claim that mask as well.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Separator between the image stem and the per-instance mask suffix
pub const MASK_SEPARATOR: char = '_';

const JPEG_EXTENSIONS: &[&str] = &["jpg", "jpeg"];
const MASK_EXTENSION: &str = "png";

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| extensions.contains(&ext.as_str()))
}

pub fn is_jpeg(path: &Path) -> bool {
    has_extension(path, JPEG_EXTENSIONS)
}

pub fn is_mask(path: &Path) -> bool {
    has_extension(path, &[MASK_EXTENSION])
}

/// File name without its final extension.
pub fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Whether a mask stem names an instance of the image stem.
///
/// Case-sensitive; requires `image_stem` followed by [`MASK_SEPARATOR`].
pub fn is_mask_for(image_stem: &str, mask_stem: &str) -> bool {
    !image_stem.is_empty()
        && mask_stem
            .strip_prefix(image_stem)
            .is_some_and(|rest| rest.starts_with(MASK_SEPARATOR))
}

fn walk_files(root: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        tracing::debug!("{} does not exist, nothing to walk", root.display());
        return Ok(Vec::new());
    }

    // Symlinked files and directories count as part of the tree
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| Error::io(root, e.into()))?;
        if entry.file_type().is_file() && keep(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// JPEG files anywhere under `dir`, in traversal order.
///
/// A missing directory yields no images.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    walk_files(dir, is_jpeg)
}

/// All `.png` masks of one category, scanned once and matched per image.
#[derive(Debug, Clone, Default)]
pub struct MaskTree {
    masks: Vec<(String, PathBuf)>,
}

impl MaskTree {
    pub fn scan(root: &Path) -> Result<Self> {
        let masks = walk_files(root, is_mask)?
            .into_iter()
            .map(|path| (stem(&path), path))
            .collect();
        Ok(Self { masks })
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Masks belonging to `image`, in traversal order.
    pub fn matches(&self, image: &Path) -> Vec<PathBuf> {
        let image_stem = stem(image);
        self.masks
            .iter()
            .filter(|(mask_stem, _)| is_mask_for(&image_stem, mask_stem))
            .map(|(_, path)| path.clone())
            .collect()
    }
}

/// Walk `mask_root` and return the masks belonging to `image`.
pub fn find_masks(image: &Path, mask_root: &Path) -> Result<Vec<PathBuf>> {
    Ok(MaskTree::scan(mask_root)?.matches(image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_is_mask_for() {
        assert!(is_mask_for("img1", "img1_m025dyy_0"));
        assert!(is_mask_for("img1", "img1_"));
        assert!(!is_mask_for("img1", "img10_m025dyy_0"));
        assert!(!is_mask_for("img1", "img1"));
        assert!(!is_mask_for("img1", "Img1_0"));
        assert!(!is_mask_for("", "_0"));
        // Stems containing the separator
        assert!(is_mask_for("a_b", "a_b_0"));
        assert!(is_mask_for("a", "a_b_0"));
        assert!(!is_mask_for("a_b", "a_bc_0"));
    }

    #[test]
    fn test_extension_filters() {
        assert!(is_jpeg(Path::new("x/a.jpg")));
        assert!(is_jpeg(Path::new("x/a.JPEG")));
        assert!(!is_jpeg(Path::new("x/a.png")));
        assert!(!is_jpeg(Path::new("x/jpg")));
        assert!(is_mask(Path::new("a_0.png")));
        assert!(!is_mask(Path::new("a_0.jpg")));
    }

    #[test]
    fn test_find_masks_recursive() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("part1");
        fs::create_dir_all(&nested).unwrap();
        for name in ["foo_0.png", "foo_1.txt", "food_0.png"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::write(nested.join("foo_2.png"), b"").unwrap();

        let mut found = find_masks(Path::new("images/foo.jpg"), dir.path()).unwrap();
        found.sort();
        assert_eq!(
            found,
            vec![dir.path().join("foo_0.png"), nested.join("foo_2.png")]
        );

        let again = MaskTree::scan(dir.path()).unwrap();
        assert_eq!(again.len(), 3);
        assert_eq!(again.matches(Path::new("bar.jpg")), Vec::<PathBuf>::new());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_files_are_listed() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store");
        let images = dir.path().join("box/images");
        let masks = dir.path().join("masks/box");
        for d in [&store, &images, &masks] {
            fs::create_dir_all(d).unwrap();
        }
        fs::write(store.join("a.jpg"), b"").unwrap();
        fs::write(store.join("a_0.png"), b"").unwrap();
        symlink(store.join("a.jpg"), images.join("a.jpg")).unwrap();
        symlink(store.join("a_0.png"), masks.join("a_0.png")).unwrap();

        let listed = list_images(&images).unwrap();
        assert_eq!(listed, vec![images.join("a.jpg")]);
        let tree = MaskTree::scan(&masks).unwrap();
        assert_eq!(tree.matches(&listed[0]), vec![masks.join("a_0.png")]);
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_images(&dir.path().join("nope")).unwrap().is_empty());
        assert!(MaskTree::scan(&dir.path().join("nope")).unwrap().is_empty());
    }
}
