//! Compact COCO JSON output, one file per split

use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Error, Result};
use crate::models::{CocoDataset, PerSplit, Split};

/// Output base with a trailing `.json` removed.
pub fn output_base(output: &Path) -> PathBuf {
    let is_json = output
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        output.with_extension("")
    } else {
        output.to_path_buf()
    }
}

/// `<base>_<split>.json`
pub fn split_path(base: &Path, split: Split) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(format!("_{}.json", split));
    PathBuf::from(name)
}

/// Serialize `value` as compact JSON to `path`, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value).map_err(|e| Error::json(path, e))?;
    writer.flush().map_err(|e| Error::io(path, e))
}

/// Write train, val and test in that order. A failure stops the sequence;
/// files already written are left in place.
pub fn write_splits(output: &Path, datasets: &PerSplit<CocoDataset>) -> Result<Vec<PathBuf>> {
    let base = output_base(output);
    let mut written = Vec::with_capacity(3);

    for (split, dataset) in datasets.iter() {
        let path = split_path(&base, split);
        write_json(&path, dataset)?;
        info!(
            "Wrote {} ({} images, {} annotations)",
            path.display(),
            dataset.images.len(),
            dataset.annotations.len()
        );
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatasetConfig;

    #[test]
    fn test_output_base() {
        assert_eq!(output_base(Path::new("out/coco.json")), PathBuf::from("out/coco"));
        assert_eq!(output_base(Path::new("out/coco")), PathBuf::from("out/coco"));
        assert_eq!(output_base(Path::new("coco.v2")), PathBuf::from("coco.v2"));
        assert_eq!(
            split_path(Path::new("out/coco"), Split::Val),
            PathBuf::from("out/coco_val.json")
        );
    }

    #[test]
    fn test_write_splits_compact() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatasetConfig::default();
        let datasets = PerSplit::from_fn(|_| {
            CocoDataset::new(
                config.info.clone(),
                config.licenses.clone(),
                config.categories.clone(),
            )
        });

        let written = write_splits(&dir.path().join("coco.json"), &datasets).unwrap();
        assert_eq!(
            written,
            vec![
                dir.path().join("coco_train.json"),
                dir.path().join("coco_val.json"),
                dir.path().join("coco_test.json"),
            ]
        );

        let text = fs::read_to_string(&written[0]).unwrap();
        assert!(!text.contains('\n'));
        let parsed: CocoDataset = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, datasets.train);
    }

    #[test]
    fn test_write_failure_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"").unwrap();

        let datasets = PerSplit::from_fn(|_| {
            CocoDataset::new(Default::default(), Vec::new(), Vec::new())
        });
        let result = write_splits(&blocker.join("coco"), &datasets);
        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[test]
    fn test_earlier_splits_kept_when_later_write_fails() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the val file should go
        fs::create_dir_all(dir.path().join("coco_val.json")).unwrap();

        let datasets = PerSplit::from_fn(|_| {
            CocoDataset::new(Default::default(), Vec::new(), Vec::new())
        });
        let result = write_splits(&dir.path().join("coco.json"), &datasets);

        assert!(matches!(result, Err(Error::Io { ref path, .. }) if path.ends_with("coco_val.json")));
        let train = fs::read_to_string(dir.path().join("coco_train.json")).unwrap();
        let parsed: CocoDataset = serde_json::from_str(&train).unwrap();
        assert_eq!(parsed, datasets.train);
        assert!(!dir.path().join("coco_test.json").exists());
    }
}
