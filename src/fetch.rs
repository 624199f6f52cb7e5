//! Copy or download the images referenced by a COCO file

use serde_json::Value;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};

/// The parts of a COCO image entry needed to locate its file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub file_name: String,
    pub coco_url: Option<String>,
}

/// Image entries of a COCO document, in file order.
pub fn image_refs(coco: &Value) -> Result<Vec<ImageRef>> {
    let images = coco
        .get("images")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Config("COCO file has no 'images' list".into()))?;

    images
        .iter()
        .map(|image| {
            let file_name = image
                .get("file_name")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::Config(format!("image without file_name: {}", image)))?;
            Ok(ImageRef {
                file_name: file_name.to_string(),
                coco_url: image
                    .get("coco_url")
                    .and_then(Value::as_str)
                    .filter(|url| !url.is_empty())
                    .map(str::to_string),
            })
        })
        .collect()
}

fn prepare_target(out_dir: &Path, file_name: &str) -> Result<PathBuf> {
    let target = out_dir.join(file_name);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    Ok(target)
}

pub fn copy_image(image: &ImageRef, in_dir: &Path, out_dir: &Path) -> Result<PathBuf> {
    let source = in_dir.join(&image.file_name);
    let target = prepare_target(out_dir, &image.file_name)?;
    debug!("Copying {} -> {}", source.display(), target.display());
    fs::copy(&source, &target).map_err(|e| Error::io(&source, e))?;
    Ok(target)
}

pub fn download_image(image: &ImageRef, out_dir: &Path) -> Result<PathBuf> {
    let url = image.coco_url.as_deref().ok_or_else(|| {
        Error::Config(format!("image '{}' has no coco_url", image.file_name))
    })?;
    let target = prepare_target(out_dir, &image.file_name)?;
    debug!("Downloading {} -> {}", url, target.display());

    let response = ureq::get(url).call().map_err(|e| Error::Download {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    let file = File::create(&target).map_err(|e| Error::io(&target, e))?;
    let mut writer = BufWriter::new(file);
    io::copy(&mut response.into_reader(), &mut writer).map_err(|e| Error::io(&target, e))?;
    Ok(target)
}
