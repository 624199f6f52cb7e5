//! Move downloaded Open Images masks into per-class directories
//!
//! Mask files are named `<image id>_<class id>_<instance>.png` where the class
//! id is the label MID without slashes (`/m/025dyy` → `m025dyy`). Class ids
//! may contain underscores, so the id is everything between the first and
//! the last underscore.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::matcher::is_mask;

/// Class id → lower-cased class name
pub type ClassDescriptions = HashMap<String, String>;

fn unquote(field: &str) -> &str {
    let field = field.trim();
    field
        .strip_prefix('"')
        .and_then(|f| f.strip_suffix('"'))
        .unwrap_or(field)
}

/// `/m/025dyy` → `m025dyy`: the first two slashes are dropped.
pub fn normalize_class_id(mid: &str) -> String {
    let mut removed = 0;
    mid.chars()
        .filter(|&c| {
            if c == '/' && removed < 2 {
                removed += 1;
                false
            } else {
                true
            }
        })
        .collect()
}

/// Parse `<mid>,<name>` rows. Blank lines are skipped.
pub fn parse_class_descriptions(content: &str) -> Result<ClassDescriptions> {
    let mut classes = HashMap::new();
    for (line_num, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let (mid, name) = line.split_once(',').ok_or_else(|| {
            Error::Config(format!(
                "class descriptions line {}: expected '<id>,<name>'",
                line_num + 1
            ))
        })?;
        classes.insert(
            normalize_class_id(unquote(mid)),
            unquote(name).to_lowercase(),
        );
    }
    Ok(classes)
}

pub fn load_class_descriptions(path: &Path) -> Result<ClassDescriptions> {
    let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    parse_class_descriptions(&content)
}

/// Class id embedded in a mask file name.
pub fn mask_class_id(file_name: &str) -> Option<&str> {
    let stem = file_name.strip_suffix(".png").unwrap_or(file_name);
    let (_, rest) = stem.split_once('_')?;
    let (class_id, _) = rest.rsplit_once('_')?;
    Some(class_id)
}

fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // Cross-device moves need a copy
    fs::copy(from, to)?;
    fs::remove_file(from)
}

/// Move every `.png` under `input_dir` to `output_dir/<class name>/`.
///
/// Returns the number of masks moved per class name.
pub fn sort_masks(
    classes: &ClassDescriptions,
    input_dir: &Path,
    output_dir: &Path,
) -> Result<BTreeMap<String, usize>> {
    let mut masks: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(input_dir).follow_links(true) {
        let entry = entry.map_err(|e| Error::io(input_dir, e.into()))?;
        if entry.file_type().is_file() && is_mask(entry.path()) {
            masks.push(entry.into_path());
        }
    }
    info!("Found {} masks under {}", masks.len(), input_dir.display());

    let mut moved = BTreeMap::new();
    for mask in masks {
        let file_name = mask
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        let class_id = mask_class_id(&file_name).ok_or_else(|| {
            Error::Config(format!("cannot read a class id from '{}'", file_name))
        })?;
        let class_name = classes
            .get(class_id)
            .ok_or_else(|| Error::UnknownClass(class_id.to_string()))?;

        let class_dir = output_dir.join(class_name);
        if !class_dir.exists() {
            info!("Creating {}", class_dir.display());
            fs::create_dir_all(&class_dir).map_err(|e| Error::io(&class_dir, e))?;
        }

        let target = class_dir.join(&file_name);
        debug!("{} -> {}", mask.display(), target.display());
        move_file(&mask, &target).map_err(|e| Error::io(&mask, e))?;
        *moved.entry(class_name.clone()).or_insert(0) += 1;
    }

    Ok(moved)
}
