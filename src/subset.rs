//! Extract a class subset from an existing COCO file

use serde_json::Value;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{Error, Result};

/// Read any COCO document, keeping fields this crate does not model.
pub fn read_coco(path: &Path) -> Result<Value> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::json(path, e))
}

fn list<'a>(coco: &'a Value, key: &str) -> &'a [Value] {
    coco.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Counts of `(images, annotations, categories)`.
pub fn counts(coco: &Value) -> (usize, usize, usize) {
    (
        list(coco, "images").len(),
        list(coco, "annotations").len(),
        list(coco, "categories").len(),
    )
}

/// Keep only `classes` (case-insensitive), their annotations and the images
/// those annotations reference. Other top-level keys are left untouched.
pub fn subset_by_classes(mut coco: Value, classes: &[String]) -> Result<Value> {
    let wanted: Vec<String> = classes.iter().map(|c| c.to_lowercase()).collect();
    let categories = list(&coco, "categories");

    for name in &wanted {
        let known = categories
            .iter()
            .any(|c| c.get("name").and_then(Value::as_str) == Some(name.as_str()));
        if !known {
            return Err(Error::UnknownClass(name.clone()));
        }
    }

    let category_subset: Vec<Value> = categories
        .iter()
        .filter(|c| {
            c.get("name")
                .and_then(Value::as_str)
                .is_some_and(|n| wanted.iter().any(|w| w == n))
        })
        .cloned()
        .collect();
    let category_ids: HashSet<i64> = category_subset
        .iter()
        .filter_map(|c| c.get("id").and_then(Value::as_i64))
        .collect();

    let annotation_subset: Vec<Value> = list(&coco, "annotations")
        .iter()
        .filter(|a| {
            a.get("category_id")
                .and_then(Value::as_i64)
                .is_some_and(|id| category_ids.contains(&id))
        })
        .cloned()
        .collect();
    let image_ids: HashSet<i64> = annotation_subset
        .iter()
        .filter_map(|a| a.get("image_id").and_then(Value::as_i64))
        .collect();

    let image_subset: Vec<Value> = list(&coco, "images")
        .iter()
        .filter(|i| {
            i.get("id")
                .and_then(Value::as_i64)
                .is_some_and(|id| image_ids.contains(&id))
        })
        .cloned()
        .collect();

    if let Some(object) = coco.as_object_mut() {
        object.insert("images".into(), Value::Array(image_subset));
        object.insert("annotations".into(), Value::Array(annotation_subset));
        object.insert("categories".into(), Value::Array(category_subset));
    }
    Ok(coco)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "info": {"description": "test"},
            "categories": [
                {"id": 1, "name": "person", "supercategory": "person"},
                {"id": 3, "name": "car", "supercategory": "vehicle"},
                {"id": 18, "name": "dog", "supercategory": "animal"}
            ],
            "images": [
                {"id": 10, "file_name": "a.jpg"},
                {"id": 11, "file_name": "b.jpg"},
                {"id": 12, "file_name": "c.jpg"}
            ],
            "annotations": [
                {"id": 1, "image_id": 10, "category_id": 1},
                {"id": 2, "image_id": 10, "category_id": 3},
                {"id": 3, "image_id": 11, "category_id": 18},
                {"id": 4, "image_id": 12, "category_id": 3}
            ]
        })
    }

    #[test]
    fn test_subset_by_classes() {
        let subset = subset_by_classes(sample(), &["Car".to_string()]).unwrap();

        assert_eq!(counts(&subset), (2, 2, 1));
        assert_eq!(subset["categories"][0]["name"], "car");
        assert_eq!(subset["images"][0]["id"], 10);
        assert_eq!(subset["images"][1]["id"], 12);
        assert_eq!(subset["info"]["description"], "test");
    }

    #[test]
    fn test_image_listed_once() {
        let subset =
            subset_by_classes(sample(), &["person".to_string(), "car".to_string()]).unwrap();
        assert_eq!(counts(&subset), (2, 3, 2));
    }

    #[test]
    fn test_unknown_class() {
        let result = subset_by_classes(sample(), &["unicorn".to_string()]);
        assert!(matches!(result, Err(Error::UnknownClass(name)) if name == "unicorn"));
    }
}
