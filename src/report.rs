//! Run report generation

use minijinja::{context, Environment};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::assembler::Assembly;
use crate::config::ConvertOptions;
use crate::error::{Error, Result};
use crate::models::{PerSplit, Split};
use crate::split::SplitRatios;

/// Version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Serialize)]
pub struct SplitSummary {
    pub split: Split,
    pub percent: u32,
    pub images: usize,
    pub annotations: usize,
    pub annotation_attempts: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generator: String,
    pub generator_version: String,
    pub generated_at: String,
    pub image_dir: PathBuf,
    pub mask_dir: PathBuf,
    pub seed: u64,
    pub split: SplitRatios,
    pub tolerance: f64,
    pub splits: Vec<SplitSummary>,
    pub output_files: Vec<PathBuf>,
    pub missing_masks: Vec<PathBuf>,
    pub rejected_masks: Vec<PathBuf>,
}

impl RunReport {
    pub fn new(
        image_dir: &Path,
        mask_dir: &Path,
        options: &ConvertOptions,
        assembly: &Assembly,
        output_files: Vec<PathBuf>,
    ) -> Self {
        let PerSplit { train, val, test } = assembly.datasets.as_ref().map(|split, dataset| {
            SplitSummary {
                split,
                percent: options.split.percent(split),
                images: dataset.images.len(),
                annotations: dataset.annotations.len(),
                annotation_attempts: assembly.annotation_attempts[split],
            }
        });

        Self {
            generator: "mask2coco".to_string(),
            generator_version: VERSION.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            image_dir: image_dir.to_path_buf(),
            mask_dir: mask_dir.to_path_buf(),
            seed: assembly.seed,
            split: options.split,
            tolerance: options.tolerance,
            splits: vec![train, val, test],
            output_files,
            missing_masks: assembly.coverage.missing.clone(),
            rejected_masks: assembly.coverage.rejected.clone(),
        }
    }

    pub fn total_images(&self) -> usize {
        self.splits.iter().map(|s| s.images).sum()
    }

    pub fn total_annotations(&self) -> usize {
        self.splits.iter().map(|s| s.annotations).sum()
    }
}

/// Trait for report generators
pub trait Reporter {
    fn generate(&self, report: &RunReport, output_path: &Path) -> Result<()>;
}

/// Pick a reporter from the output extension: `.html`/`.htm` or JSON.
pub fn reporter_for(output_path: &Path) -> Box<dyn Reporter> {
    let is_html = output_path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"));
    if is_html {
        Box::new(HtmlReporter)
    } else {
        Box::new(JsonReporter)
    }
}

/// Pretty-printed JSON report
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonReporter;

impl Reporter for JsonReporter {
    fn generate(&self, report: &RunReport, output_path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(report).map_err(|e| Error::json(output_path, e))?;
        fs::write(output_path, json).map_err(|e| Error::io(output_path, e))
    }
}

/// Single-page HTML report rendered with minijinja
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlReporter;

impl Reporter for HtmlReporter {
    fn generate(&self, report: &RunReport, output_path: &Path) -> Result<()> {
        let mut env = Environment::new();
        env.add_template("report", HTML_TEMPLATE)?;

        let template = env.get_template("report")?;
        let html = template.render(context! {
            report => report,
            total_images => report.total_images(),
            total_annotations => report.total_annotations(),
        })?;

        fs::write(output_path, html).map_err(|e| Error::io(output_path, e))
    }
}

const HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>mask2coco run report</title>
    <style>
        body { font-family: sans-serif; margin: 2rem auto; max-width: 960px; color: #222; }
        h1, h2 { color: #2b5797; }
        .meta { color: #666; font-size: 0.9rem; }
        .totals { display: flex; gap: 2rem; margin: 1rem 0; }
        .totals b { display: block; font-size: 1.8rem; }
        th, td { padding: 0.3rem 0.8rem; text-align: right; border-bottom: 1px solid #ddd; }
        th:first-child, td:first-child { text-align: left; }
        li { font-family: monospace; color: #a15c00; }
    </style>
</head>
<body>
    <h1>mask2coco run report</h1>
    <p class="meta">
        Generated {{ report.generated_at }} by {{ report.generator }} {{ report.generator_version }}<br>
        Images: {{ report.image_dir }}<br>
        Masks: {{ report.mask_dir }}<br>
        Seed {{ report.seed }}, split {{ report.split.train }}/{{ report.split.val }}/{{ report.split.test }}, tolerance {{ report.tolerance }}
    </p>

    <div class="totals">
        <div><b>{{ total_images }}</b>images</div>
        <div><b>{{ total_annotations }}</b>annotations</div>
        <div><b>{{ report.missing_masks|length }}</b>images without masks</div>
        <div><b>{{ report.rejected_masks|length }}</b>degenerate masks</div>
    </div>

    <h2>Splits</h2>
    <table>
        <tr><th>Split</th><th>%</th><th>Images</th><th>Annotations</th><th>Attempts</th></tr>
        {% for s in report.splits %}
        <tr>
            <td>{{ s.split }}</td>
            <td>{{ s.percent }}</td>
            <td>{{ s.images }}</td>
            <td>{{ s.annotations }}</td>
            <td>{{ s.annotation_attempts }}</td>
        </tr>
        {% endfor %}
    </table>

    {% if report.missing_masks %}
    <h2>Images without masks ({{ report.missing_masks|length }})</h2>
    <ul>
        {% for path in report.missing_masks %}<li>{{ path }}</li>{% endfor %}
    </ul>
    {% endif %}

    {% if report.rejected_masks %}
    <h2>Degenerate masks ({{ report.rejected_masks|length }})</h2>
    <ul>
        {% for path in report.rejected_masks %}<li>{{ path }}</li>{% endfor %}
    </ul>
    {% endif %}
</body>
</html>
"#;
