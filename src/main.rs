use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use mask2coco::config::DEFAULT_TOLERANCE;
use mask2coco::report::{reporter_for, RunReport};
use mask2coco::{fetch, sorter, subset, writer};
use mask2coco::{ConvertOptions, DatasetAssembler, DatasetConfig, SplitRatios};

#[derive(Parser)]
#[command(name = "mask2coco")]
#[command(version)]
#[command(about = "Build train/val/test COCO segmentation datasets from class-sorted images and masks")]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert class-sorted images and masks into three COCO files
    Convert {
        /// Image root: <IMAGE_DIR>/<class>/images/*.jpg
        #[arg(value_name = "IMAGE_DIR")]
        image_dir: PathBuf,

        /// Mask root: <MASK_DIR>/<class>/**/*.png
        #[arg(value_name = "MASK_DIR")]
        mask_dir: PathBuf,

        /// Output base name; writes <OUTPUT>_train.json, _val.json, _test.json
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// YAML file with info, licenses and categories
        #[arg(short, long)]
        categories: Option<PathBuf>,

        /// Train, val and test percentages
        #[arg(long, default_value = "85,5,10")]
        split: SplitRatios,

        /// Polygon simplification tolerance in pixels
        #[arg(short, long, default_value_t = DEFAULT_TOLERANCE)]
        tolerance: f64,

        /// Random seed for the split (drawn from entropy when absent)
        #[arg(long)]
        seed: Option<u64>,

        /// Run report (json or html based on extension)
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Move downloaded masks into per-class directories
    SortMasks {
        /// CSV of <class id>,<class name>
        class_descriptions: PathBuf,

        /// Directory holding the downloaded masks
        input_dir: PathBuf,

        /// Directory to create the class directories in
        output_dir: PathBuf,
    },

    /// Write a COCO file containing only some classes
    Subset {
        /// Input COCO json file
        in_json: PathBuf,

        /// Output COCO json file
        out_json: PathBuf,

        /// Classes to keep
        #[arg(required = true)]
        classes: Vec<String>,
    },

    /// Copy the images of a COCO file from a local directory
    CopyImages {
        /// Input COCO json file
        in_json: PathBuf,

        /// Input image directory
        image_in_dir: PathBuf,

        /// Output image directory
        image_out_dir: PathBuf,
    },

    /// Download the images of a COCO file from their coco_url
    DownloadImages {
        /// Input COCO json file
        in_json: PathBuf,

        /// Output image directory
        image_out_dir: PathBuf,
    },

    /// Show information about a COCO file
    Info {
        /// Path to COCO json file
        #[arg(value_name = "COCO_JSON")]
        coco: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}

fn progress_bar(label: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}}) {{wide_msg}}",
                label
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Convert {
            image_dir,
            mask_dir,
            output,
            categories,
            split,
            tolerance,
            seed,
            report,
        } => {
            let options = ConvertOptions {
                split,
                tolerance,
                seed,
            };
            run_convert(&image_dir, &mask_dir, &output, categories.as_deref(), options, report.as_deref())
        }
        Commands::SortMasks {
            class_descriptions,
            input_dir,
            output_dir,
        } => run_sort_masks(&class_descriptions, &input_dir, &output_dir),
        Commands::Subset {
            in_json,
            out_json,
            classes,
        } => run_subset(&in_json, &out_json, &classes),
        Commands::CopyImages {
            in_json,
            image_in_dir,
            image_out_dir,
        } => run_copy_images(&in_json, &image_in_dir, &image_out_dir),
        Commands::DownloadImages {
            in_json,
            image_out_dir,
        } => run_download_images(&in_json, &image_out_dir),
        Commands::Info { coco } => run_info(&coco),
    }
}

fn run_convert(
    image_dir: &Path,
    mask_dir: &Path,
    output: &Path,
    categories: Option<&Path>,
    options: ConvertOptions,
    report_path: Option<&Path>,
) -> Result<()> {
    let start = Instant::now();

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║            mask2coco - COCO Dataset Assembler            ║");
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();

    let config = match categories {
        Some(path) => DatasetConfig::load(path)
            .with_context(|| format!("Failed to load categories from {}", path.display()))?,
        None => DatasetConfig::default(),
    };

    println!("📂 Images: {}", image_dir.display());
    println!("📂 Masks:  {}", mask_dir.display());
    println!("   Categories: {}", config.categories.len());
    println!("   Split:      {}", options.split);
    println!("   Tolerance:  {}", options.tolerance);
    println!();

    let pb = progress_bar("Convert")?;
    let assembler = DatasetAssembler::new(config, options.clone()).with_progress(pb.clone());
    let assembly = assembler
        .run(image_dir, mask_dir)
        .context("Dataset assembly failed")?;
    pb.finish_with_message("Done!");

    assembly.coverage.log_summary();

    let written = writer::write_splits(output, &assembly.datasets)
        .context("Failed to write COCO files")?;

    println!();
    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║                      RUN SUMMARY                         ║");
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();
    println!("  Seed: {}", assembly.seed);
    for (split, dataset) in assembly.datasets.iter() {
        println!(
            "  {:<5} images: {:>6}  annotations: {:>6}",
            split,
            dataset.images.len(),
            dataset.annotations.len()
        );
    }
    println!("  Images without masks: {}", assembly.coverage.missing.len());
    println!("  Degenerate masks:     {}", assembly.coverage.rejected.len());
    println!();
    for path in &written {
        println!("📄 COCO file saved: {}", path.display());
    }

    if let Some(report_path) = report_path {
        let report = RunReport::new(image_dir, mask_dir, &options, &assembly, written);
        reporter_for(report_path)
            .generate(&report, report_path)
            .with_context(|| format!("Failed to write report {}", report_path.display()))?;
        println!("📄 Report saved: {}", report_path.display());
    }

    println!("  Time: {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn run_sort_masks(class_descriptions: &Path, input_dir: &Path, output_dir: &Path) -> Result<()> {
    let classes = sorter::load_class_descriptions(class_descriptions)
        .with_context(|| format!("Failed to read {}", class_descriptions.display()))?;
    println!("📂 Sorting masks in {} ({} classes known)", input_dir.display(), classes.len());

    let moved = sorter::sort_masks(&classes, input_dir, output_dir)?;
    for (class_name, count) in &moved {
        println!("   {}: {}", class_name, count);
    }
    println!("✅ Done!");
    Ok(())
}

fn run_subset(in_json: &Path, out_json: &Path, classes: &[String]) -> Result<()> {
    let coco = subset::read_coco(in_json)?;
    let subset = subset::subset_by_classes(coco, classes)?;
    let (images, annotations, categories) = subset::counts(&subset);

    writer::write_json(out_json, &subset)?;
    println!(
        "📄 Subset saved: {} ({} images, {} annotations, {} categories)",
        out_json.display(),
        images,
        annotations,
        categories
    );
    Ok(())
}

fn run_copy_images(in_json: &Path, image_in_dir: &Path, image_out_dir: &Path) -> Result<()> {
    let coco = subset::read_coco(in_json)?;
    let images = fetch::image_refs(&coco)?;

    println!("📥 Copying {} images...", images.len());
    let pb = progress_bar("Copy")?;
    pb.set_length(images.len() as u64);
    for image in &images {
        fetch::copy_image(image, image_in_dir, image_out_dir)?;
        pb.inc(1);
    }
    pb.finish_with_message("Done!");
    Ok(())
}

fn run_download_images(in_json: &Path, image_out_dir: &Path) -> Result<()> {
    let coco = subset::read_coco(in_json)?;
    let images = fetch::image_refs(&coco)?;

    println!("📥 Downloading {} images (this will take a while)...", images.len());
    let pb = progress_bar("Download")?;
    pb.set_length(images.len() as u64);
    for image in &images {
        fetch::download_image(image, image_out_dir)?;
        pb.inc(1);
    }
    pb.finish_with_message("Done!");
    Ok(())
}

fn run_info(path: &Path) -> Result<()> {
    let coco = subset::read_coco(path)?;
    let (images, annotations, categories) = subset::counts(&coco);

    println!("COCO file: {}", path.display());
    println!("Images: {}", images);
    println!("Annotations: {}", annotations);
    println!("Categories: {}", categories);
    println!();
    println!("Category names:");
    if let Some(list) = coco.get("categories").and_then(|c| c.as_array()) {
        for category in list {
            println!(
                "  {}: {}",
                category.get("id").cloned().unwrap_or_default(),
                category.get("name").and_then(|n| n.as_str()).unwrap_or("?")
            );
        }
    }

    Ok(())
}
