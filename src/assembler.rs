//! Category → split → image → mask walk producing the three COCO payloads

use indicatif::ProgressBar;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{ConvertOptions, DatasetConfig};
use crate::coverage::CoverageReport;
use crate::encoder::{AnnotationEncoder, CategoryInfo, CocoMaskEncoder, FsImageSource, ImageSource};
use crate::error::Result;
use crate::ids::IdAllocator;
use crate::matcher::{list_images, MaskTree};
use crate::models::{Category, CocoDataset, ImageRecord, PerSplit, Split};
use crate::split::partition;

/// Images whose file name contains this marker are encoded as crowd regions.
pub const CROWD_MARKER: &str = "crowd";

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct Assembly {
    pub datasets: PerSplit<CocoDataset>,
    pub coverage: CoverageReport,
    /// Annotation ids consumed per split, including rejected masks.
    pub annotation_attempts: PerSplit<u64>,
    /// Seed the partitioner actually used.
    pub seed: u64,
}

pub struct DatasetAssembler<E = CocoMaskEncoder, S = FsImageSource> {
    config: DatasetConfig,
    options: ConvertOptions,
    encoder: E,
    source: S,
    progress: ProgressBar,
}

impl DatasetAssembler {
    pub fn new(config: DatasetConfig, options: ConvertOptions) -> Self {
        Self {
            config,
            options,
            encoder: CocoMaskEncoder,
            source: FsImageSource,
            progress: ProgressBar::hidden(),
        }
    }
}

impl<E: AnnotationEncoder, S: ImageSource> DatasetAssembler<E, S> {
    pub fn with_encoder<E2: AnnotationEncoder>(self, encoder: E2) -> DatasetAssembler<E2, S> {
        DatasetAssembler {
            config: self.config,
            options: self.options,
            encoder,
            source: self.source,
            progress: self.progress,
        }
    }

    pub fn with_image_source<S2: ImageSource>(self, source: S2) -> DatasetAssembler<E, S2> {
        DatasetAssembler {
            config: self.config,
            options: self.options,
            encoder: self.encoder,
            source,
            progress: self.progress,
        }
    }

    /// Report one tick per processed image on `progress`.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Walk `image_dir/<category>/images` and `mask_dir/<category>` for every
    /// configured category.
    ///
    /// Decode and filesystem failures abort the run; missing or degenerate
    /// masks are collected in the returned coverage report.
    pub fn run(&self, image_dir: &Path, mask_dir: &Path) -> Result<Assembly> {
        let seed = self
            .options
            .seed
            .unwrap_or_else(|| rand::thread_rng().gen());
        let mut rng = StdRng::seed_from_u64(seed);
        info!("Partitioning with seed {} ({})", seed, self.options.split);

        let mut datasets = PerSplit::from_fn(|_| {
            CocoDataset::new(
                self.config.info.clone(),
                self.config.licenses.clone(),
                self.config.categories.clone(),
            )
        });
        let mut ids = IdAllocator::new();
        let mut coverage = CoverageReport::new();

        for category in &self.config.categories {
            let images = list_images(&image_dir.join(&category.name).join("images"))?;
            if images.is_empty() {
                info!("Category '{}': no images", category.name);
                continue;
            }

            let masks = MaskTree::scan(&mask_dir.join(&category.name))?;
            info!(
                "Category '{}': {} images, {} masks",
                category.name,
                images.len(),
                masks.len()
            );
            self.progress.inc_length(images.len() as u64);

            let parts = partition(images, &self.options.split, &mut rng);
            for (split, files) in parts.iter() {
                debug!("Category '{}': {} {} images", category.name, files.len(), split);
                for image_path in files {
                    self.process_image(
                        split,
                        category,
                        image_path,
                        &masks,
                        &mut ids,
                        &mut datasets[split],
                        &mut coverage,
                    )?;
                }
            }
        }

        Ok(Assembly {
            datasets,
            coverage,
            annotation_attempts: PerSplit::from_fn(|split| ids.annotation_attempts(split)),
            seed,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn process_image(
        &self,
        split: Split,
        category: &Category,
        image_path: &Path,
        masks: &MaskTree,
        ids: &mut IdAllocator,
        dataset: &mut CocoDataset,
        coverage: &mut CoverageReport,
    ) -> Result<()> {
        debug!("Processing {}", image_path.display());
        self.progress.set_message(image_path.display().to_string());

        let image_size = self.source.dimensions(image_path)?;
        let file_name = image_path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();

        let matched: Vec<PathBuf> = masks.matches(image_path);
        if matched.is_empty() {
            coverage.record_missing(image_path);
        }

        let image_id = ids.peek_image_id(split);
        let category_info = CategoryInfo {
            id: category.id,
            is_crowd: file_name.contains(CROWD_MARKER),
        };

        for mask_path in &matched {
            let mask = self.source.load_mask(mask_path)?;
            let annotation_id = ids.allocate_annotation_id(split);
            match self.encoder.encode(
                annotation_id,
                image_id,
                category_info,
                &mask,
                image_size,
                self.options.tolerance,
            ) {
                Some(annotation) => dataset.annotations.push(annotation),
                None => {
                    debug!("Degenerate mask {}", mask_path.display());
                    coverage.record_rejected(mask_path);
                }
            }
        }

        let image_id = ids.allocate_image_id(split);
        dataset.images.push(ImageRecord::new(
            image_id,
            format!("{}/images/{}", category.name, file_name),
            image_size.0,
            image_size.1,
        ));

        self.progress.inc(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::BinaryMask;
    use crate::models::AnnotationRecord;
    use crate::split::SplitRatios;
    use std::fs;

    /// Fixed-size images; masks are full unless their name contains "empty".
    struct FakeSource;

    impl ImageSource for FakeSource {
        fn dimensions(&self, _path: &Path) -> Result<(u32, u32)> {
            Ok((4, 4))
        }

        fn load_mask(&self, path: &Path) -> Result<BinaryMask> {
            let mut mask = BinaryMask::new(4, 4);
            if !path.to_string_lossy().contains("empty") {
                for y in 1..3 {
                    for x in 1..3 {
                        mask.set(x, y, true);
                    }
                }
            }
            Ok(mask)
        }
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    fn assembler(categories: Vec<Category>) -> DatasetAssembler<CocoMaskEncoder, FakeSource> {
        let options = ConvertOptions {
            split: SplitRatios::new(100, 0, 0).unwrap(),
            tolerance: 0.0,
            seed: Some(1),
        };
        DatasetAssembler::new(DatasetConfig::with_categories(categories).unwrap(), options)
            .with_image_source(FakeSource)
    }

    #[test]
    fn test_ids_and_attribution() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        let masks = dir.path().join("masks");

        touch(&images.join("box/images/bar.jpg"));
        touch(&images.join("box/images/foo.jpg"));
        touch(&masks.join("box/bar_1.png"));
        touch(&masks.join("box/bar_2.png"));
        touch(&images.join("chicken/images/hen.jpeg"));
        touch(&masks.join("chicken/hen_empty.png"));

        let result = assembler(vec![
            Category::new(92, "box", "furniture"),
            Category::new(93, "chicken", "animal"),
        ])
        .run(&images, &masks)
        .unwrap();

        let train = &result.datasets.train;
        assert_eq!(train.images.len(), 3);
        let image_ids: Vec<u64> = train.images.iter().map(|i| i.id).collect();
        assert_eq!(image_ids, vec![1, 2, 3]);

        let bar = train
            .images
            .iter()
            .find(|i| i.file_name == "box/images/bar.jpg")
            .unwrap();
        let bar_anns: Vec<&AnnotationRecord> = train
            .annotations
            .iter()
            .filter(|a| a.image_id == bar.id)
            .collect();
        assert_eq!(bar_anns.len(), 2);
        assert!(bar_anns.iter().all(|a| a.category_id == 92));
        assert_eq!(bar_anns[1].id, bar_anns[0].id + 1);

        // Degenerate chicken mask consumed an id but produced no record
        assert_eq!(train.annotations.len(), 2);
        assert_eq!(result.annotation_attempts.train, 3);
        assert_eq!(result.coverage.rejected.len(), 1);

        assert_eq!(
            result.coverage.missing,
            vec![images.join("box/images/foo.jpg")]
        );
        assert!(result.datasets.val.images.is_empty());
        assert!(result.datasets.test.images.is_empty());
    }

    #[test]
    fn test_crowd_flag_from_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        let masks = dir.path().join("masks");
        touch(&images.join("box/images/crowd1.jpg"));
        touch(&masks.join("box/crowd1_0.png"));

        let result = assembler(vec![Category::new(92, "box", "furniture")])
            .run(&images, &masks)
            .unwrap();
        let ann = &result.datasets.train.annotations[0];
        assert_eq!(ann.iscrowd, 1);
    }

    #[test]
    fn test_category_without_images() {
        let dir = tempfile::tempdir().unwrap();
        let masks = dir.path().join("masks");
        touch(&masks.join("box/orphan_0.png"));

        let result = assembler(vec![Category::new(92, "box", "furniture")])
            .run(&dir.path().join("images"), &masks)
            .unwrap();
        for (_, dataset) in result.datasets.iter() {
            assert!(dataset.images.is_empty());
            assert!(dataset.annotations.is_empty());
        }
        assert!(result.coverage.is_empty());
        assert_eq!(result.seed, 1);
    }
}
