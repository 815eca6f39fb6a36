use std::{fs, path::PathBuf};

use anyhow::{Result, anyhow};
use dataset::{DatasetIndex, Detection, ImageAnnotation, ImageShape, parser::ANNOTATIONS_DIR};
use log::{debug, info};
use rand::{Rng, SeedableRng, seq::IndexedRandom};
use rand_xoshiro::SplitMix64;

use crate::{
    config::DetectionConfig,
    host::{SceneHost, object_bounding_box},
    randomizer::{SceneRandomizer, image_rng},
};

/// One rendered scene and the annotation written for it.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionSample {
    pub image_path: PathBuf,
    pub annotation_path: PathBuf,
    pub annotation: ImageAnnotation,
    pub seed: u64,
}

/// Renders multi-object scenes drawn from the whole model index.
pub struct DetectionGenerator {
    config: DetectionConfig,
    randomizer: SceneRandomizer,
    models: Vec<(PathBuf, String)>,
}

impl DetectionGenerator {
    pub fn new(config: &DetectionConfig, index: &DatasetIndex) -> Result<Self> {
        config.validate()?;
        let randomizer = SceneRandomizer::new(&config.scene)?;
        let models = index.entries();
        if models.is_empty() {
            return Err(anyhow!("the model index is empty"));
        }
        fs::create_dir_all(config.save_path.join(ANNOTATIONS_DIR))?;
        fs::create_dir_all(config.save_path.join(&config.image_prefix))?;
        Ok(Self {
            config: config.clone(),
            randomizer,
            models,
        })
    }

    pub fn sample_num_objects<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        rng.random_range(1..=self.config.max_num_objects_in_scene)
    }

    pub fn run<H: SceneHost + ?Sized>(&self, host: &mut H) -> Result<Vec<DetectionSample>> {
        let render = self.config.scene.render;
        host.configure_render(render)?;
        let (width, height) = render.resolution;
        let shape = ImageShape::new(width, height, 3);
        let mut seeds = SplitMix64::seed_from_u64(self.config.scene.seed);
        let mut samples = Vec::with_capacity(self.config.num_images);

        for idx in 0..self.config.num_images {
            let (seed, mut rng) = image_rng(&mut seeds);
            self.randomizer.change_light_conditions(host, &mut rng)?;

            let num_objects = self.sample_num_objects(&mut rng);
            debug!("image {idx}: {num_objects} objects");
            let mut objects = Vec::with_capacity(num_objects);
            let mut detections = Vec::with_capacity(num_objects);
            for _ in 0..num_objects {
                let (model, class_name) = self
                    .models
                    .choose(&mut rng)
                    .ok_or_else(|| anyhow!("the model index is empty"))?;
                let obj = host.import_mesh(model, class_name)?;
                self.randomizer.place_object(host, obj, &mut rng)?;
                detections.push(Detection::new(object_bounding_box(host, obj)?, class_name));
                objects.push(obj);
            }
            host.frame_objects(&objects)?;

            let relative = format!("{}/{idx}", self.config.image_prefix);
            let image_path = self
                .config
                .save_path
                .join(format!("{relative}.{}", self.config.scene.image_extension));
            host.render_to_file(&image_path)?;

            let annotation =
                ImageAnnotation::new(&self.config.folder_label, relative, shape, detections);
            let annotation_path = self
                .config
                .save_path
                .join(ANNOTATIONS_DIR)
                .join(format!("xml{idx}.xml"));
            annotation.write(&annotation_path)?;
            info!(
                "rendered {} with {} objects (seed {seed})",
                image_path.display(),
                annotation.detections.len()
            );
            host.reset_scene()?;

            samples.push(DetectionSample {
                image_path,
                annotation_path,
                annotation,
                seed,
            });
        }
        Ok(samples)
    }
}
