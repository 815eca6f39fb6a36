use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Result, anyhow};
use dataset::DatasetIndex;
use log::info;
use projector::BoundingBox;
use rand::{SeedableRng, seq::IndexedRandom};
use rand_xoshiro::SplitMix64;

use crate::{
    config::{ClassificationConfig, ConfigError},
    host::{SceneHost, object_bounding_box},
    randomizer::{SceneRandomizer, image_rng},
};

/// One rendered crop.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassificationSample {
    pub path: PathBuf,
    pub class_name: String,
    pub bbox: BoundingBox,
    pub seed: u64,
}

/// Renders `num_images_per_class` single-object images for every selected
/// class, each named after its class, index and bounding box.
pub struct ClassificationGenerator {
    config: ClassificationConfig,
    randomizer: SceneRandomizer,
    classes: Vec<(String, Vec<PathBuf>)>,
}

impl ClassificationGenerator {
    pub fn new(config: &ClassificationConfig, index: &DatasetIndex) -> Result<Self> {
        let randomizer = SceneRandomizer::new(&config.scene)?;
        let names: Vec<String> = match config.models.class_names.resolve()? {
            Some(names) => names,
            None => index.class_names().into_iter().map(str::to_string).collect(),
        };

        let mut classes = Vec::with_capacity(names.len());
        for name in names {
            let models: Vec<PathBuf> = index
                .models_of(&name)
                .into_iter()
                .map(Path::to_path_buf)
                .collect();
            if models.is_empty() {
                return Err(ConfigError::UnknownClass(name).into());
            }
            classes.push((name, models));
        }

        Ok(Self {
            config: config.clone(),
            randomizer,
            classes,
        })
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(|(name, _)| name.as_str())
    }

    pub fn run<H: SceneHost + ?Sized>(&self, host: &mut H) -> Result<Vec<ClassificationSample>> {
        host.configure_render(self.config.scene.render)?;
        let mut seeds = SplitMix64::seed_from_u64(self.config.scene.seed);
        let mut samples = Vec::new();

        for (class_name, models) in &self.classes {
            let class_dir = self.config.save_path.join(class_name);
            fs::create_dir_all(&class_dir)?;

            for idx in 0..self.config.num_images_per_class {
                let (seed, mut rng) = image_rng(&mut seeds);
                let model = models
                    .choose(&mut rng)
                    .ok_or_else(|| anyhow!("class '{class_name}' has no models"))?;

                let obj = host.import_mesh(model, class_name)?;
                self.randomizer.change_light_conditions(host, &mut rng)?;
                self.randomizer.rotate(host, obj, &mut rng)?;
                host.frame_objects(&[obj])?;
                self.randomizer.translate(host, obj, &mut rng)?;
                self.randomizer.zoom(host, &mut rng)?;
                self.randomizer.change_background(host, &mut rng)?;
                self.randomizer.change_color(host, obj, &mut rng)?;

                let bbox = object_bounding_box(host, obj)?;
                let path = class_dir.join(file_name(
                    class_name,
                    idx,
                    &bbox,
                    &self.config.scene.image_extension,
                ));
                host.render_to_file(&path)?;
                info!("rendered {} (seed {seed}, box {:?})", path.display(), bbox.to_array());
                host.reset_scene()?;

                samples.push(ClassificationSample {
                    path,
                    class_name: class_name.clone(),
                    bbox,
                    seed,
                });
            }
        }
        Ok(samples)
    }
}

fn file_name(class_name: &str, idx: usize, b: &BoundingBox, extension: &str) -> String {
    format!(
        "{class_name}_{idx}_{:.3}_{:.3}_{:.3}_{:.3}.{extension}",
        b.x_min, b.y_min, b.x_max, b.y_max
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fake_host::{Call, FakeHost},
        preview::{CameraState, PreviewHost},
    };
    use image::GenericImageView;
    use nalgebra::{Point3, Vector3};

    fn index() -> DatasetIndex {
        [
            (PathBuf::from("models/chair/a.obj"), "chair".to_string()),
            (PathBuf::from("models/chair/b.obj"), "chair".to_string()),
            (PathBuf::from("models/mug/c.obj"), "mug".to_string()),
        ]
        .into_iter()
        .collect()
    }

    fn config(save: &Path, per_class: usize) -> ClassificationConfig {
        let mut config = ClassificationConfig {
            save_path: save.to_path_buf(),
            num_images_per_class: per_class,
            ..ClassificationConfig::default()
        };
        config.scene.cache_dir = save.join("cache");
        config
    }

    #[test]
    fn file_name_embeds_box_at_three_decimals() {
        let b = BoundingBox::new(0.1, 0.25, 0.33333, 1.0);
        assert_eq!(
            file_name("chair", 7, &b, "png"),
            "chair_7_0.100_0.250_0.333_1.000.png"
        );
    }

    #[test]
    fn unknown_class_is_rejected_before_rendering() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), 1);
        config.models.class_names =
            crate::config::ClassSelection::Names(vec!["chair".into(), "sofa".into()]);

        let err = ClassificationGenerator::new(&config, &index()).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::UnknownClass(name)) if name == "sofa"
        ));
    }

    #[test]
    fn every_class_gets_its_images_and_a_reset_each() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ClassificationGenerator::new(&config(dir.path(), 3), &index()).unwrap();
        assert_eq!(generator.class_names().collect::<Vec<_>>(), ["chair", "mug"]);

        let mut host = FakeHost::new();
        let samples = generator.run(&mut host).unwrap();

        assert_eq!(samples.len(), 6);
        assert!(matches!(host.calls[0], Call::ConfigureRender(_)));
        let images = host.images();
        assert_eq!(images.len(), 6);
        for (sample, calls) in samples.iter().zip(&images) {
            let Some(Call::Import(model, name)) =
                calls.iter().find(|c| matches!(c, Call::Import(..)))
            else {
                panic!("no import in {calls:?}");
            };
            assert_eq!(index().class_of(model), Some(sample.class_name.as_str()));
            assert_eq!(name, &sample.class_name);
            assert_eq!(
                calls.iter().filter(|c| matches!(c, Call::Import(..))).count(),
                1
            );
            assert_eq!(calls[calls.len() - 2], Call::Render(sample.path.clone()));

            let file = sample.path.file_name().unwrap().to_str().unwrap();
            assert!(file.starts_with(&format!("{}_", sample.class_name)));
            assert_eq!(sample.path.parent().unwrap(), dir.path().join(&sample.class_name));
        }
        assert!(dir.path().join("mug").is_dir());
    }

    #[test]
    fn framing_follows_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ClassificationGenerator::new(&config(dir.path(), 1), &index()).unwrap();
        let mut host = FakeHost::new();
        generator.run(&mut host).unwrap();

        let calls = host.images()[0];
        let rotate = calls
            .iter()
            .position(|c| matches!(c, Call::Transform { delta_rotation: Some(_), .. }))
            .unwrap();
        assert!(matches!(calls[rotate + 1], Call::Frame(_)));
        assert!(calls[..rotate].iter().any(|c| matches!(c, Call::AddLight(..))));
    }

    #[test]
    fn same_seed_gives_same_images() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ClassificationGenerator::new(&config(dir.path(), 2), &index()).unwrap();
        let mut a = FakeHost::new();
        let mut b = FakeHost::new();
        assert_eq!(generator.run(&mut a).unwrap(), generator.run(&mut b).unwrap());
        assert_eq!(a.calls, b.calls);
    }

    #[test]
    fn class_without_models_is_an_error_not_a_skip() {
        let dir = tempfile::tempdir().unwrap();
        let mut generator =
            ClassificationGenerator::new(&config(dir.path(), 1), &index()).unwrap();
        generator.classes[1].1.clear();

        let mut host = FakeHost::new();
        let err = generator.run(&mut host).unwrap_err();
        assert!(err.to_string().contains("mug"), "{err}");
    }

    #[test]
    fn host_failure_aborts_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ClassificationGenerator::new(&config(dir.path(), 2), &index()).unwrap();
        let mut host = FakeHost::failing_imports();
        assert!(generator.run(&mut host).is_err());
        assert!(!host.calls.iter().any(|c| matches!(c, Call::Render(_))));
    }

    #[test]
    fn preview_host_writes_named_pngs() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("box.obj");
        fs::write(
            &model,
            "v -1 -1 0\nv 1 -1 0\nv 1 1 0\nv -1 1 0\nv -1 -1 1\nv 1 -1 1\nv 1 1 1\nv -1 1 1\n",
        )
        .unwrap();
        let index: DatasetIndex = [(model, "box".to_string())].into_iter().collect();

        let mut config = config(&dir.path().join("out"), 2);
        config.scene.render.resolution = (40, 30);
        let generator = ClassificationGenerator::new(&config, &index).unwrap();

        let mut host = PreviewHost::new(dir.path().join("cache/scene.json")).with_camera(CameraState {
            location: Point3::new(0.0, 0.0, 20.0),
            rotation: Vector3::zeros(),
            ..CameraState::default()
        });
        let samples = generator.run(&mut host).unwrap();

        assert_eq!(samples.len(), 2);
        for sample in &samples {
            let image = image::open(&sample.path).unwrap();
            assert_eq!((image.width(), image.height()), (40, 30));
            assert!(!sample.bbox.is_degenerate());
        }
        assert_eq!(host.num_objects(), 0);
    }
}
