use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::Context;
use dataset::{DatasetIndex, FlatDatasetManager, OffsetDatasetManager, OffsetTable};
use serde::{Deserialize, Serialize};

use crate::host::RenderSettings;

pub type Interval = [f64; 2];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("backgrounds available are 'plain' or 'crop', got '{0}'")]
    InvalidBackgroundMode(String),
    #[error("background 'crop' needs a background images directory")]
    MissingBackgroundDirectory,
    #[error("cannot read background directory {path}: {source}")]
    UnreadableBackgroundDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("there are no '.png' files in {0}")]
    NoBackgroundImages(PathBuf),
    #[error("{name}: minimum {min} is above maximum {max}")]
    InvalidRange {
        name: &'static str,
        min: f64,
        max: f64,
    },
    #[error("{0} must be at least 1")]
    ZeroCount(&'static str),
    #[error("resolution_percentage must be in 1..=100, got {0}")]
    InvalidResolutionPercentage(u32),
    #[error("lamp type '{0}' is not supported, only 'POINT'")]
    UnsupportedLampType(String),
    #[error("class selection must be \"all\" or a list of names, got \"{0}\"")]
    InvalidClassSelection(String),
    #[error("class '{0}' has no models in the dataset")]
    UnknownClass(String),
    #[error("no models found in {0}")]
    EmptyIndex(PathBuf),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundMode {
    #[default]
    Plain,
    Crop,
}

impl FromStr for BackgroundMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(BackgroundMode::Plain),
            "crop" => Ok(BackgroundMode::Crop),
            other => Err(ConfigError::InvalidBackgroundMode(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    pub mode: BackgroundMode,
    pub images_directory: Option<PathBuf>,
    pub crop_size: u32,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            mode: BackgroundMode::Plain,
            images_directory: None,
            crop_size: 200,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub lamp_type: String,
    pub max_num_lamps: usize,
    /// Per-axis position range of each lamp.
    pub lamp_location_range: Interval,
    /// Integer energy range, upper bound excluded.
    pub lamp_energy_range: [i64; 2],
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            lamp_type: "POINT".to_string(),
            max_num_lamps: 4,
            lamp_location_range: [-15.0, 15.0],
            lamp_energy_range: [1, 5],
        }
    }
}

impl LightingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lamp_type != "POINT" {
            return Err(ConfigError::UnsupportedLampType(self.lamp_type.clone()));
        }
        if self.max_num_lamps == 0 {
            return Err(ConfigError::ZeroCount("max_num_lamps"));
        }
        check_interval("lamp_location_range", self.lamp_location_range)?;
        let [lo, hi] = self.lamp_energy_range;
        if lo >= hi {
            return Err(ConfigError::InvalidRange {
                name: "lamp_energy_range",
                min: lo as f64,
                max: hi as f64,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Degrees, sampled per axis.
    pub rotation_range: Option<Interval>,
    /// Per-axis world position; replaces the load-time position.
    pub translation_range: Option<Interval>,
    /// Distance moved along the camera view direction.
    pub zoom_range: Option<Interval>,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            rotation_range: Some([0.0, 360.0]),
            translation_range: None,
            zoom_range: None,
        }
    }
}

impl PlacementConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, range) in [
            ("rotation_range", self.rotation_range),
            ("translation_range", self.translation_range),
            ("zoom_range", self.zoom_range),
        ] {
            if let Some(range) = range {
                check_interval(name, range)?;
            }
        }
        Ok(())
    }
}

fn check_interval(name: &'static str, [min, max]: Interval) -> Result<(), ConfigError> {
    if min > max || min.is_nan() || max.is_nan() {
        return Err(ConfigError::InvalidRange { name, min, max });
    }
    Ok(())
}

/// Settings shared by both generators.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub render: RenderSettings,
    pub lighting: LightingConfig,
    pub placement: PlacementConfig,
    pub background: BackgroundConfig,
    /// Scratch space for generated background crops.
    pub cache_dir: PathBuf,
    pub image_extension: String,
    pub seed: u64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            render: RenderSettings::default(),
            lighting: LightingConfig::default(),
            placement: PlacementConfig::default(),
            background: BackgroundConfig::default(),
            cache_dir: PathBuf::from("cache"),
            image_extension: "png".to_string(),
            seed: 0,
        }
    }
}

impl SceneConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let percentage = self.render.resolution_percentage;
        if !(1..=100).contains(&percentage) {
            return Err(ConfigError::InvalidResolutionPercentage(percentage));
        }
        self.lighting.validate()?;
        self.placement.validate()
    }
}

/// `"all"` or an explicit list of class names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassSelection {
    Keyword(String),
    Names(Vec<String>),
}

impl Default for ClassSelection {
    fn default() -> Self {
        ClassSelection::Keyword("all".to_string())
    }
}

impl ClassSelection {
    /// `None` stands for every class.
    pub fn resolve(&self) -> Result<Option<Vec<String>>, ConfigError> {
        match self {
            ClassSelection::Keyword(k) if k == "all" => Ok(None),
            ClassSelection::Keyword(k) => Err(ConfigError::InvalidClassSelection(k.clone())),
            ClassSelection::Names(names) => Ok(Some(names.clone())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetLayout {
    /// `<root>/<offset>/<model_id>/models/*.obj`
    #[default]
    Offset,
    /// `<root>/<class_name>/textured.obj`
    Flat,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSource {
    pub path: PathBuf,
    pub layout: DatasetLayout,
    pub class_names: ClassSelection,
}

impl Default for ModelSource {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/models"),
            layout: DatasetLayout::default(),
            class_names: ClassSelection::default(),
        }
    }
}

impl ModelSource {
    pub fn load_index(&self) -> anyhow::Result<DatasetIndex> {
        let classes = self.class_names.resolve()?;
        let index = match self.layout {
            DatasetLayout::Offset => {
                OffsetDatasetManager::new(&self.path, OffsetTable::shapenet_core(), classes).load()
            }
            DatasetLayout::Flat => FlatDatasetManager::new(&self.path, classes).load(),
        }
        .with_context(|| format!("indexing models under {}", self.path.display()))?;
        if index.is_empty() {
            return Err(ConfigError::EmptyIndex(self.path.clone()).into());
        }
        Ok(index)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    pub models: ModelSource,
    pub save_path: PathBuf,
    pub num_images_per_class: usize,
    #[serde(flatten)]
    pub scene: SceneConfig,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            models: ModelSource::default(),
            save_path: PathBuf::from("data/crop_data"),
            num_images_per_class: 100,
            scene: SceneConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub models: ModelSource,
    pub save_path: PathBuf,
    pub num_images: usize,
    pub max_num_objects_in_scene: usize,
    /// Written verbatim to every annotation's `folder` element.
    pub folder_label: String,
    /// Directory under `save_path` that receives rendered images.
    pub image_prefix: String,
    #[serde(flatten)]
    pub scene: SceneConfig,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            models: ModelSource::default(),
            save_path: PathBuf::from("data/detection_data"),
            num_images: 100,
            max_num_objects_in_scene: 3,
            folder_label: "CLARA2017".to_string(),
            image_prefix: "detection_data".to_string(),
            scene: SceneConfig::default(),
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_num_objects_in_scene == 0 {
            return Err(ConfigError::ZeroCount("max_num_objects_in_scene"));
        }
        self.scene.validate()
    }
}

pub fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> anyhow::Result<T> {
    let file = File::open(path).with_context(|| format!("opening config {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing config {}", path.display()))
}
