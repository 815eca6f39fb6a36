use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use image::GenericImageView;
use log::debug;
use rand::{Rng, rngs::SmallRng, seq::IndexedRandom};

use crate::{
    config::{BackgroundConfig, BackgroundMode, ConfigError},
    host::{Rgb, SceneHost},
};

const CROP_FILE: &str = "random_background.png";

pub enum BackgroundSource {
    Plain,
    Crop {
        image_paths: Vec<PathBuf>,
        crop_size: u32,
        cache_path: PathBuf,
    },
}

impl BackgroundSource {
    /// Lists the candidate images up front so a bad directory fails before
    /// anything is rendered.
    pub fn new(config: &BackgroundConfig, cache_dir: &Path) -> Result<Self, ConfigError> {
        match config.mode {
            BackgroundMode::Plain => Ok(BackgroundSource::Plain),
            BackgroundMode::Crop => {
                let dir = config
                    .images_directory
                    .as_ref()
                    .ok_or(ConfigError::MissingBackgroundDirectory)?;
                if config.crop_size == 0 {
                    return Err(ConfigError::ZeroCount("crop_size"));
                }
                let image_paths = png_files(dir)?;
                if image_paths.is_empty() {
                    return Err(ConfigError::NoBackgroundImages(dir.clone()));
                }
                Ok(BackgroundSource::Crop {
                    image_paths,
                    crop_size: config.crop_size,
                    cache_path: cache_dir.join(CROP_FILE),
                })
            }
        }
    }

    pub fn apply<H: SceneHost + ?Sized>(&self, host: &mut H, rng: &mut SmallRng) -> Result<()> {
        match self {
            BackgroundSource::Plain => host.set_background_color(random_rgb(rng)),
            BackgroundSource::Crop {
                image_paths,
                crop_size,
                cache_path,
            } => {
                let source = image_paths
                    .choose(rng)
                    .ok_or_else(|| anyhow!("no background images to choose from"))?;
                apply_random_crop(host, source, *crop_size, cache_path, rng)
            }
        }
    }
}

/// Uniform RGB, each channel an integer in `0..=255`.
pub fn random_rgb(rng: &mut SmallRng) -> Rgb {
    Rgb::from_u8([rng.random(), rng.random(), rng.random()])
}

fn apply_random_crop<H: SceneHost + ?Sized>(
    host: &mut H,
    source: &Path,
    size: u32,
    cache_path: &Path,
    rng: &mut SmallRng,
) -> Result<()> {
    let image =
        image::open(source).with_context(|| format!("opening background {}", source.display()))?;
    let (width, height) = image.dimensions();
    if width < size || height < size {
        debug!(
            "{} is {width}x{height}, smaller than the {size}px crop; using a plain color",
            source.display()
        );
        return host.set_background_color(random_rgb(rng));
    }

    let x = rng.random_range(0..=width - size);
    let y = rng.random_range(0..=height - size);
    if let Some(parent) = cache_path.parent() {
        fs::create_dir_all(parent)?;
    }
    image.crop_imm(x, y, size, size).save(cache_path)?;
    host.set_background_image(cache_path)
}

fn png_files(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let unreadable = |source| ConfigError::UnreadableBackgroundDirectory {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        if path.extension().and_then(|s| s.to_str()) == Some("png") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
