use anyhow::Result;
use log::debug;
use nalgebra::{Point3, Vector3};
use rand::{Rng, RngCore, SeedableRng, rngs::SmallRng};
use rand_xoshiro::SplitMix64;

use crate::{
    background::{BackgroundSource, random_rgb},
    config::{ConfigError, Interval, LightingConfig, PlacementConfig, SceneConfig},
    host::{LightHandle, ObjectHandle, SceneHost},
};

/// Applies sampled lighting, pose, zoom, background and color to a scene.
/// All draws are uniform.
pub struct SceneRandomizer {
    lighting: LightingConfig,
    placement: PlacementConfig,
    background: BackgroundSource,
}

impl SceneRandomizer {
    pub fn new(scene: &SceneConfig) -> Result<Self, ConfigError> {
        scene.validate()?;
        Ok(Self {
            lighting: scene.lighting.clone(),
            placement: scene.placement.clone(),
            background: BackgroundSource::new(&scene.background, &scene.cache_dir)?,
        })
    }

    pub fn sample_num_lamps(&self, rng: &mut SmallRng) -> usize {
        rng.random_range(1..=self.lighting.max_num_lamps)
    }

    pub fn change_light_conditions<H: SceneHost + ?Sized>(
        &self,
        host: &mut H,
        rng: &mut SmallRng,
    ) -> Result<Vec<LightHandle>> {
        let num_lamps = self.sample_num_lamps(rng);
        let [lo, hi] = self.lighting.lamp_energy_range;
        let mut lamps = Vec::with_capacity(num_lamps);
        for _ in 0..num_lamps {
            let position = Point3::from(uniform3(rng, self.lighting.lamp_location_range));
            let energy = rng.random_range(lo..hi) as f64;
            debug!("lamp at {position:?} energy {energy}");
            lamps.push(host.add_point_light(position, energy)?);
        }
        Ok(lamps)
    }

    pub fn rotate<H: SceneHost + ?Sized>(
        &self,
        host: &mut H,
        object: ObjectHandle,
        rng: &mut SmallRng,
    ) -> Result<()> {
        let Some(range) = self.placement.rotation_range else {
            return Ok(());
        };
        let degrees = uniform3(rng, range);
        host.set_object_transform(object, Some(degrees.map(f64::to_radians)), None)
    }

    pub fn translate<H: SceneHost + ?Sized>(
        &self,
        host: &mut H,
        object: ObjectHandle,
        rng: &mut SmallRng,
    ) -> Result<()> {
        let Some(range) = self.placement.translation_range else {
            return Ok(());
        };
        let location = Point3::from(uniform3(rng, range));
        host.set_object_transform(object, None, Some(location))
    }

    pub fn zoom<H: SceneHost + ?Sized>(&self, host: &mut H, rng: &mut SmallRng) -> Result<()> {
        let Some(range) = self.placement.zoom_range else {
            return Ok(());
        };
        host.move_camera_along_view(uniform(rng, range))
    }

    pub fn change_background<H: SceneHost + ?Sized>(
        &self,
        host: &mut H,
        rng: &mut SmallRng,
    ) -> Result<()> {
        self.background.apply(host, rng)
    }

    pub fn change_color<H: SceneHost + ?Sized>(
        &self,
        host: &mut H,
        object: ObjectHandle,
        rng: &mut SmallRng,
    ) -> Result<()> {
        host.set_material_color(object, random_rgb(rng))
    }

    /// Rotation, translation, zoom, background and color, in that order.
    pub fn place_object<H: SceneHost + ?Sized>(
        &self,
        host: &mut H,
        object: ObjectHandle,
        rng: &mut SmallRng,
    ) -> Result<()> {
        self.rotate(host, object, rng)?;
        self.translate(host, object, rng)?;
        self.zoom(host, rng)?;
        self.change_background(host, rng)?;
        self.change_color(host, object, rng)
    }
}

/// Draws the next per-image seed and the generator seeded from it.
pub fn image_rng(seeds: &mut SplitMix64) -> (u64, SmallRng) {
    let seed = seeds.next_u64();
    (seed, SmallRng::seed_from_u64(seed))
}

fn uniform(rng: &mut SmallRng, [lo, hi]: Interval) -> f64 {
    if lo < hi { rng.random_range(lo..hi) } else { lo }
}

fn uniform3(rng: &mut SmallRng, range: Interval) -> Vector3<f64> {
    Vector3::new(
        uniform(rng, range),
        uniform(rng, range),
        uniform(rng, range),
    )
}
