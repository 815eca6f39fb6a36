//! Draws the stored ground truth of a detection dataset over its images.

use std::{
    fs,
    path::{Path, PathBuf},
};

use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use dataset::AnnotationParser;
use image::Rgb;
use imageproc::{
    drawing::{draw_hollow_rect_mut, draw_text_mut},
    rect::Rect,
};
use log::info;
use ndarray::ArrayView1;

const LABEL_PX: f32 = 12.0;
const LABEL_OFFSET: i32 = 10;

/// `n` evenly spaced hues of the HSV wheel, ends included.
pub fn class_colors(n: usize) -> Vec<Rgb<u8>> {
    (0..n)
        .map(|i| {
            let hue = if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 };
            Rgb(hue_to_rgb(hue))
        })
        .collect()
}

fn hue_to_rgb(hue: f64) -> [u8; 3] {
    let h = (hue.rem_euclid(1.0)) * 6.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    let (r, g, b) = match h as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        _ => (1.0, 0.0, x),
    };
    [r, g, b].map(|c: f64| (c * 255.0).round() as u8)
}

/// Pixel rectangle `(left, top, right, bottom)` of a normalized box, with
/// `y` measured up from the bottom edge. Every side is clipped to
/// `[1, side - 1]`.
pub fn denormalize_box(bbox: [f64; 4], (width, height): (u32, u32)) -> (i32, i32, i32, i32) {
    let (w, h) = (width as f64, height as f64);
    let clip_x = |v: f64| (v as i32).clamp(1, (width as i32 - 1).max(1));
    let clip_y = |v: f64| (v as i32).clamp(1, (height as i32 - 1).max(1));
    (
        clip_x(bbox[0] * w),
        clip_y((1.0 - bbox[3]) * h),
        clip_x(bbox[2] * w),
        clip_y((1.0 - bbox[1]) * h),
    )
}

fn best_class(scores: ArrayView1<f64>) -> (usize, f64) {
    scores
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, s)| if s > best.1 { (i, s) } else { best })
}

/// Writes `ground_truths_<i>.png` into `out_dir` for the first `limit`
/// annotated images and returns the written paths.
pub fn plot_ground_truths(
    parser: &AnnotationParser,
    out_dir: &Path,
    limit: Option<usize>,
    font: Option<&FontArc>,
) -> Result<Vec<PathBuf>> {
    let data = parser.load_data()?;
    let vocabulary = parser.vocabulary();
    let colors = class_colors(vocabulary.len());
    fs::create_dir_all(out_dir)?;

    let mut written = Vec::new();
    for (i, (image_name, boxes)) in data.iter().take(limit.unwrap_or(usize::MAX)).enumerate() {
        let image_path = parser.dataset_path().join(image_name);
        let mut image = image::open(&image_path)
            .with_context(|| format!("opening {}", image_path.display()))?
            .to_rgb8();
        let size = image.dimensions();

        for row in boxes.rows() {
            let coords = [row[0], row[1], row[2], row[3]];
            let (class_arg, score) = best_class(row.slice(ndarray::s![4..]));
            let color = colors[class_arg];
            let (left, top, right, bottom) = denormalize_box(coords, size);
            draw_hollow_rect_mut(
                &mut image,
                Rect::at(left, top).of_size((right - left).max(1) as u32, (bottom - top).max(1) as u32),
                color,
            );
            if let Some(font) = font {
                let label = format!(
                    "{score:.2}, {}",
                    vocabulary.name_of(class_arg).unwrap_or_default()
                );
                draw_text_mut(
                    &mut image,
                    color,
                    left,
                    top - LABEL_OFFSET,
                    PxScale::from(LABEL_PX),
                    font,
                    &label,
                );
            }
        }

        let out = out_dir.join(format!("ground_truths_{i}.png"));
        image
            .save(&out)
            .with_context(|| format!("saving {}", out.display()))?;
        info!("plotted {} boxes of {image_name} to {}", boxes.nrows(), out.display());
        written.push(out);
    }
    Ok(written)
}
